use clap::ValueEnum;

use crate::models::AnalyzedCall;
use crate::normalize;

/// Heat bands used by the call listing. Calls with an unknown score fall in
/// no band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HeatBand {
    /// 8 and above
    High,
    /// 6 to 7
    Medium,
    /// Below 6
    Low,
}

impl HeatBand {
    fn contains(self, score: Option<i32>) -> bool {
        match (self, score) {
            (_, None) => false,
            (HeatBand::High, Some(score)) => score >= 8,
            (HeatBand::Medium, Some(score)) => (6..8).contains(&score),
            (HeatBand::Low, Some(score)) => score < 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutcomeCategory {
    Converted,
    Interested,
    Objection,
}

impl OutcomeCategory {
    fn keywords(self) -> &'static [&'static str] {
        match self {
            OutcomeCategory::Converted => &["contract", "signed", "closed", "converted"],
            OutcomeCategory::Interested => &["interested", "follow", "demo", "scheduled"],
            OutcomeCategory::Objection => &["objection", "concerns", "hesitant", "pricing"],
        }
    }

    fn matches(self, outcome: Option<&str>) -> bool {
        let Some(outcome) = outcome else {
            return false;
        };
        let outcome = outcome.to_lowercase();
        self.keywords().iter().any(|keyword| outcome.contains(keyword))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallFilter {
    pub search: Option<String>,
    pub heat: Option<HeatBand>,
    pub outcome: Option<OutcomeCategory>,
}

impl CallFilter {
    pub fn is_empty(&self) -> bool {
        self.search.as_deref().map_or(true, |term| term.trim().is_empty())
            && self.heat.is_none()
            && self.outcome.is_none()
    }

    pub fn matches(&self, analyzed: &AnalyzedCall) -> bool {
        let extracted = &analyzed.extracted;

        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needles = normalize::lowercase_all([term]);
            let searchable = [
                analyzed.call.prospect_name.as_deref(),
                extracted.top_need.as_deref(),
                extracted.main_objection.ranking_label(),
                extracted.outcome.as_deref(),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
            if !normalize::contains_any(&searchable, &needles) {
                return false;
            }
        }

        if let Some(band) = self.heat {
            if !band.contains(extracted.heat_score) {
                return false;
            }
        }

        if let Some(category) = self.outcome {
            if !category.matches(extracted.outcome.as_deref()) {
                return false;
            }
        }

        true
    }

    pub fn apply<'a>(&self, calls: &'a [AnalyzedCall]) -> Vec<&'a AnalyzedCall> {
        calls.iter().filter(|call| self.matches(call)).collect()
    }
}
