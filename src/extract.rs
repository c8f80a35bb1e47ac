//! Analysis-text extraction.
//!
//! Every field owns an ordered rule table. Rules run top to bottom and the
//! first one that yields a usable value wins, so the newest and most explicit
//! template generation is listed first and the loosest legacy layout last.
//!
//! Two kinds of rule exist:
//! - inline: a label followed by the value on the same line (`OUTCOME: Booked`)
//! - block: a heading on its own line with the value as the first bullet below
//!   it (`OBJECTIONS:` / `* Price is too high`)

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::models::{AnalyzedCall, ExtractedCall, Objection, RawCall};
use crate::normalize::{self, FieldLimits};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    Inline,
    Block,
}

const HEAT_PATTERNS: &[&str] = &[
    r"(?i)\bHEATCHECK[ \t]*:[ \t]*(\d+)(?:[ \t]*/[ \t]*10)?",
    r"(?i)\bHEAT[ \t]*CHECK[ \t]+SCORE[ \t]*:[ \t]*(\d+)",
    r"(?im)^[ \t*#]*(?:CALL[ \t]+)?SCORE[ \t]*:[ \t]*(\d+)",
    r"(?i)\bHEAT[ \t]*CHECK[ \t]*[:\-]?[ \t]*(\d+)",
];

const NEED_RULES: &[(RuleKind, &str)] = &[
    (RuleKind::Inline, r"TOP[ \t]+NEED[ \t]*/[ \t]*PAIN[ \t]+POINT"),
    (RuleKind::Inline, r"TOP[ \t]+NEED"),
    (RuleKind::Inline, r"PAIN[ \t]+POINTS?"),
    (RuleKind::Inline, r"PROSPECT(?:['’]?S)?[ \t]+NEEDS?"),
    (RuleKind::Inline, r"NEEDS?"),
    (RuleKind::Block, r"TOP[ \t]+NEED(?:[ \t]*/[ \t]*PAIN[ \t]+POINT)?"),
    (RuleKind::Block, r"PROSPECT(?:['’]?S)?[ \t]+NEEDS[ \t]+AND[ \t]+PAIN[ \t]+POINTS"),
    (RuleKind::Block, r"NEEDS[ \t]+AND[ \t]+PAIN[ \t]+POINTS"),
    (RuleKind::Block, r"PAIN[ \t]+POINTS?"),
    (RuleKind::Block, r"PROSPECT(?:['’]?S)?[ \t]+NEEDS?"),
    (RuleKind::Block, r"NEEDS?"),
];

const OBJECTION_RULES: &[(RuleKind, &str)] = &[
    (RuleKind::Inline, r"MAIN[ \t]+OBJECTION"),
    (RuleKind::Inline, r"OBJECTIONS?"),
    (RuleKind::Block, r"OBJECTIONS[ \t]+RAISED[ \t]+AND[ \t]+HANDLING"),
    (RuleKind::Block, r"OBJECTIONS?[ \t]+AND[ \t]+CONCERNS"),
    (RuleKind::Block, r"MAIN[ \t]+OBJECTIONS?"),
    (RuleKind::Block, r"OBJECTIONS?"),
];

const OUTCOME_RULES: &[(RuleKind, &str)] = &[
    (RuleKind::Inline, r"CALL[ \t]+OUTCOME"),
    (RuleKind::Inline, r"OUTCOME"),
    (RuleKind::Inline, r"(?:RESULT|CONCLUSION|STATUS)"),
];

const NO_OBJECTION_PHRASES: &[&str] = &[
    "no significant",
    "none identified",
    "no objection",
    "no major objection",
    "none raised",
    "no concerns",
];

static DEFAULT_EXTRACTOR: LazyLock<Extractor> = LazyLock::new(|| {
    Extractor::with_rules(&ExtractionConfig::default())
        .expect("built-in extraction patterns are valid")
});

/// Extracts with the built-in rule tables and default limits.
pub fn extract(text: Option<&str>) -> ExtractedCall {
    DEFAULT_EXTRACTOR.extract(text)
}

#[derive(Debug, Clone)]
struct Rule {
    kind: RuleKind,
    pattern: Regex,
}

impl Rule {
    fn from_label(kind: RuleKind, label: &str) -> std::result::Result<Self, regex::Error> {
        let source = match kind {
            RuleKind::Inline => format!(r"(?im)\b{label}[ \t]*:[ \t]*([^\n]*)"),
            RuleKind::Block => format!(r"(?im)^[ \t#*]*(?:\d+\.[ \t]*)?{label}[ \t*]*:?[ \t*]*$"),
        };
        Ok(Self {
            kind,
            pattern: Regex::new(&source)?,
        })
    }

    /// A user-supplied inline rule. The pattern must carry its own capture group.
    fn custom(field: &'static str, pattern: &str) -> Result<Self> {
        Ok(Self {
            kind: RuleKind::Inline,
            pattern: compile_capturing(field, pattern)?,
        })
    }

    fn apply(&self, text: &str, limits: FieldLimits) -> Option<String> {
        match self.kind {
            RuleKind::Inline => self.pattern.captures_iter(text).find_map(|caps| {
                caps.get(1)
                    .and_then(|value| normalize::clean_value(value.as_str(), limits))
            }),
            RuleKind::Block => self
                .pattern
                .find_iter(text)
                .find_map(|heading| first_bullet_below(&text[heading.end()..], limits)),
        }
    }
}

/// Compiles a pattern whose first capture group holds the value.
fn compile_capturing(field: &'static str, pattern: &str) -> Result<Regex> {
    let regex = Regex::new(pattern).map_err(|err| Error::pattern(field, pattern, err))?;
    if regex.captures_len() < 2 {
        return Err(Error::Pattern {
            field,
            pattern: pattern.to_string(),
            message: "pattern needs a capture group for the value".to_string(),
        });
    }
    Ok(regex)
}

fn first_bullet_below(rest: &str, limits: FieldLimits) -> Option<String> {
    let line = rest.lines().skip(1).find(|line| !line.trim().is_empty())?;
    let bullet = normalize::strip_bullet(line)?;
    normalize::clean_value(bullet, limits)
}

fn compile_rules(
    field: &'static str,
    custom: &[String],
    builtin: &[(RuleKind, &str)],
) -> Result<Vec<Rule>> {
    let mut rules = Vec::with_capacity(custom.len() + builtin.len());
    for pattern in custom {
        rules.push(Rule::custom(field, pattern)?);
    }
    for (kind, label) in builtin {
        let rule =
            Rule::from_label(*kind, label).map_err(|err| Error::pattern(field, *label, err))?;
        rules.push(rule);
    }
    Ok(rules)
}

fn first_match(rules: &[Rule], text: &str, limits: FieldLimits) -> Option<String> {
    rules.iter().find_map(|rule| rule.apply(text, limits))
}

fn classify_objection(value: String) -> Objection {
    let lower = value.to_lowercase();
    let trimmed = lower.trim_end_matches('.').trim();
    if trimmed == "none" || NO_OBJECTION_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        Objection::NoneSignificant
    } else {
        Objection::Raised(value)
    }
}

#[derive(Debug, Clone)]
pub struct Extractor {
    heat: Vec<Regex>,
    need: Vec<Rule>,
    objection: Vec<Rule>,
    outcome: Vec<Rule>,
    limits: FieldLimits,
}

impl Extractor {
    /// Builds the rule tables, placing configured patterns ahead of the
    /// built-in ones. Fails only on an invalid configured pattern.
    pub fn with_rules(config: &ExtractionConfig) -> Result<Self> {
        let mut heat = Vec::with_capacity(config.patterns.heat.len() + HEAT_PATTERNS.len());
        let patterns = config.patterns.heat.iter().map(String::as_str);
        for pattern in patterns.chain(HEAT_PATTERNS.iter().copied()) {
            heat.push(compile_capturing("heat", pattern)?);
        }

        Ok(Self {
            heat,
            need: compile_rules("need", &config.patterns.need, NEED_RULES)?,
            objection: compile_rules("objection", &config.patterns.objection, OBJECTION_RULES)?,
            outcome: compile_rules("outcome", &config.patterns.outcome, OUTCOME_RULES)?,
            limits: config.limits(),
        })
    }

    pub fn extract(&self, text: Option<&str>) -> ExtractedCall {
        let Some(text) = text.filter(|text| !text.trim().is_empty()) else {
            return ExtractedCall::unanalyzable();
        };
        let text = normalize::normalize_newlines(text);

        ExtractedCall {
            heat_score: self.heat_score(&text),
            top_need: first_match(&self.need, &text, self.limits),
            main_objection: first_match(&self.objection, &text, self.limits)
                .map(classify_objection)
                .unwrap_or(Objection::Unidentified),
            outcome: first_match(&self.outcome, &text, self.limits),
        }
    }

    /// Extracts every call and tallies the misses for diagnostics.
    pub fn analyze(&self, calls: &[RawCall]) -> (Vec<AnalyzedCall>, ExtractionStats) {
        let mut stats = ExtractionStats::default();
        let analyzed: Vec<AnalyzedCall> = calls
            .iter()
            .map(|call| {
                let extracted = self.extract(call.analysis_text.as_deref());
                stats.record(call.analysis_text.as_deref(), &extracted);
                AnalyzedCall {
                    call: call.clone(),
                    extracted,
                }
            })
            .collect();

        debug!(
            calls = stats.calls,
            unanalyzable = stats.unanalyzable,
            missing_heat = stats.missing_heat,
            missing_need = stats.missing_need,
            missing_objection = stats.missing_objection,
            missing_outcome = stats.missing_outcome,
            "extraction finished"
        );

        (analyzed, stats)
    }

    fn heat_score(&self, text: &str) -> Option<i32> {
        self.heat.iter().find_map(|pattern| {
            pattern
                .captures(text)
                .and_then(|caps| caps.get(1))
                .and_then(|value| value.as_str().trim().parse::<i32>().ok())
        })
    }
}

/// Per-field miss counts over a batch. Misses are expected and never errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub calls: usize,
    pub unanalyzable: usize,
    pub missing_heat: usize,
    pub missing_need: usize,
    pub missing_objection: usize,
    pub missing_outcome: usize,
}

impl ExtractionStats {
    pub fn record(&mut self, text: Option<&str>, extracted: &ExtractedCall) {
        self.calls += 1;
        if text.map_or(true, |text| text.trim().is_empty()) {
            self.unanalyzable += 1;
        }
        if extracted.heat_score.is_none() {
            self.missing_heat += 1;
        }
        if extracted.top_need.is_none() {
            self.missing_need += 1;
        }
        if extracted.main_objection == Objection::Unidentified {
            self.missing_objection += 1;
        }
        if extracted.outcome.is_none() {
            self.missing_outcome += 1;
        }
    }

    pub fn merge(&mut self, other: &ExtractionStats) {
        self.calls += other.calls;
        self.unanalyzable += other.unanalyzable;
        self.missing_heat += other.missing_heat;
        self.missing_need += other.missing_need;
        self.missing_objection += other.missing_objection;
        self.missing_outcome += other.missing_outcome;
    }
}
