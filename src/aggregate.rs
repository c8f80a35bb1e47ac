use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use uuid::Uuid;

use crate::models::{AnalyzedCall, ExtractedCall};
use crate::normalize;

/// Decides whether an outcome counts as a conversion by keyword substring.
#[derive(Debug, Clone)]
pub struct ConversionClassifier {
    keywords: Vec<String>,
}

impl ConversionClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: normalize::lowercase_all(keywords),
        }
    }

    pub fn is_conversion(&self, outcome: Option<&str>) -> bool {
        outcome.is_some_and(|outcome| normalize::contains_any(outcome, &self.keywords))
    }
}

impl Default for ConversionClassifier {
    fn default() -> Self {
        Self::new(crate::config::AggregationConfig::default().conversion_keywords)
    }
}

/// Running sums for one member, or for a whole cohort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemberMetrics {
    pub total_calls: usize,
    pub converted_calls: usize,
    /// Calls that carried a heat score; the denominator of the average.
    pub scored_calls: usize,
    pub heat_score_sum: i64,
}

impl MemberMetrics {
    pub fn record(&mut self, call: &ExtractedCall, converted: bool) {
        self.total_calls += 1;
        if converted {
            self.converted_calls += 1;
        }
        if let Some(score) = call.heat_score {
            self.scored_calls += 1;
            self.heat_score_sum += i64::from(score);
        }
    }

    pub fn merge(&mut self, other: &MemberMetrics) {
        self.total_calls += other.total_calls;
        self.converted_calls += other.converted_calls;
        self.scored_calls += other.scored_calls;
        self.heat_score_sum += other.heat_score_sum;
    }

    /// `None` when no call had a known score.
    pub fn average_heat_score(&self) -> Option<f64> {
        if self.scored_calls == 0 {
            None
        } else {
            Some(self.heat_score_sum as f64 / self.scored_calls as f64)
        }
    }

    pub fn conversion_rate(&self) -> f64 {
        conversion_rate(self.converted_calls, self.total_calls)
    }
}

/// Percentage rounded to one decimal; zero when there are no calls.
pub fn conversion_rate(converted: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_one_decimal(converted as f64 / total as f64 * 100.0)
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedValue {
    pub value: String,
    pub count: usize,
}

/// Counts values while remembering the order they were first seen in.
#[derive(Debug, Clone, Default)]
struct FrequencyTable {
    index: HashMap<String, usize>,
    entries: Vec<RankedValue>,
}

impl FrequencyTable {
    fn add(&mut self, value: &str, count: usize) {
        match self.index.get(value) {
            Some(&position) => self.entries[position].count += count,
            None => {
                self.index.insert(value.to_string(), self.entries.len());
                self.entries.push(RankedValue {
                    value: value.to_string(),
                    count,
                });
            }
        }
    }

    fn merge(&mut self, other: &FrequencyTable) {
        for entry in &other.entries {
            self.add(&entry.value, entry.count);
        }
    }

    fn ranked(&self) -> Vec<RankedValue> {
        let mut ranked = self.entries.clone();
        // stable: equal counts keep first-seen order
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CohortMetrics {
    pub totals: MemberMetrics,
    /// Calls with no resolved member. Included in `totals`.
    pub unassigned_calls: usize,
    pub needs: Vec<RankedValue>,
    pub objections: Vec<RankedValue>,
}

impl CohortMetrics {
    pub fn top_needs(&self, n: usize) -> &[RankedValue] {
        &self.needs[..n.min(self.needs.len())]
    }

    pub fn top_objections(&self, n: usize) -> &[RankedValue] {
        &self.objections[..n.min(self.objections.len())]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamReport {
    pub members: BTreeMap<Uuid, MemberMetrics>,
    pub cohort: CohortMetrics,
}

impl TeamReport {
    pub fn assigned_calls(&self) -> usize {
        self.members.values().map(|metrics| metrics.total_calls).sum()
    }
}

/// Single-pass fold. Accumulators built over consecutive chunks can be merged
/// in order and give the same report as one pass over the whole input.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    members: BTreeMap<Uuid, MemberMetrics>,
    totals: MemberMetrics,
    unassigned: usize,
    needs: FrequencyTable,
    objections: FrequencyTable,
}

impl Accumulator {
    pub fn push(
        &mut self,
        call: &ExtractedCall,
        member: Option<Uuid>,
        classifier: &ConversionClassifier,
    ) {
        let converted = classifier.is_conversion(call.outcome.as_deref());
        self.totals.record(call, converted);

        match member {
            Some(id) => self.members.entry(id).or_default().record(call, converted),
            None => self.unassigned += 1,
        }

        if let Some(need) = call.top_need.as_deref() {
            self.needs.add(need, 1);
        }
        if let Some(objection) = call.main_objection.ranking_label() {
            self.objections.add(objection, 1);
        }
    }

    pub fn merge(&mut self, other: &Accumulator) {
        for (id, metrics) in &other.members {
            self.members.entry(*id).or_default().merge(metrics);
        }
        self.totals.merge(&other.totals);
        self.unassigned += other.unassigned;
        self.needs.merge(&other.needs);
        self.objections.merge(&other.objections);
    }

    pub fn finish(self) -> TeamReport {
        TeamReport {
            cohort: CohortMetrics {
                totals: self.totals,
                unassigned_calls: self.unassigned,
                needs: self.needs.ranked(),
                objections: self.objections.ranked(),
            },
            members: self.members,
        }
    }
}

pub fn aggregate<'a, I>(calls: I, classifier: &ConversionClassifier) -> TeamReport
where
    I: IntoIterator<Item = (&'a ExtractedCall, Option<Uuid>)>,
{
    let mut accumulator = Accumulator::default();
    for (call, member) in calls {
        accumulator.push(call, member, classifier);
    }
    accumulator.finish()
}

pub fn aggregate_analyzed(calls: &[AnalyzedCall], classifier: &ConversionClassifier) -> TeamReport {
    aggregate(
        calls
            .iter()
            .map(|analyzed| (&analyzed.extracted, analyzed.call.team_member_id)),
        classifier,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Objection;

    fn call(score: Option<i32>, need: Option<&str>, outcome: Option<&str>) -> ExtractedCall {
        ExtractedCall {
            heat_score: score,
            top_need: need.map(str::to_string),
            main_objection: Objection::Unidentified,
            outcome: outcome.map(str::to_string),
        }
    }

    fn with_objection(objection: Objection) -> ExtractedCall {
        ExtractedCall {
            main_objection: objection,
            ..call(None, None, None)
        }
    }

    #[test]
    fn empty_input_yields_zeroed_report() {
        let report = aggregate(std::iter::empty(), &ConversionClassifier::default());
        assert!(report.members.is_empty());
        assert_eq!(report.cohort.totals.total_calls, 0);
        assert_eq!(report.cohort.totals.conversion_rate(), 0.0);
        assert_eq!(report.cohort.totals.average_heat_score(), None);
        assert!(report.cohort.needs.is_empty());
        assert!(report.cohort.objections.is_empty());
        assert!(report.cohort.top_needs(3).is_empty());
    }

    #[test]
    fn average_skips_unknown_scores() {
        let member = Uuid::new_v4();
        let calls = [call(Some(8), None, None), call(None, None, None), call(Some(4), None, None)];
        let report = aggregate(
            calls.iter().map(|c| (c, Some(member))),
            &ConversionClassifier::default(),
        );

        let metrics = report.members[&member];
        assert_eq!(metrics.total_calls, 3);
        assert_eq!(metrics.scored_calls, 2);
        assert_eq!(metrics.average_heat_score(), Some(6.0));
        assert_eq!(report.cohort.totals.average_heat_score(), Some(6.0));
    }

    #[test]
    fn genuine_zero_scores_count_toward_average() {
        let calls = [call(Some(0), None, None), call(Some(4), None, None)];
        let report = aggregate(calls.iter().map(|c| (c, None)), &ConversionClassifier::default());
        assert_eq!(report.cohort.totals.average_heat_score(), Some(2.0));
    }

    #[test]
    fn out_of_range_scores_are_averaged_without_panicking() {
        let calls = [
            call(Some(i32::MAX), None, None),
            call(Some(i32::MAX), None, None),
            call(Some(-5), None, None),
        ];
        let report = aggregate(calls.iter().map(|c| (c, None)), &ConversionClassifier::default());
        let average = report.cohort.totals.average_heat_score().unwrap();
        assert!(average > 1.0e9);
    }

    #[test]
    fn conversion_rate_is_bounded_and_rounded() {
        for total in 0..40usize {
            for converted in 0..=total {
                let rate = conversion_rate(converted, total);
                if total == 0 {
                    assert_eq!(rate, 0.0);
                } else {
                    let expected = round_one_decimal(converted as f64 / total as f64 * 100.0);
                    assert_eq!(rate, expected);
                    assert!((0.0..=100.0).contains(&rate));
                }
            }
        }
        assert_eq!(conversion_rate(1, 3), 33.3);
        assert_eq!(conversion_rate(2, 3), 66.7);
    }

    #[test]
    fn classifier_matches_keywords_case_insensitively() {
        let classifier = ConversionClassifier::default();
        assert!(classifier.is_conversion(Some("Contract SIGNED on the call")));
        assert!(classifier.is_conversion(Some("Demo booked for Friday")));
        assert!(!classifier.is_conversion(Some("Appointment scheduled")));
        assert!(!classifier.is_conversion(None));

        let custom = ConversionClassifier::new(["Scheduled"]);
        assert!(custom.is_conversion(Some("Appointment scheduled")));
    }

    #[test]
    fn unassigned_calls_count_toward_cohort_only() {
        let alice = Uuid::new_v4();
        let calls = [
            (call(Some(9), None, Some("Closed won")), Some(alice)),
            (call(Some(3), None, Some("Closed won")), None),
            (call(None, None, Some("No answer")), None),
        ];
        let report = aggregate(
            calls.iter().map(|(c, member)| (c, *member)),
            &ConversionClassifier::default(),
        );

        assert_eq!(report.members.len(), 1);
        assert_eq!(report.members[&alice].total_calls, 1);
        assert_eq!(report.members[&alice].converted_calls, 1);
        assert_eq!(report.cohort.totals.total_calls, 3);
        assert_eq!(report.cohort.totals.converted_calls, 2);
        assert_eq!(report.cohort.unassigned_calls, 2);
        assert_eq!(report.assigned_calls(), 1);
        assert_eq!(report.cohort.totals.conversion_rate(), 66.7);
    }

    #[test]
    fn ranking_breaks_ties_by_first_seen() {
        let calls = [
            call(None, Some("Pricing clarity"), None),
            call(None, Some("Insurance verification"), None),
            call(None, Some("Insurance verification"), None),
            call(None, Some("Evening hours"), None),
            call(None, Some("Pricing clarity"), None),
            call(None, None, None),
        ];
        let report = aggregate(calls.iter().map(|c| (c, None)), &ConversionClassifier::default());

        let values: Vec<(&str, usize)> = report
            .cohort
            .needs
            .iter()
            .map(|ranked| (ranked.value.as_str(), ranked.count))
            .collect();
        assert_eq!(
            values,
            vec![
                ("Pricing clarity", 2),
                ("Insurance verification", 2),
                ("Evening hours", 1),
            ]
        );
        assert_eq!(report.cohort.top_needs(1).len(), 1);
        assert_eq!(report.cohort.top_needs(10).len(), 3);
    }

    #[test]
    fn objection_ranking_excludes_unidentified() {
        let calls = [
            with_objection(Objection::Unidentified),
            with_objection(Objection::NoneSignificant),
            with_objection(Objection::Raised("Too expensive".to_string())),
            with_objection(Objection::NoneSignificant),
        ];
        let report = aggregate(calls.iter().map(|c| (c, None)), &ConversionClassifier::default());
        assert_eq!(report.cohort.objections.len(), 2);
        assert_eq!(report.cohort.objections[0].value, "No significant objections");
        assert_eq!(report.cohort.objections[0].count, 2);
        assert_eq!(report.cohort.top_objections(3)[1].value, "Too expensive");
    }

    #[test]
    fn merged_partials_match_single_pass() {
        let members = [Uuid::new_v4(), Uuid::new_v4()];
        let calls: Vec<(ExtractedCall, Option<Uuid>)> = (0..12)
            .map(|i| {
                let score = if i % 3 == 0 { None } else { Some(i % 11) };
                let need = ["Speed", "Price match", "Coverage"][i as usize % 3];
                let outcome = if i % 4 == 0 { "Closed" } else { "Follow up" };
                let member = if i % 5 == 0 { None } else { Some(members[i as usize % 2]) };
                (call(score, Some(need), Some(outcome)), member)
            })
            .collect();
        let classifier = ConversionClassifier::default();

        let single = aggregate(calls.iter().map(|(c, m)| (c, *m)), &classifier);

        let (left, right) = calls.split_at(5);
        let mut first = Accumulator::default();
        for (c, m) in left {
            first.push(c, *m, &classifier);
        }
        let mut second = Accumulator::default();
        for (c, m) in right {
            second.push(c, *m, &classifier);
        }
        first.merge(&second);

        assert_eq!(first.finish(), single);
    }

    #[test]
    fn member_metrics_merge_sums_fields() {
        let mut a = MemberMetrics {
            total_calls: 3,
            converted_calls: 1,
            scored_calls: 2,
            heat_score_sum: 12,
        };
        let b = MemberMetrics {
            total_calls: 2,
            converted_calls: 2,
            scored_calls: 1,
            heat_score_sum: 9,
        };
        a.merge(&b);
        assert_eq!(a.total_calls, 5);
        assert_eq!(a.converted_calls, 3);
        assert_eq!(a.average_heat_score(), Some(7.0));
        assert_eq!(a.conversion_rate(), 60.0);
    }
}
