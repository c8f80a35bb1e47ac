//! Estimated member totals with unassigned calls handed out.
//!
//! This is an illustration for demo views only. Unassigned calls are spread
//! over members in proportion to the calls each member already has, and the
//! result is always rendered as an estimate. The authoritative numbers in
//! [`TeamReport`] are never modified.

use serde::Serialize;
use uuid::Uuid;

use crate::aggregate::{conversion_rate, MemberMetrics, TeamReport};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedMember {
    pub member_id: Uuid,
    /// Copy of the real metrics, untouched.
    pub actual: MemberMetrics,
    pub redistributed_calls: usize,
    pub redistributed_conversions: usize,
}

impl ProjectedMember {
    pub fn projected_total_calls(&self) -> usize {
        self.actual.total_calls + self.redistributed_calls
    }

    pub fn projected_converted_calls(&self) -> usize {
        self.actual.converted_calls + self.redistributed_conversions
    }

    pub fn projected_conversion_rate(&self) -> f64 {
        conversion_rate(self.projected_converted_calls(), self.projected_total_calls())
    }
}

/// `share` is clamped to `[0, 1]`. Members are returned in descending order of
/// projected calls.
pub fn project_unassigned(report: &TeamReport, share: f64) -> Vec<ProjectedMember> {
    let share = if share.is_finite() { share.clamp(0.0, 1.0) } else { 0.0 };
    let unassigned = report.cohort.unassigned_calls as f64;
    let assigned_total = report.assigned_calls();

    let mut projected: Vec<ProjectedMember> = report
        .members
        .iter()
        .map(|(id, metrics)| {
            let (extra_calls, extra_conversions) = if assigned_total == 0 {
                (0, 0)
            } else {
                let member_share = metrics.total_calls as f64 / assigned_total as f64;
                let extra_calls = (unassigned * member_share * share).floor() as usize;
                let own_ratio = if metrics.total_calls == 0 {
                    0.0
                } else {
                    metrics.converted_calls as f64 / metrics.total_calls as f64
                };
                (extra_calls, (extra_calls as f64 * own_ratio).floor() as usize)
            };

            ProjectedMember {
                member_id: *id,
                actual: *metrics,
                redistributed_calls: extra_calls,
                redistributed_conversions: extra_conversions,
            }
        })
        .collect();

    projected.sort_by(|a, b| b.projected_total_calls().cmp(&a.projected_total_calls()));
    projected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, ConversionClassifier};
    use crate::models::{ExtractedCall, Objection};

    fn call(outcome: &str) -> ExtractedCall {
        ExtractedCall {
            heat_score: Some(5),
            top_need: None,
            main_objection: Objection::Unidentified,
            outcome: Some(outcome.to_string()),
        }
    }

    fn sample_report() -> (TeamReport, Uuid, Uuid) {
        let busy = Uuid::new_v4();
        let quiet = Uuid::new_v4();
        let mut tagged = Vec::new();
        for i in 0..6 {
            let outcome = if i % 2 == 0 { "Closed" } else { "Follow up" };
            tagged.push((call(outcome), Some(busy)));
        }
        for _ in 0..2 {
            tagged.push((call("Follow up"), Some(quiet)));
        }
        for _ in 0..10 {
            tagged.push((call("Voicemail"), None));
        }
        let report = aggregate(
            tagged.iter().map(|(c, m)| (c, *m)),
            &ConversionClassifier::default(),
        );
        (report, busy, quiet)
    }

    #[test]
    fn redistributes_in_proportion_to_existing_calls() {
        let (report, busy, quiet) = sample_report();
        let projected = project_unassigned(&report, 0.7);

        assert_eq!(projected.len(), 2);
        assert_eq!(projected[0].member_id, busy);
        // 10 * 6/8 * 0.7 = 5.25
        assert_eq!(projected[0].redistributed_calls, 5);
        // own ratio 3/6
        assert_eq!(projected[0].redistributed_conversions, 2);
        assert_eq!(projected[0].projected_total_calls(), 11);

        assert_eq!(projected[1].member_id, quiet);
        // 10 * 2/8 * 0.7 = 1.75
        assert_eq!(projected[1].redistributed_calls, 1);
        assert_eq!(projected[1].redistributed_conversions, 0);
    }

    #[test]
    fn authoritative_report_is_unchanged() {
        let (report, busy, _) = sample_report();
        let before = report.clone();
        let projected = project_unassigned(&report, 1.0);

        assert_eq!(report, before);
        let busy_projection = projected.iter().find(|p| p.member_id == busy).unwrap();
        assert_eq!(busy_projection.actual, report.members[&busy]);
        assert_eq!(report.members[&busy].total_calls, 6);
    }

    #[test]
    fn projected_conversions_never_exceed_calls() {
        let (report, _, _) = sample_report();
        for share in [0.0, 0.3, 0.7, 1.0, 5.0, f64::NAN] {
            for member in project_unassigned(&report, share) {
                assert!(member.projected_converted_calls() <= member.projected_total_calls());
                assert!(member.redistributed_calls <= report.cohort.unassigned_calls);
            }
        }
    }

    #[test]
    fn zero_share_or_no_members_projects_nothing() {
        let (report, _, _) = sample_report();
        assert!(project_unassigned(&report, 0.0)
            .iter()
            .all(|member| member.redistributed_calls == 0));

        let empty = TeamReport::default();
        assert!(project_unassigned(&empty, 0.7).is_empty());
    }
}
