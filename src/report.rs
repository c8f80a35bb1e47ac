use std::fmt::Write;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::aggregate::{MemberMetrics, RankedValue, TeamReport};
use crate::extract::ExtractionStats;
use crate::models::{AnalyzedCall, ClientCalls, HeatTier, Objection};
use crate::normalize::truncate_chars;
use crate::projection::project_unassigned;

pub const UNKNOWN_SCORE: &str = "N/A";
pub const NOT_SPECIFIED: &str = "Not specified";
pub const NONE_IDENTIFIED: &str = "None identified";
pub const NO_SIGNIFICANT_OBJECTIONS: &str = "No significant objections";
pub const UNKNOWN_PROSPECT: &str = "Unknown Prospect";
pub const UNASSIGNED: &str = "Unassigned";

const BREAKDOWN_ROWS: usize = 20;
const TOP_CALLS: usize = 3;

pub fn score_label(score: Option<i32>) -> String {
    match score {
        Some(score) => score.to_string(),
        None => UNKNOWN_SCORE.to_string(),
    }
}

pub fn tier_label(score: Option<i32>) -> &'static str {
    score.map_or(UNKNOWN_SCORE, |score| HeatTier::for_score(score).label())
}

pub fn average_label(average: Option<f64>) -> String {
    match average {
        Some(average) => format!("{average:.1}"),
        None => UNKNOWN_SCORE.to_string(),
    }
}

pub fn text_or<'a>(value: Option<&'a str>, placeholder: &'a str) -> &'a str {
    value.unwrap_or(placeholder)
}

pub fn objection_label(objection: &Objection) -> &str {
    match objection {
        Objection::Unidentified => NONE_IDENTIFIED,
        Objection::NoneSignificant => NO_SIGNIFICANT_OBJECTIONS,
        Objection::Raised(text) => text,
    }
}

/// Display name for a member id, falling back to a short id label for
/// members missing from the roster.
pub fn member_label(dataset: &ClientCalls, id: Uuid) -> String {
    dataset
        .member_name(id)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Member {}", &id.simple().to_string()[..8]))
}

fn cell(value: &str, max_chars: usize) -> String {
    truncate_chars(value, max_chars).replace('|', "/").replace('\n', " ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberRow {
    pub id: Uuid,
    pub name: String,
    pub role: Option<String>,
    pub metrics: MemberMetrics,
}

/// Every rostered member plus anyone with calls, busiest first.
pub fn member_rows(team: &TeamReport, dataset: &ClientCalls) -> Vec<MemberRow> {
    let mut rows: Vec<MemberRow> = dataset
        .members
        .iter()
        .map(|member| MemberRow {
            id: member.id,
            name: member.name.clone(),
            role: member.role.clone(),
            metrics: team.members.get(&member.id).copied().unwrap_or_default(),
        })
        .collect();

    for (id, metrics) in &team.members {
        if !rows.iter().any(|row| row.id == *id) {
            rows.push(MemberRow {
                id: *id,
                name: member_label(dataset, *id),
                role: None,
                metrics: *metrics,
            });
        }
    }

    rows.sort_by(|a, b| {
        b.metrics
            .total_calls
            .cmp(&a.metrics.total_calls)
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

/// Highest scores first; ties keep input order.
pub fn top_performing_calls(calls: &[AnalyzedCall], threshold: i32) -> Vec<&AnalyzedCall> {
    let mut top: Vec<&AnalyzedCall> = calls
        .iter()
        .filter(|call| call.extracted.heat_score.is_some_and(|score| score >= threshold))
        .collect();
    top.sort_by(|a, b| b.extracted.heat_score.cmp(&a.extracted.heat_score));
    top
}

pub fn call_line(analyzed: &AnalyzedCall, member: Option<&str>) -> String {
    let extracted = &analyzed.extracted;
    format!(
        "- {} {} [{}] HeatCheck {} ({}) | need: {} | objection: {} | outcome: {}",
        analyzed.call.created_at.format("%Y-%m-%d %H:%M"),
        text_or(analyzed.call.prospect_name.as_deref(), UNKNOWN_PROSPECT),
        member.unwrap_or(UNASSIGNED),
        score_label(extracted.heat_score),
        tier_label(extracted.heat_score),
        text_or(extracted.top_need.as_deref(), NOT_SPECIFIED),
        objection_label(&extracted.main_objection),
        text_or(extracted.outcome.as_deref(), NOT_SPECIFIED),
    )
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub title: String,
    pub top_n: usize,
    pub high_performer_threshold: i32,
    /// Adds the estimate section when set.
    pub projection_share: Option<f64>,
}

fn write_ranked(output: &mut String, ranked: &[RankedValue], empty: &str) {
    if ranked.is_empty() {
        let _ = writeln!(output, "{empty}");
        return;
    }
    for (index, value) in ranked.iter().enumerate() {
        let _ = writeln!(
            output,
            "{}. {} ({} {})",
            index + 1,
            value.value,
            value.count,
            if value.count == 1 { "call" } else { "calls" }
        );
    }
}

pub fn build_report(
    dataset: &ClientCalls,
    since: DateTime<Utc>,
    analyzed: &[AnalyzedCall],
    team: &TeamReport,
    stats: &ExtractionStats,
    options: &ReportOptions,
) -> String {
    let cohort = &team.cohort;
    let mut output = String::new();

    let _ = writeln!(output, "# {}", options.title);
    let _ = writeln!(
        output,
        "Generated for {} ({}) with calls since {}",
        dataset.client.business_name,
        dataset.client.key,
        since.format("%Y-%m-%d %H:%M UTC")
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Performance Metrics");
    let _ = writeln!(output, "- Total calls analyzed: {}", cohort.totals.total_calls);
    let _ = writeln!(
        output,
        "- Average HeatCheck score: {} (from {} scored calls)",
        average_label(cohort.totals.average_heat_score()),
        cohort.totals.scored_calls
    );
    let _ = writeln!(
        output,
        "- Conversion rate: {:.1}% ({} of {})",
        cohort.totals.conversion_rate(),
        cohort.totals.converted_calls,
        cohort.totals.total_calls
    );
    let _ = writeln!(output, "- Unassigned calls: {}", cohort.unassigned_calls);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Needs / Pain Points");
    write_ranked(
        &mut output,
        cohort.top_needs(options.top_n),
        "No needs identified in this window.",
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Objections");
    write_ranked(
        &mut output,
        cohort.top_objections(options.top_n),
        "No objections identified in this window.",
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Performing Calls");
    let top_calls = top_performing_calls(analyzed, options.high_performer_threshold);
    if top_calls.is_empty() {
        let _ = writeln!(
            output,
            "No calls with HeatCheck {}+ in this window.",
            options.high_performer_threshold
        );
    } else {
        for call in top_calls.iter().take(TOP_CALLS) {
            let _ = writeln!(
                output,
                "- {} ({}), HeatCheck {}: {}",
                text_or(call.call.prospect_name.as_deref(), UNKNOWN_PROSPECT),
                call.call.created_at.format("%Y-%m-%d"),
                score_label(call.extracted.heat_score),
                text_or(call.extracted.outcome.as_deref(), NOT_SPECIFIED)
            );
        }
    }

    let rows = member_rows(team, dataset);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Team Performance");
    if rows.is_empty() {
        let _ = writeln!(output, "No team members on record for this client.");
    } else {
        let _ = writeln!(
            output,
            "| Member | Role | Calls | Converted | Conversion | Avg HeatCheck |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for row in &rows {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {:.1}% | {} |",
                cell(&row.name, 40),
                cell(text_or(row.role.as_deref(), "-"), 30),
                row.metrics.total_calls,
                row.metrics.converted_calls,
                row.metrics.conversion_rate(),
                average_label(row.metrics.average_heat_score())
            );
        }
    }

    if let Some(share) = options.projection_share {
        let projected = project_unassigned(team, share);
        let _ = writeln!(output);
        let _ = writeln!(output, "## Projected Team Performance (estimate)");
        let _ = writeln!(
            output,
            "Illustrative only: {:.0}% of {} unassigned calls spread by each member's share of assigned calls. Not for real reporting.",
            share.clamp(0.0, 1.0) * 100.0,
            cohort.unassigned_calls
        );
        if projected.is_empty() {
            let _ = writeln!(output, "No assigned calls to project from.");
        } else {
            let _ = writeln!(
                output,
                "| Member | Actual Calls | Est. Calls | Est. Converted | Est. Conversion |"
            );
            let _ = writeln!(output, "|---|---|---|---|---|");
            for member in &projected {
                let name = member_label(dataset, member.member_id);
                let _ = writeln!(
                    output,
                    "| {} | {} | {} | {} | {:.1}% |",
                    cell(&name, 40),
                    member.actual.total_calls,
                    member.projected_total_calls(),
                    member.projected_converted_calls(),
                    member.projected_conversion_rate()
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Detailed Call Breakdown");
    if analyzed.is_empty() {
        let _ = writeln!(output, "No calls recorded for this window.");
    } else {
        let _ = writeln!(
            output,
            "| Date | Prospect | HeatCheck | Top Need/Pain Point | Main Objection | Call Outcome |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for call in analyzed.iter().take(BREAKDOWN_ROWS) {
            let extracted = &call.extracted;
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} |",
                call.call.created_at.format("%Y-%m-%d"),
                cell(text_or(call.call.prospect_name.as_deref(), UNKNOWN_PROSPECT), 18),
                score_label(extracted.heat_score),
                cell(text_or(extracted.top_need.as_deref(), NOT_SPECIFIED), 28),
                cell(objection_label(&extracted.main_objection), 23),
                cell(text_or(extracted.outcome.as_deref(), NOT_SPECIFIED), 25)
            );
        }
        if analyzed.len() > BREAKDOWN_ROWS {
            let _ = writeln!(output, "\n{} more calls not shown.", analyzed.len() - BREAKDOWN_ROWS);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Extraction Diagnostics");
    let _ = writeln!(
        output,
        "- {} calls, {} without analysis text",
        stats.calls, stats.unanalyzable
    );
    let _ = writeln!(
        output,
        "- Fields not found: score {}, need {}, objection {}, outcome {}",
        stats.missing_heat, stats.missing_need, stats.missing_objection, stats.missing_outcome
    );

    output
}
