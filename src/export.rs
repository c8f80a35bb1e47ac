use std::io::Write;

use crate::error::Result;
use crate::models::{AnalyzedCall, ClientCalls};
use crate::report::{
    objection_label, score_label, text_or, NOT_SPECIFIED, UNASSIGNED, UNKNOWN_PROSPECT,
};

/// Spreadsheet apps need the BOM to detect UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const HEADERS: [&str; 8] = [
    "Date & Time",
    "Prospect Name",
    "Team Member",
    "HeatCheck Score",
    "Top Need/Pain Point",
    "Main Objection",
    "Call Outcome",
    "Call ID",
];

pub fn write_calls_csv<W: Write>(
    mut writer: W,
    dataset: &ClientCalls,
    calls: &[&AnalyzedCall],
) -> Result<()> {
    writer.write_all(UTF8_BOM)?;

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADERS)?;

    for analyzed in calls {
        let call = &analyzed.call;
        let extracted = &analyzed.extracted;
        let member = call
            .team_member_id
            .and_then(|id| dataset.member_name(id))
            .unwrap_or(UNASSIGNED);

        csv.write_record([
            call.created_at.format("%Y-%m-%d %H:%M:%S").to_string().as_str(),
            text_or(call.prospect_name.as_deref(), UNKNOWN_PROSPECT),
            member,
            score_label(extracted.heat_score).as_str(),
            text_or(extracted.top_need.as_deref(), NOT_SPECIFIED),
            objection_label(&extracted.main_objection),
            text_or(extracted.outcome.as_deref(), NOT_SPECIFIED),
            call.id.to_string().as_str(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;
    use crate::models::{Client, RawCall, TeamMember};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn analyzed(text: Option<&str>, member: Option<Uuid>, prospect: Option<&str>) -> AnalyzedCall {
        AnalyzedCall {
            call: RawCall {
                id: Uuid::nil(),
                prospect_name: prospect.map(str::to_string),
                analysis_text: text.map(str::to_string),
                team_member_id: member,
                created_at: Utc.with_ymd_and_hms(2026, 3, 10, 14, 5, 0).unwrap(),
            },
            extracted: extract(text),
        }
    }

    #[test]
    fn writes_bom_headers_and_placeholders() {
        let maya = TeamMember {
            id: Uuid::new_v4(),
            name: "Maya Chen".to_string(),
            role: None,
        };
        let dataset = ClientCalls {
            client: Client {
                key: "bright-smile".to_string(),
                business_name: "Bright Smile Dental".to_string(),
            },
            members: vec![maya.clone()],
            calls: Vec::new(),
        };
        let calls = [
            analyzed(
                Some("HEATCHECK: 8/10\nTOP NEED: Payment plans, flexible\nOUTCOME: Contract signed"),
                Some(maya.id),
                Some("Dana \"DJ\" Ruiz"),
            ),
            analyzed(None, None, None),
        ];
        let refs: Vec<&AnalyzedCall> = calls.iter().collect();

        let mut buffer = Vec::new();
        write_calls_csv(&mut buffer, &dataset, &refs).unwrap();

        assert!(buffer.starts_with(UTF8_BOM));
        let text = String::from_utf8(buffer[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Date & Time,Prospect Name,Team Member,HeatCheck Score,Top Need/Pain Point,Main Objection,Call Outcome,Call ID"
        );
        assert_eq!(
            lines[1],
            "2026-03-10 14:05:00,\"Dana \"\"DJ\"\" Ruiz\",Maya Chen,8,\"Payment plans, flexible\",None identified,Contract signed,00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            lines[2],
            "2026-03-10 14:05:00,Unknown Prospect,Unassigned,N/A,Not specified,None identified,Not specified,00000000-0000-0000-0000-000000000000"
        );
    }
}
