use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Client, ClientCalls, RawCall, TeamMember};

/// One line of a call import file.
#[derive(Debug, Clone, Deserialize)]
pub struct CallImportRow {
    pub client_key: String,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub member_name: Option<String>,
    #[serde(default)]
    pub member_role: Option<String>,
    #[serde(default)]
    pub prospect_name: Option<String>,
    #[serde(default)]
    pub analysis: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub source_key: Option<String>,
}

impl CallImportRow {
    pub fn member(&self) -> Option<&str> {
        non_blank(self.member_name.as_deref())
    }

    pub fn analysis_text(&self) -> Option<&str> {
        non_blank(self.analysis.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

pub fn read_rows<R: Read>(reader: R) -> Result<Vec<CallImportRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let mut rows = Vec::new();
    for result in reader.deserialize::<CallImportRow>() {
        rows.push(result?);
    }
    Ok(rows)
}

pub fn read_rows_from_path(path: &Path) -> Result<Vec<CallImportRow>> {
    let file = std::fs::File::open(path)?;
    read_rows(file)
}

/// Builds an in-memory dataset for one client. Member ids are generated per
/// distinct member name, in first-seen order.
pub fn client_calls(rows: &[CallImportRow], client_key: &str) -> Result<ClientCalls> {
    let client_rows: Vec<&CallImportRow> = rows
        .iter()
        .filter(|row| row.client_key.trim() == client_key)
        .collect();

    let Some(first) = client_rows.first() else {
        return Err(Error::UnknownClient(client_key.to_string()));
    };

    let client = Client {
        key: client_key.to_string(),
        business_name: client_rows
            .iter()
            .find_map(|row| non_blank(row.business_name.as_deref()))
            .unwrap_or(first.client_key.as_str())
            .to_string(),
    };

    let mut members: Vec<TeamMember> = Vec::new();
    let mut member_ids: HashMap<String, Uuid> = HashMap::new();
    let mut calls = Vec::with_capacity(client_rows.len());

    for row in client_rows {
        let team_member_id = row.member().map(|name| {
            *member_ids.entry(name.to_string()).or_insert_with(|| {
                let member = TeamMember {
                    id: Uuid::new_v4(),
                    name: name.to_string(),
                    role: non_blank(row.member_role.as_deref()).map(str::to_string),
                };
                let id = member.id;
                members.push(member);
                id
            })
        });

        calls.push(RawCall {
            id: Uuid::new_v4(),
            prospect_name: non_blank(row.prospect_name.as_deref()).map(str::to_string),
            analysis_text: row.analysis_text().map(str::to_string),
            team_member_id,
            created_at: row.created_at,
        });
    }

    Ok(ClientCalls {
        client,
        members,
        calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
client_key,business_name,member_name,member_role,prospect_name,analysis,created_at,source_key
bright-smile,Bright Smile Dental,Maya Chen,Closer,Dana Ruiz,\"HEATCHECK: 8/10
OUTCOME: Contract signed\",2026-03-10T15:00:00Z,bs-1
bright-smile,,,,,,2026-03-11T09:30:00Z,
bright-smile,,Maya Chen,,Lee Park,OUTCOME: Follow up,2026-03-11T10:00:00Z,bs-3
other-clinic,Other Clinic,Jon Bell,,,OUTCOME: Closed,2026-03-11T10:00:00Z,oc-1
";

    #[test]
    fn reads_rows_with_optional_columns() {
        let rows = read_rows(SAMPLE.as_bytes()).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].member(), Some("Maya Chen"));
        assert!(rows[0].analysis_text().unwrap().contains("OUTCOME"));
        assert_eq!(rows[1].member(), None);
        assert_eq!(rows[1].analysis_text(), None);
        assert_eq!(rows[1].source_key.as_deref().filter(|k| !k.is_empty()), None);
    }

    #[test]
    fn builds_client_dataset_with_shared_member_ids() {
        let rows = read_rows(SAMPLE.as_bytes()).unwrap();
        let dataset = client_calls(&rows, "bright-smile").unwrap();

        assert_eq!(dataset.client.business_name, "Bright Smile Dental");
        assert_eq!(dataset.calls.len(), 3);
        assert_eq!(dataset.members.len(), 1);
        assert_eq!(dataset.members[0].role.as_deref(), Some("Closer"));

        let maya = dataset.members[0].id;
        assert_eq!(dataset.calls[0].team_member_id, Some(maya));
        assert_eq!(dataset.calls[1].team_member_id, None);
        assert_eq!(dataset.calls[2].team_member_id, Some(maya));
        assert_eq!(dataset.member_name(maya), Some("Maya Chen"));
    }

    #[test]
    fn unknown_client_is_an_error() {
        let rows = read_rows(SAMPLE.as_bytes()).unwrap();
        let err = client_calls(&rows, "missing").unwrap_err();
        assert!(matches!(err, Error::UnknownClient(key) if key == "missing"));
    }

    #[test]
    fn malformed_timestamp_is_reported() {
        let bad = "client_key,created_at\nacme,yesterday\n";
        assert!(matches!(read_rows(bad.as_bytes()), Err(Error::Csv(_))));
    }
}
