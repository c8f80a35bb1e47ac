use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingest::CallImportRow;
use crate::models::{Client, ClientCalls, RawCall, TeamMember};

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const SEED_CLIENT: (&str, &str) = ("bright-smile", "Bright Smile Dental");

/// Demo calls covering each analysis template generation the extractor knows.
fn seed_rows(now: DateTime<Utc>) -> Vec<CallImportRow> {
    let calls: Vec<(&str, Option<&str>, Option<&str>, &str, i64)> = vec![
        (
            "seed-001",
            Some("Maya Chen"),
            Some("Dana Ruiz"),
            "CALL ANALYSIS REPORT\n\nHEATCHECK: 9/10\n\nPROSPECT'S NEEDS:\n* Insurance verification\n\nOBJECTIONS:\n* Price is too high\n\nOUTCOME: Contract signed for full treatment plan\n",
            2,
        ),
        (
            "seed-002",
            Some("Maya Chen"),
            Some("Lee Park"),
            "HeatCheck Score: 7\nTOP NEED/PAIN POINT: Evening appointments\nMAIN OBJECTION: Needs to check with spouse\nCALL OUTCOME: Demo scheduled for Thursday",
            20,
        ),
        (
            "seed-003",
            Some("Jordan Blake"),
            Some("Sam Ortiz"),
            "PROSPECT'S NEEDS AND PAIN POINTS\n\n* Same-week emergency visits\n* Payment plans\n\nOBJECTIONS RAISED AND HANDLING\n\n* No significant objections\n\nOUTCOME\nFollow-up call booked",
            30,
        ),
        (
            "seed-004",
            Some("Jordan Blake"),
            Some("Kim Wu"),
            "HEATCHECK: 3/10\nTOP NEED: Lower monthly cost\nMAIN OBJECTION: Price is too high\nOUTCOME: Hesitant, wants to compare pricing",
            52,
        ),
        (
            "seed-005",
            None,
            Some("Ari Novak"),
            "Medical consultation scheduling. Intent: Appointment scheduled. Sentiment: Positive.",
            75,
        ),
        ("seed-006", None, None, "", 96),
    ];

    calls
        .into_iter()
        .map(|(source_key, member, prospect, analysis, hours_ago)| CallImportRow {
            client_key: SEED_CLIENT.0.to_string(),
            business_name: Some(SEED_CLIENT.1.to_string()),
            member_name: member.map(str::to_string),
            member_role: member.map(|_| "Sales Representative".to_string()),
            prospect_name: prospect.map(str::to_string),
            analysis: Some(analysis.to_string()).filter(|text| !text.is_empty()),
            created_at: now - Duration::hours(hours_ago),
            source_key: Some(source_key.to_string()),
        })
        .collect()
}

pub async fn seed(pool: &PgPool) -> Result<usize> {
    import_rows(pool, &seed_rows(Utc::now())).await
}

async fn upsert_client(pool: &PgPool, key: &str, business_name: Option<&str>) -> Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO call_analytics.clients (id, client_key, business_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (client_key) DO UPDATE
        SET business_name = COALESCE(NULLIF($4, ''), call_analytics.clients.business_name)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(key)
    .bind(business_name.unwrap_or(key))
    .bind(business_name.unwrap_or(""))
    .fetch_one(pool)
    .await
    .map_err(|err| Error::upstream("upserting client", err))?
    .get("id");

    Ok(id)
}

async fn upsert_member(
    pool: &PgPool,
    client_id: Uuid,
    name: &str,
    role: Option<&str>,
) -> Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO call_analytics.team_members (id, client_id, member_name, member_role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (client_id, member_name) DO UPDATE
        SET member_role = COALESCE(EXCLUDED.member_role, call_analytics.team_members.member_role)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(client_id)
    .bind(name)
    .bind(role)
    .fetch_one(pool)
    .await
    .map_err(|err| Error::upstream("upserting team member", err))?
    .get("id");

    Ok(id)
}

/// Inserts rows, skipping any whose `source_key` already exists. Returns the
/// number of new calls.
pub async fn import_rows(pool: &PgPool, rows: &[CallImportRow]) -> Result<usize> {
    let mut inserted = 0usize;

    for row in rows {
        let client_key = row.client_key.trim();
        let client_id = upsert_client(pool, client_key, row.business_name.as_deref()).await?;

        let team_member_id = match row.member() {
            Some(name) => {
                Some(upsert_member(pool, client_id, name, row.member_role.as_deref()).await?)
            }
            None => None,
        };

        let source_key = row
            .source_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let result = sqlx::query(
            r#"
            INSERT INTO call_analytics.calls
            (id, client_id, team_member_id, prospect_name, analysis, created_at, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(team_member_id)
        .bind(row.prospect_name.as_deref())
        .bind(row.analysis_text())
        .bind(row.created_at)
        .bind(&source_key)
        .execute(pool)
        .await
        .map_err(|err| Error::upstream("inserting call", err))?;

        if result.rows_affected() > 0 {
            inserted += 1;
        } else {
            debug!(source_key = %source_key, "call already imported");
        }
    }

    info!(inserted, total = rows.len(), "import finished");
    Ok(inserted)
}

async fn fetch_client(pool: &PgPool, client_key: &str) -> Result<(Uuid, Client)> {
    let row = sqlx::query(
        "SELECT id, client_key, business_name FROM call_analytics.clients WHERE client_key = $1",
    )
    .bind(client_key)
    .fetch_optional(pool)
    .await
    .map_err(|err| Error::upstream("loading client", err))?
    .ok_or_else(|| Error::UnknownClient(client_key.to_string()))?;

    Ok((
        row.get("id"),
        Client {
            key: row.get("client_key"),
            business_name: row.get("business_name"),
        },
    ))
}

pub async fn fetch_team_members(pool: &PgPool, client_id: Uuid) -> Result<Vec<TeamMember>> {
    let rows = sqlx::query(
        "SELECT id, member_name, member_role FROM call_analytics.team_members \
         WHERE client_id = $1 ORDER BY member_name",
    )
    .bind(client_id)
    .fetch_all(pool)
    .await
    .map_err(|err| Error::upstream("loading team members", err))?;

    Ok(rows
        .into_iter()
        .map(|row| TeamMember {
            id: row.get("id"),
            name: row.get("member_name"),
            role: row.get("member_role"),
        })
        .collect())
}

/// Member names match case-insensitively, like `ClientCalls::retain_member`.
fn client_calls_query(by_member: bool) -> String {
    let mut query = String::from(
        "SELECT c.id, c.prospect_name, c.analysis, c.team_member_id, c.created_at \
         FROM call_analytics.calls c \
         LEFT JOIN call_analytics.team_members tm ON tm.id = c.team_member_id \
         WHERE c.client_id = $1 AND c.created_at >= $2",
    );

    if by_member {
        query.push_str(" AND lower(tm.member_name) = lower($3)");
    }
    query.push_str(" ORDER BY c.created_at DESC");
    query
}

/// Loads a client's calls created at or after `since`, newest first,
/// optionally limited to one team member by name.
pub async fn fetch_client_calls(
    pool: &PgPool,
    client_key: &str,
    since: DateTime<Utc>,
    member: Option<&str>,
) -> Result<ClientCalls> {
    let (client_id, client) = fetch_client(pool, client_key).await?;
    let members = fetch_team_members(pool, client_id).await?;

    let member = member.map(str::trim);
    let query = client_calls_query(member.is_some());
    let mut rows = sqlx::query(&query).bind(client_id).bind(since);

    if let Some(name) = member {
        rows = rows.bind(name);
    }

    let records = rows
        .fetch_all(pool)
        .await
        .map_err(|err| Error::upstream("loading calls", err))?;

    let calls = records
        .into_iter()
        .map(|row| RawCall {
            id: row.get("id"),
            prospect_name: row.get("prospect_name"),
            analysis_text: row.get("analysis"),
            team_member_id: row.get("team_member_id"),
            created_at: row.get("created_at"),
        })
        .collect::<Vec<_>>();

    debug!(client = client_key, calls = calls.len(), "loaded calls");

    Ok(ClientCalls {
        client,
        members,
        calls,
    })
}
