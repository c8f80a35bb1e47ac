use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One ingested call as supplied by the store. Never mutated after load.
#[derive(Debug, Clone)]
pub struct RawCall {
    pub id: Uuid,
    pub prospect_name: Option<String>,
    pub analysis_text: Option<String>,
    pub team_member_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMember {
    pub id: Uuid,
    pub name: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub key: String,
    pub business_name: String,
}

/// Everything loaded for one client's reporting window.
#[derive(Debug, Clone)]
pub struct ClientCalls {
    pub client: Client,
    pub members: Vec<TeamMember>,
    pub calls: Vec<RawCall>,
}

impl ClientCalls {
    pub fn member_name(&self, id: Uuid) -> Option<&str> {
        self.members
            .iter()
            .find(|member| member.id == id)
            .map(|member| member.name.as_str())
    }

    /// Drops calls not assigned to the named member, matched case-insensitively.
    /// An unknown name leaves no calls.
    pub fn retain_member(&mut self, name: &str) {
        let name = name.trim().to_lowercase();
        let id = self
            .members
            .iter()
            .find(|member| member.name.to_lowercase() == name)
            .map(|member| member.id);
        self.calls
            .retain(|call| id.is_some() && call.team_member_id == id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Objection {
    /// No objection label was found at all.
    Unidentified,
    /// A label was found and it says there was nothing worth noting.
    NoneSignificant,
    Raised(String),
}

impl Objection {
    /// Text used for frequency ranking. `Unidentified` is never ranked.
    pub fn ranking_label(&self) -> Option<&str> {
        match self {
            Objection::Unidentified => None,
            Objection::NoneSignificant => Some("No significant objections"),
            Objection::Raised(text) => Some(text),
        }
    }
}

/// Structured view of one analysis text. `None` means the field was not found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedCall {
    pub heat_score: Option<i32>,
    pub top_need: Option<String>,
    pub main_objection: Objection,
    pub outcome: Option<String>,
}

impl ExtractedCall {
    pub fn unanalyzable() -> Self {
        Self {
            heat_score: None,
            top_need: None,
            main_objection: Objection::Unidentified,
            outcome: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzedCall {
    pub call: RawCall,
    pub extracted: ExtractedCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatTier {
    Elite,
    High,
    Medium,
    Low,
}

impl HeatTier {
    pub fn for_score(score: i32) -> Self {
        match score {
            s if s >= 8 => HeatTier::Elite,
            s if s >= 6 => HeatTier::High,
            s if s >= 4 => HeatTier::Medium,
            _ => HeatTier::Low,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HeatTier::Elite => "elite",
            HeatTier::High => "high",
            HeatTier::Medium => "medium",
            HeatTier::Low => "low",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_score_thresholds() {
        assert_eq!(HeatTier::for_score(10), HeatTier::Elite);
        assert_eq!(HeatTier::for_score(8), HeatTier::Elite);
        assert_eq!(HeatTier::for_score(7), HeatTier::High);
        assert_eq!(HeatTier::for_score(4), HeatTier::Medium);
        assert_eq!(HeatTier::for_score(0), HeatTier::Low);
        assert_eq!(HeatTier::for_score(-2), HeatTier::Low);
    }

    #[test]
    fn member_scope_trims_and_ignores_case() {
        let member = TeamMember {
            id: Uuid::new_v4(),
            name: "Zoë Adams".to_string(),
            role: None,
        };
        let call = |team_member_id| RawCall {
            id: Uuid::new_v4(),
            prospect_name: None,
            analysis_text: None,
            team_member_id,
            created_at: Utc::now(),
        };
        let mut dataset = ClientCalls {
            client: Client {
                key: "bright-smile".to_string(),
                business_name: "Bright Smile Dental".to_string(),
            },
            members: vec![member.clone()],
            calls: vec![call(Some(member.id)), call(None)],
        };

        dataset.retain_member("  ZOË ADAMS ");
        assert_eq!(dataset.calls.len(), 1);
        assert_eq!(dataset.calls[0].team_member_id, Some(member.id));
    }

    #[test]
    fn unidentified_objection_is_not_ranked() {
        assert_eq!(Objection::Unidentified.ranking_label(), None);
        assert_eq!(
            Objection::NoneSignificant.ranking_label(),
            Some("No significant objections")
        );
        assert_eq!(
            Objection::Raised("Price".to_string()).ranking_label(),
            Some("Price")
        );
    }
}
