//! Main-registry row for a chat session (spec §3 "ChatSession", §6
//! `chat_sessions` table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatSessionRow {
    pub id: String,
    pub plan_id: Option<i64>,
    pub name: Option<String>,
    pub name_source: String,
    pub is_user_named: bool,
    pub is_active: bool,
    pub settings_json: String,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Provenance of a session's display name (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    Default,
    Plan,
    Heuristic,
    User,
}

impl NameSource {
    pub fn as_str(self) -> &'static str {
        match self {
            NameSource::Default => "default",
            NameSource::Plan => "plan",
            NameSource::Heuristic => "heuristic",
            NameSource::User => "user",
        }
    }
}

impl std::str::FromStr for NameSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(NameSource::Default),
            "plan" => Ok(NameSource::Plan),
            "heuristic" => Ok(NameSource::Heuristic),
            "user" => Ok(NameSource::User),
            other => Err(format!("unknown name_source: {other}")),
        }
    }
}

/// Per-session settings (spec §3: "default search provider, plan binding...").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_search_provider: Option<String>,
}
