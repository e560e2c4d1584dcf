use serde::{Deserialize, Serialize};

/// Wire shape of a single mood log entry.
///
/// `date` carries a full RFC 3339 timestamp in the app's reference time
/// zone, even though the field keeps its historical name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodLogDto {
    pub id: i64,
    /// ID of the user this entry belongs to
    pub user: i64,
    /// One of the five mood labels, e.g. "Very Happy"
    pub mood: String,
    /// RFC 3339 timestamp, assigned server-side at creation
    pub date: String,
}

/// Body of POST /api/log-mood/.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMoodRequest {
    /// Mood label; validated against the fixed five-value set
    pub mood: Option<String>,
}

/// Generic `{"status": "OK"}` acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "OK".to_string(),
        }
    }
}

/// One calendar day's worth of entries in the daily-moods view.
///
/// Groups are runs of consecutive same-day entries in the order the
/// service returned them (newest day first), not a keyed aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMoodGroup {
    /// Calendar date (YYYY-MM-DD) shared by every entry in the group
    pub date: String,
    pub moods: Vec<MoodLogDto>,
}

/// Body of POST /signup and POST /login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}
