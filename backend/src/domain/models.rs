//! Domain models for mood logs and user profiles.
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// The fixed five-value mood scale.
///
/// Wire labels match the historical choices exactly ("Very Happy", not
/// "VeryHappy"); anything else is rejected at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mood {
    VeryHappy,
    Happy,
    Neutral,
    Sad,
    VerySad,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Mood::VeryHappy,
        Mood::Happy,
        Mood::Neutral,
        Mood::Sad,
        Mood::VerySad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::VeryHappy => "Very Happy",
            Mood::Happy => "Happy",
            Mood::Neutral => "Neutral",
            Mood::Sad => "Sad",
            Mood::VerySad => "Very Sad",
        }
    }

    /// Parse a wire label into a mood value.
    pub fn parse(label: &str) -> Result<Mood, String> {
        match label {
            "Very Happy" => Ok(Mood::VeryHappy),
            "Happy" => Ok(Mood::Happy),
            "Neutral" => Ok(Mood::Neutral),
            "Sad" => Ok(Mood::Sad),
            "Very Sad" => Ok(Mood::VerySad),
            other => Err(format!("\"{}\" is not a valid choice.", other)),
        }
    }
}

/// A single mood entry. Append-only: created once per submission, never
/// mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodLog {
    pub id: i64,
    pub user_id: i64,
    pub mood: Mood,
    /// Server-assigned creation time in the reference time zone
    pub date: DateTime<FixedOffset>,
}

impl MoodLog {
    pub fn to_dto(&self) -> shared::MoodLogDto {
        shared::MoodLogDto {
            id: self.id,
            user: self.user_id,
            mood: self.mood.as_str().to_string(),
            date: crate::domain::calendar::format_timestamp(&self.date),
        }
    }
}

/// Per-user profile row, created lazily on the first avatar-change attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub user_id: i64,
    /// Web path of the current avatar image
    pub avatar: String,
    /// When the avatar was last changed; `None` until the first change
    pub last_changed: Option<DateTime<FixedOffset>>,
}
