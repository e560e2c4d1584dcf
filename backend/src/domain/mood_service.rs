//! Mood logging and aggregation.

use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::info;

use crate::db::DbConnection;
use crate::domain::calendar;
use crate::domain::models::{Mood, MoodLog};
use crate::error::AppError;

/// One calendar day's run of mood entries, see [`group_by_day`].
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub moods: Vec<MoodLog>,
}

#[derive(Clone)]
pub struct MoodService {
    db: DbConnection,
}

impl MoodService {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Validate and append a mood entry.
    ///
    /// The timestamp is always server-assigned; handlers inject `now` so
    /// the operation stays deterministic under test.
    pub async fn log_mood(
        &self,
        user_id: i64,
        raw_mood: Option<&str>,
        now: DateTime<FixedOffset>,
    ) -> Result<MoodLog, AppError> {
        let label = raw_mood.ok_or(AppError::Validation {
            field: "mood",
            message: "This field is required.".to_string(),
        })?;

        let mood = Mood::parse(label).map_err(|message| AppError::Validation {
            field: "mood",
            message,
        })?;

        let log = self.db.insert_mood_log(user_id, mood, &now).await?;
        info!("Logged mood {} for user {}", mood.as_str(), user_id);
        Ok(log)
    }

    /// Entries within the Monday–Sunday week containing `today`, oldest
    /// first. Both boundaries are inclusive.
    pub async fn weekly_moods(&self, user_id: i64, today: NaiveDate) -> Result<Vec<MoodLog>> {
        let (monday, sunday) = calendar::week_range(today);
        info!("Weekly moods for user {}: {} to {}", user_id, monday, sunday);

        self.db
            .list_moods_between(
                user_id,
                &calendar::day_start(monday),
                &calendar::day_end(sunday),
            )
            .await
    }

    /// Entries from the first of the current month onward, oldest first.
    /// The upper bound is open (month to date).
    pub async fn monthly_moods(&self, user_id: i64, today: NaiveDate) -> Result<Vec<MoodLog>> {
        let (first, _) = calendar::month_to_date(today);
        info!("Monthly moods for user {} since {}", user_id, first);

        self.db
            .list_moods_since(user_id, &calendar::day_start(first))
            .await
    }

    /// All of a user's entries, newest first, partitioned into
    /// consecutive same-day runs.
    pub async fn grouped_daily_moods(&self, user_id: i64) -> Result<Vec<DayGroup>> {
        let logs = self.db.list_moods_newest_first(user_id).await?;
        Ok(group_by_day(logs))
    }
}

/// Partition a sequence of entries into runs of consecutive equal
/// calendar day, preserving input order within and across runs.
///
/// This is a consecutive-run grouping, not a keyed aggregation: if the
/// input is not day-sorted the same day can legitimately appear in more
/// than one group.
pub fn group_by_day(logs: Vec<MoodLog>) -> Vec<DayGroup> {
    let mut groups: Vec<DayGroup> = Vec::new();
    for log in logs {
        let day = log.date.date_naive();
        match groups.last_mut() {
            Some(group) if group.date == day => group.moods.push(log),
            _ => groups.push(DayGroup {
                date: day,
                moods: vec![log],
            }),
        }
    }
    groups
}
