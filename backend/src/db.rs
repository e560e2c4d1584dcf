use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool};
use std::sync::Arc;

use crate::domain::calendar;
use crate::domain::models::{Mood, MoodLog, Profile};

/// Avatar path a profile starts out with.
pub const DEFAULT_AVATAR: &str = "/media/avatars/default.png";

/// DbConnection manages database operations
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection
    pub async fn new(url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        let pool = SqlitePool::connect(url).await?;

        Self::setup_schema(&pool).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Initialize a test database with a unique name
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    /// Set up the required database schema
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mood_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                mood TEXT NOT NULL,
                date TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id INTEGER PRIMARY KEY REFERENCES users(id),
                avatar TEXT NOT NULL,
                last_changed TEXT
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Create a user and return its ID.
    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(calendar::format_timestamp(&calendar::now()))
        .execute(&*self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Look up a user by username; returns (id, password_hash).
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<(i64, String)>> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, password_hash FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await?;
        Ok(row)
    }

    /// Append a mood log entry and return the stored record.
    pub async fn insert_mood_log(
        &self,
        user_id: i64,
        mood: Mood,
        date: &DateTime<FixedOffset>,
    ) -> Result<MoodLog> {
        let result = sqlx::query("INSERT INTO mood_logs (user_id, mood, date) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(mood.as_str())
            .bind(calendar::format_timestamp(date))
            .execute(&*self.pool)
            .await?;

        Ok(MoodLog {
            id: result.last_insert_rowid(),
            user_id,
            mood,
            date: *date,
        })
    }

    /// Mood logs for a user within [start, end] inclusive, oldest first.
    pub async fn list_moods_between(
        &self,
        user_id: i64,
        start: &DateTime<FixedOffset>,
        end: &DateTime<FixedOffset>,
    ) -> Result<Vec<MoodLog>> {
        let rows = sqlx::query_as::<_, (i64, i64, String, String)>(
            "SELECT id, user_id, mood, date FROM mood_logs \
             WHERE user_id = ? AND date >= ? AND date <= ? ORDER BY date ASC",
        )
        .bind(user_id)
        .bind(calendar::format_timestamp(start))
        .bind(calendar::format_timestamp(end))
        .fetch_all(&*self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_mood_log).collect()
    }

    /// Mood logs for a user from `start` onward, oldest first.
    pub async fn list_moods_since(
        &self,
        user_id: i64,
        start: &DateTime<FixedOffset>,
    ) -> Result<Vec<MoodLog>> {
        let rows = sqlx::query_as::<_, (i64, i64, String, String)>(
            "SELECT id, user_id, mood, date FROM mood_logs \
             WHERE user_id = ? AND date >= ? ORDER BY date ASC",
        )
        .bind(user_id)
        .bind(calendar::format_timestamp(start))
        .fetch_all(&*self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_mood_log).collect()
    }

    /// All of a user's mood logs, newest first.
    pub async fn list_moods_newest_first(&self, user_id: i64) -> Result<Vec<MoodLog>> {
        let rows = sqlx::query_as::<_, (i64, i64, String, String)>(
            "SELECT id, user_id, mood, date FROM mood_logs \
             WHERE user_id = ? ORDER BY date DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&*self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_mood_log).collect()
    }

    /// Fetch the profile row for a user, creating it with the default
    /// avatar if it does not exist yet.
    pub async fn get_or_create_profile(&self, user_id: i64) -> Result<Profile> {
        sqlx::query("INSERT OR IGNORE INTO profiles (user_id, avatar, last_changed) VALUES (?, ?, NULL)")
            .bind(user_id)
            .bind(DEFAULT_AVATAR)
            .execute(&*self.pool)
            .await?;

        let (user_id, avatar, last_changed) = sqlx::query_as::<_, (i64, String, Option<String>)>(
            "SELECT user_id, avatar, last_changed FROM profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&*self.pool)
        .await?;

        let last_changed = match last_changed {
            Some(raw) => Some(
                calendar::parse_timestamp(&raw)
                    .with_context(|| format!("bad last_changed timestamp: {}", raw))?,
            ),
            None => None,
        };

        Ok(Profile {
            user_id,
            avatar,
            last_changed,
        })
    }

    /// Conditionally apply an avatar change.
    ///
    /// The eligibility check and the write happen in one UPDATE so that of
    /// two racing requests which both observed an eligible profile, only
    /// one can win the window. Returns whether the row was updated.
    pub async fn apply_avatar_change(
        &self,
        user_id: i64,
        avatar: &str,
        now: &DateTime<FixedOffset>,
        eligible_before: &DateTime<FixedOffset>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE profiles SET avatar = ?, last_changed = ? \
             WHERE user_id = ? AND (last_changed IS NULL OR last_changed <= ?)",
        )
        .bind(avatar)
        .bind(calendar::format_timestamp(now))
        .bind(user_id)
        .bind(calendar::format_timestamp(eligible_before))
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_mood_log(row: (i64, i64, String, String)) -> Result<MoodLog> {
        let (id, user_id, mood, date) = row;
        Ok(MoodLog {
            id,
            user_id,
            mood: Mood::parse(&mood).map_err(anyhow::Error::msg)?,
            date: calendar::parse_timestamp(&date)
                .with_context(|| format!("bad mood log timestamp: {}", date))?,
        })
    }
}
