//! Avatar change policy: one change per 15-day window.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, FixedOffset};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::db::DbConnection;

/// Minimum interval between accepted avatar changes.
pub const COOLDOWN_DAYS: i64 = 15;

/// `true` iff the profile may change its avatar at `now`: either it never
/// changed, or the last change is at least [`COOLDOWN_DAYS`] old. The
/// boundary is inclusive.
pub fn can_change_avatar(
    last_changed: Option<DateTime<FixedOffset>>,
    now: DateTime<FixedOffset>,
) -> bool {
    match last_changed {
        None => true,
        Some(changed) => now >= changed + Duration::days(COOLDOWN_DAYS),
    }
}

/// Image file received with a change request.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Result of a change attempt. The HTTP layer currently treats everything
/// but `Changed` as a silent no-op; keeping the variants distinct means
/// surfacing them as errors later is a handler-level change only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarChangeOutcome {
    Changed,
    NotEligible,
    MissingFile,
}

#[derive(Clone)]
pub struct AvatarService {
    db: DbConnection,
    avatar_dir: PathBuf,
}

impl AvatarService {
    pub fn new(db: DbConnection, avatar_dir: PathBuf) -> Self {
        Self { db, avatar_dir }
    }

    /// Attempt an avatar change for `user_id`.
    ///
    /// The profile row is created on first use. The eligibility check and
    /// the write go through one conditional UPDATE, so two requests that
    /// both saw an eligible profile cannot both win the window.
    pub async fn change_avatar(
        &self,
        user_id: i64,
        upload: Option<AvatarUpload>,
        now: DateTime<FixedOffset>,
    ) -> Result<AvatarChangeOutcome> {
        let Some(upload) = upload else {
            warn!("Avatar change for user {} without a file", user_id);
            return Ok(AvatarChangeOutcome::MissingFile);
        };

        let profile = self.db.get_or_create_profile(user_id).await?;
        if !can_change_avatar(profile.last_changed, now) {
            warn!("Avatar change for user {} rejected by cooldown", user_id);
            return Ok(AvatarChangeOutcome::NotEligible);
        }

        // Stage the image under a temporary name; the final name only
        // appears once the change is committed, so a losing request can
        // neither orphan a referenced file nor clobber the winner's.
        let file_name = format!("{}_{}", user_id, sanitize_file_name(&upload.file_name));
        let staged = self.stage_image(&file_name, &upload.bytes).await?;
        let avatar_path = format!("/media/avatars/{}", file_name);

        let eligible_before = now - Duration::days(COOLDOWN_DAYS);
        let changed = self
            .db
            .apply_avatar_change(user_id, &avatar_path, &now, &eligible_before)
            .await?;

        if changed {
            tokio::fs::rename(&staged, self.avatar_dir.join(&file_name))
                .await
                .context("committing avatar image")?;
            info!("User {} changed avatar to {}", user_id, avatar_path);
            Ok(AvatarChangeOutcome::Changed)
        } else {
            // Lost the race to a concurrent change in the same window
            warn!("Avatar change for user {} lost to a concurrent update", user_id);
            let _ = tokio::fs::remove_file(&staged).await;
            Ok(AvatarChangeOutcome::NotEligible)
        }
    }

    /// Write the uploaded bytes to a uniquely named temp file next to
    /// their final location and return its path.
    async fn stage_image(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let staged = self
            .avatar_dir
            .join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

        tokio::fs::create_dir_all(&self.avatar_dir)
            .await
            .context("creating avatar directory")?;
        tokio::fs::write(&staged, bytes)
            .await
            .context("writing avatar image")?;

        Ok(staged)
    }
}

/// Keep uploaded names path-safe: alphanumerics, dots and dashes only.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "avatar".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calendar;

    fn upload(name: &str) -> Option<AvatarUpload> {
        upload_with_bytes(name, vec![0x89, 0x50, 0x4e, 0x47])
    }

    fn upload_with_bytes(name: &str, bytes: Vec<u8>) -> Option<AvatarUpload> {
        Some(AvatarUpload {
            file_name: name.to_string(),
            bytes,
        })
    }

    async fn setup() -> (AvatarService, i64) {
        let db = DbConnection::init_test()
            .await
            .expect("Failed to create test database");
        let user = db.create_user("testuser", "salt$hash").await.unwrap();
        let dir = std::env::temp_dir().join(format!("avatars_{}", uuid::Uuid::new_v4()));
        (AvatarService::new(db, dir), user)
    }

    #[test]
    fn test_can_change_avatar_when_never_changed() {
        assert!(can_change_avatar(None, calendar::now()));
    }

    #[test]
    fn test_can_change_avatar_cooldown_boundaries() {
        let changed = calendar::now();

        // The instant after a change
        assert!(!can_change_avatar(Some(changed), changed));
        assert!(!can_change_avatar(Some(changed), changed + Duration::seconds(1)));

        // One second short of the window
        let almost = changed + Duration::days(COOLDOWN_DAYS) - Duration::seconds(1);
        assert!(!can_change_avatar(Some(changed), almost));

        // Exactly at the boundary, and after it
        let boundary = changed + Duration::days(COOLDOWN_DAYS);
        assert!(can_change_avatar(Some(changed), boundary));
        assert!(can_change_avatar(Some(changed), boundary + Duration::days(400)));
    }

    #[tokio::test]
    async fn test_change_avatar_updates_profile() {
        let (service, user) = setup().await;
        let now = calendar::now();

        let outcome = service.change_avatar(user, upload("me.png"), now).await.unwrap();
        assert_eq!(outcome, AvatarChangeOutcome::Changed);

        let profile = service.db.get_or_create_profile(user).await.unwrap();
        assert_eq!(profile.avatar, format!("/media/avatars/{}_me.png", user));
        assert_eq!(profile.last_changed, Some(now));
    }

    #[tokio::test]
    async fn test_change_avatar_missing_file_is_a_no_op() {
        let (service, user) = setup().await;

        let outcome = service.change_avatar(user, None, calendar::now()).await.unwrap();
        assert_eq!(outcome, AvatarChangeOutcome::MissingFile);

        let profile = service.db.get_or_create_profile(user).await.unwrap();
        assert_eq!(profile.avatar, crate::db::DEFAULT_AVATAR);
        assert!(profile.last_changed.is_none());
    }

    #[tokio::test]
    async fn test_change_avatar_within_cooldown_rejected() {
        let (service, user) = setup().await;
        let first = calendar::now();

        service.change_avatar(user, upload("a.png"), first).await.unwrap();

        let next_day = first + Duration::days(1);
        let outcome = service.change_avatar(user, upload("b.png"), next_day).await.unwrap();
        assert_eq!(outcome, AvatarChangeOutcome::NotEligible);

        // The first avatar is untouched
        let profile = service.db.get_or_create_profile(user).await.unwrap();
        assert_eq!(profile.avatar, format!("/media/avatars/{}_a.png", user));
        assert_eq!(profile.last_changed, Some(first));
    }

    #[tokio::test]
    async fn test_change_avatar_eligible_again_after_cooldown() {
        let (service, user) = setup().await;
        let first = calendar::now();

        service.change_avatar(user, upload("a.png"), first).await.unwrap();

        let after_window = first + Duration::days(COOLDOWN_DAYS);
        let outcome = service
            .change_avatar(user, upload("b.png"), after_window)
            .await
            .unwrap();
        assert_eq!(outcome, AvatarChangeOutcome::Changed);

        let profile = service.db.get_or_create_profile(user).await.unwrap();
        assert_eq!(profile.last_changed, Some(after_window));
    }

    #[tokio::test]
    async fn test_two_requests_seeing_eligible_only_one_wins() {
        // Both requests observed an eligible profile at the same instant;
        // the conditional update admits exactly one into the window.
        let (service, user) = setup().await;
        let now = calendar::now();
        service.db.get_or_create_profile(user).await.unwrap();

        let first = service.db
            .apply_avatar_change(user, "/media/avatars/a.png", &now, &(now - Duration::days(COOLDOWN_DAYS)))
            .await
            .unwrap();
        let second = service.db
            .apply_avatar_change(user, "/media/avatars/b.png", &now, &(now - Duration::days(COOLDOWN_DAYS)))
            .await
            .unwrap();

        assert!(first);
        assert!(!second);

        let profile = service.db.get_or_create_profile(user).await.unwrap();
        assert_eq!(profile.avatar, "/media/avatars/a.png");
    }

    #[tokio::test]
    async fn test_rejected_change_leaves_no_file_behind() {
        let (service, user) = setup().await;
        let first = calendar::now();

        let winner_bytes = vec![1, 2, 3, 4];
        service
            .change_avatar(user, upload_with_bytes("me.png", winner_bytes.clone()), first)
            .await
            .unwrap();

        // Same filename, different bytes, still inside the cooldown
        let outcome = service
            .change_avatar(
                user,
                upload_with_bytes("me.png", vec![9, 9, 9]),
                first + Duration::days(1),
            )
            .await
            .unwrap();
        assert_eq!(outcome, AvatarChangeOutcome::NotEligible);

        // Only the winning file remains, with its original bytes
        let entries: Vec<_> = std::fs::read_dir(&service.avatar_dir)
            .unwrap()
            .map(|entry| entry.unwrap())
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].file_name().to_string_lossy(),
            format!("{}_me.png", user)
        );
        assert_eq!(std::fs::read(entries[0].path()).unwrap(), winner_bytes);
    }

    #[tokio::test]
    async fn test_concurrent_changes_commit_exactly_one_file() {
        let (service, user) = setup().await;
        let now = calendar::now();

        let (a, b) = tokio::join!(
            service.change_avatar(user, upload_with_bytes("a.png", vec![1]), now),
            service.change_avatar(user, upload_with_bytes("b.png", vec![2]), now),
        );
        let outcomes = [a.unwrap(), b.unwrap()];

        let wins = outcomes
            .iter()
            .filter(|outcome| **outcome == AvatarChangeOutcome::Changed)
            .count();
        assert_eq!(wins, 1);

        // Whichever request lost, no staged temp file survives and only
        // the winner's image is on disk
        let profile = service.db.get_or_create_profile(user).await.unwrap();
        let entries: Vec<_> = std::fs::read_dir(&service.avatar_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(profile.avatar.ends_with(&entries[0]));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("me.png"), "me.png");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name(""), "avatar");
    }
}
