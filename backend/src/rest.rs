use axum::{
    extract::{Multipart, State},
    http::{header::REFERER, HeaderMap},
    response::Redirect,
    Json,
};
use shared::{DailyMoodGroup, LogMoodRequest, MoodLogDto, StatusResponse};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::db::DbConnection;
use crate::domain::{
    calendar, AvatarChangeOutcome, AvatarService, AvatarUpload, MoodService,
};
use crate::error::AppError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbConnection,
    pub mood_service: MoodService,
    pub avatar_service: AvatarService,
}

impl AppState {
    pub fn new(db: DbConnection, avatar_dir: PathBuf) -> Self {
        let mood_service = MoodService::new(db.clone());
        let avatar_service = AvatarService::new(db.clone(), avatar_dir);
        Self {
            db,
            mood_service,
            avatar_service,
        }
    }
}

/// POST /api/log-mood/
pub async fn log_mood(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<LogMoodRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    info!("POST /api/log-mood/ - user: {}", user_id);

    state
        .mood_service
        .log_mood(user_id, request.mood.as_deref(), calendar::now())
        .await?;

    Ok(Json(StatusResponse::ok()))
}

/// GET /api/weekly/
pub async fn weekly_moods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<MoodLogDto>>, AppError> {
    info!("GET /api/weekly/ - user: {}", user_id);

    let logs = state
        .mood_service
        .weekly_moods(user_id, calendar::today())
        .await?;
    Ok(Json(logs.iter().map(|log| log.to_dto()).collect()))
}

/// GET /api/monthly/
pub async fn monthly_moods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<MoodLogDto>>, AppError> {
    info!("GET /api/monthly/ - user: {}", user_id);

    let logs = state
        .mood_service
        .monthly_moods(user_id, calendar::today())
        .await?;
    Ok(Json(logs.iter().map(|log| log.to_dto()).collect()))
}

/// GET /daily-moods/ — all of the caller's entries grouped into
/// consecutive same-day runs, newest day first.
pub async fn daily_moods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<DailyMoodGroup>>, AppError> {
    info!("GET /daily-moods/ - user: {}", user_id);

    let groups = state.mood_service.grouped_daily_moods(user_id).await?;
    let payload = groups
        .into_iter()
        .map(|group| DailyMoodGroup {
            date: group.date.to_string(),
            moods: group.moods.iter().map(|log| log.to_dto()).collect(),
        })
        .collect();
    Ok(Json(payload))
}

/// POST /change-avatar/ — multipart upload with an `avatar` field.
///
/// Ineligible or file-less requests redirect back without an error body,
/// matching the historical behavior.
pub async fn change_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    info!("POST /change-avatar/ - user: {}", user_id);

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(anyhow::Error::from)? {
        if field.name() == Some("avatar") {
            let file_name = field.file_name().unwrap_or("avatar").to_string();
            let bytes = field.bytes().await.map_err(anyhow::Error::from)?;
            upload = Some(AvatarUpload {
                file_name,
                bytes: bytes.to_vec(),
            });
        }
    }

    let outcome = state
        .avatar_service
        .change_avatar(user_id, upload, calendar::now())
        .await?;
    if outcome != AvatarChangeOutcome::Changed {
        warn!("Avatar change for user {} ignored: {:?}", user_id, outcome);
    }

    let back = headers
        .get(REFERER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("/");
    Ok(Redirect::to(back))
}
