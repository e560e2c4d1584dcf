//! Domain layer: pure date logic, mood aggregation, avatar policy.

pub mod avatar_service;
pub mod calendar;
pub mod models;
pub mod mood_service;

pub use avatar_service::{AvatarChangeOutcome, AvatarService, AvatarUpload};
pub use mood_service::{DayGroup, MoodService};
