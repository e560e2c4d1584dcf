use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

/// Runtime configuration, read from the environment with logged defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub avatar_dir: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("MOODTRACKER_PORT", "3000"),
            database_url: try_load("DATABASE_URL", "sqlite:moodtracker.db"),
            avatar_dir: PathBuf::from(try_load::<String>("MOODTRACKER_AVATAR_DIR", "media/avatars")),
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
