use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

pub const MAX_POST_LENGTH: usize = 5000;
pub const MAX_COMMENT_LENGTH: usize = 2000;
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const POSTS_PER_PAGE: usize = 20;

pub const USERS_LIST_KEY: &str = "users_list";
pub const FEED_KEY: &str = "feed";

pub fn user_key(user_id: &str) -> String {
    format!("user:{}", user_id)
}

pub fn post_key(post_id: &str) -> String {
    format!("post:{}", post_id)
}

pub fn comment_key(comment_id: &str) -> String {
    format!("comment:{}", comment_id)
}

pub fn comments_key(post_id: &str) -> String {
    format!("comments:{}", post_id)
}

pub fn notification_key(notification_id: &str) -> String {
    format!("notification:{}", notification_id)
}

pub fn notifications_key(user_id: &str) -> String {
    format!("notifications:{}", user_id)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Label of the Spin key-value store opened by the component.
    pub kv_store: String,
    /// Serialize read-modify-write cycles on the same post or user pair.
    pub serialize_post_updates: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            kv_store: "default".to_string(),
            serialize_post_updates: true,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let defaults = Self::default();

        Self {
            host: try_load("RIPPLE_HOST", defaults.host),
            port: try_load("RIPPLE_PORT", defaults.port),
            kv_store: try_load("RIPPLE_KV_STORE", defaults.kv_store),
            serialize_post_updates: try_load(
                "RIPPLE_SERIALIZE_POST_UPDATES",
                defaults.serialize_post_updates,
            ),
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}
