use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub ai_base_url: String,
    pub ai_api_key: String,
    pub outbox_poll_secs: u64,
    pub post_lifetime_days: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "servhub.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            ai_base_url: env::var("AI_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8089".to_string()),
            ai_api_key: env::var("AI_API_KEY").unwrap_or_default(),
            outbox_poll_secs: env::var("OUTBOX_POLL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            post_lifetime_days: env::var("POST_LIFETIME_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}
