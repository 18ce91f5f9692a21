use crate::config::AppConfig;
use crate::email::content::EmailContentClient;
use crate::shared::utils::DbPool;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub content: EmailContentClient,
}

impl AppState {
    pub fn new(config: AppConfig, conn: DbPool) -> Self {
        let content = EmailContentClient::new(&config.provider);
        Self { conn, config, content }
    }
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            config: self.config.clone(),
            content: self.content.clone(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("conn", &"DbPool")
            .field("config", &self.config)
            .finish()
    }
}
