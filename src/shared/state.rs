use crate::config::AppConfig;
use crate::notify::Mailer;
use crate::shared::utils::DbPool;
use std::sync::Arc;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub mailer: Arc<dyn Mailer>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            config: self.config.clone(),
            mailer: Arc::clone(&self.mailer),
        }
    }
}
