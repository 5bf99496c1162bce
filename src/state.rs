use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::mail::Mailer;
use crate::sanitize::Sanitizer;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub sanitizer: Arc<Sanitizer>,
    pub mailer: Arc<dyn Mailer>,
}
