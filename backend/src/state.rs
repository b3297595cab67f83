use std::sync::Arc;

use crate::{config::Config, db::connection::DbPool, services::sms::SmsSender};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Config,
    pub sms_sender: Arc<dyn SmsSender>,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config, sms_sender: Arc<dyn SmsSender>) -> Self {
        Self {
            pool,
            config,
            sms_sender,
        }
    }
}
