use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::models::Notification;
use crate::services::auth::CredentialChain;
use crate::services::notifications::{DbNotificationSink, NotificationSink};

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub credentials: CredentialChain,
    pub notifier: Box<dyn NotificationSink>,
    pub notifications_tx: broadcast::Sender<Notification>,
}

impl AppState {
    /// Wires the default collaborators around an open connection.
    pub fn new(conn: Connection, config: AppConfig) -> Self {
        let db = Arc::new(Mutex::new(conn));
        let (notifications_tx, _) = broadcast::channel(config.notification_channel_capacity);
        Self {
            credentials: CredentialChain::sessions(Arc::clone(&db)),
            notifier: Box::new(DbNotificationSink::new(
                Arc::clone(&db),
                notifications_tx.clone(),
            )),
            notifications_tx,
            db,
            config,
        }
    }
}
