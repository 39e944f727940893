use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::{info, warn};

use super::error::{MongoDaoError, MongoResult};
use crate::config::StorageSettings;

/// Database used when the settings leave `mongo_db` unset.
pub const DEFAULT_DATABASE: &str = "spotlight";
const APP_NAME: &str = "spotlight-back";
const PING_ATTEMPTS: u32 = 10;
const FIRST_RETRY_DELAY: Duration = Duration::from_millis(250);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Parsed connection settings for the MongoDB room store.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    /// Parse the configured URI. A positive store timeout also bounds server selection.
    pub async fn from_settings(settings: &StorageSettings) -> MongoResult<Self> {
        let mut options = ClientOptions::parse(&settings.mongo_uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: settings.mongo_uri.clone(),
                source,
            })?;
        options.app_name.get_or_insert_with(|| APP_NAME.to_owned());
        if settings.timeout_ms > 0 {
            options.server_selection_timeout = Some(Duration::from_millis(settings.timeout_ms));
        }

        Ok(Self {
            options,
            database_name: settings
                .mongo_db
                .clone()
                .unwrap_or_else(|| DEFAULT_DATABASE.to_owned()),
        })
    }

    /// Open a client and wait until the deployment answers a ping.
    pub async fn connect(&self) -> MongoResult<(Client, Database)> {
        let client = Client::with_options(self.options.clone())
            .map_err(|source| MongoDaoError::ClientConstruction { source })?;
        let database = client.database(&self.database_name);

        let mut delay = FIRST_RETRY_DELAY;
        let mut attempt = 1;
        loop {
            match database.run_command(doc! { "ping": 1 }).await {
                Ok(_) => {
                    if attempt > 1 {
                        info!(attempt, database = %self.database_name, "MongoDB answered after retry");
                    }
                    return Ok((client, database));
                }
                Err(source) if attempt == PING_ATTEMPTS => {
                    return Err(MongoDaoError::InitialPing {
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    warn!(
                        attempt,
                        wait_ms = delay.as_millis(),
                        error = %err,
                        "MongoDB ping failed while connecting; retrying"
                    );
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                    attempt += 1;
                }
            }
        }
    }
}
