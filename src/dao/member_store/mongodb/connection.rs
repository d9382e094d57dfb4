use std::time::Duration;

use mongodb::{Client, Database, bson::doc};
use tokio::time::sleep;
use tracing::{info, warn};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

const FIRST_RETRY: Duration = Duration::from_millis(250);
const MAX_RETRY: Duration = Duration::from_secs(5);

/// Doubling delays between ping attempts, capped at [`MAX_RETRY`].
struct Backoff {
    next: Duration,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = (current * 2).min(MAX_RETRY);
        Some(current)
    }
}

/// Open the member database and wait until it answers a ping, at most
/// `config.connect_attempts` times.
pub(super) async fn open_member_database(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut delays = Backoff { next: FIRST_RETRY };
    let mut attempts = 0;
    loop {
        attempts += 1;
        let err = match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => break,
            Err(err) => err,
        };
        if attempts >= config.connect_attempts {
            return Err(MongoDaoError::InitialPing {
                attempts,
                source: err,
            });
        }
        let delay = delays.next().unwrap_or(MAX_RETRY);
        warn!(
            database = %config.database_name,
            attempts,
            retry_in_ms = delay.as_millis() as u64,
            error = %err,
            "member database not answering"
        );
        sleep(delay).await;
    }

    info!(database = %config.database_name, attempts, "member database reachable");
    Ok((client, database))
}
