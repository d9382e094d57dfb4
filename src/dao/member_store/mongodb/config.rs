use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DB: &str = "neon_beat_trivia";
const DEFAULT_CONNECT_ATTEMPTS: u32 = 10;

/// Connection settings of the MongoDB member store.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed client options.
    pub options: ClientOptions,
    /// Database holding the member collection.
    pub database_name: String,
    /// Pings tried before giving up on a connection.
    pub connect_attempts: u32,
}

impl MongoConfig {
    /// Parse a connection string; the database defaults to `neon_beat_trivia`.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DB).to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
        })
    }

    /// Read `MONGO_URI` (required), `MONGO_DB` and `MONGO_CONNECT_ATTEMPTS` (optional).
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI")
            .map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let db = std::env::var("MONGO_DB").ok();
        let mut config = Self::from_uri(&uri, db.as_deref()).await?;
        if let Some(attempts) = std::env::var("MONGO_CONNECT_ATTEMPTS")
            .ok()
            .and_then(|raw| raw.parse::<u32>().ok())
            .filter(|attempts| *attempts > 0)
        {
            config.connect_attempts = attempts;
        }
        Ok(config)
    }
}
