use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, de::IgnoredAny};
use serde_json::json;
use thiserror::Error;

use super::{AudioError, AudioPlayer, AudioResult, LoadResult, PlayableTrack, PlaybackWindow, TrackInfo};

/// Failures while building a Lavalink client.
#[derive(Debug, Error)]
pub enum LavalinkConfigError {
    /// Required environment variable is missing.
    #[error("missing Lavalink environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// Building the HTTP client failed.
    #[error("failed to build Lavalink HTTP client")]
    ClientBuilder {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
}

/// Connection settings for a Lavalink v4 node.
#[derive(Debug, Clone)]
pub struct LavalinkConfig {
    /// Base URL of the node REST API, e.g. `http://localhost:2333`.
    pub base_url: String,
    /// Value of the `Authorization` header.
    pub password: String,
    /// Session created by the websocket client that owns the voice connections.
    pub session_id: String,
}

impl LavalinkConfig {
    /// Read `LAVALINK_URL`, `LAVALINK_PASSWORD` and `LAVALINK_SESSION_ID`.
    pub fn from_env() -> Result<Self, LavalinkConfigError> {
        let var = |var: &'static str| {
            std::env::var(var).map_err(|_| LavalinkConfigError::MissingEnvVar { var })
        };

        Ok(Self {
            base_url: var("LAVALINK_URL")?,
            password: var("LAVALINK_PASSWORD")?,
            session_id: var("LAVALINK_SESSION_ID")?,
        })
    }
}

/// [`AudioPlayer`] backed by the Lavalink REST API.
#[derive(Clone)]
pub struct LavalinkPlayer {
    client: Client,
    base_url: Arc<str>,
    password: Arc<str>,
    session_id: Arc<str>,
}

impl LavalinkPlayer {
    /// Build a player for the configured node.
    pub fn new(config: LavalinkConfig) -> Result<Self, LavalinkConfigError> {
        let client = Client::builder()
            .build()
            .map_err(|source| LavalinkConfigError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            password: Arc::from(config.password),
            session_id: Arc::from(config.session_id),
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/v4/{}", self.base_url, path);
        self.client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, self.password.as_ref())
    }

    fn player_path(&self, room: &str) -> String {
        format!("sessions/{}/players/{}", self.session_id, room)
    }

    async fn send(
        builder: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> AudioResult<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|source| AudioError::Request { operation, source })?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Err(AudioError::Rejected(format!(
                "`{operation}` answered {}",
                response.status()
            ))),
            status => Err(AudioError::Status { operation, status }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LavalinkTrack {
    encoded: String,
    info: LavalinkTrackInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LavalinkTrackInfo {
    title: String,
    author: String,
    length: u64,
    uri: Option<String>,
    artwork_url: Option<String>,
}

impl From<LavalinkTrackInfo> for TrackInfo {
    fn from(info: LavalinkTrackInfo) -> Self {
        Self {
            artists: vec![info.author.clone()],
            title: info.title,
            author: info.author,
            length_ms: info.length,
            uri: info.uri,
            color: None,
            image: info.artwork_url,
        }
    }
}

impl From<LavalinkTrack> for PlayableTrack {
    fn from(track: LavalinkTrack) -> Self {
        Self {
            encoded: track.encoded,
            info: track.info.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "camelCase")]
enum LoadTracksResponse {
    Track(LavalinkTrack),
    Playlist { tracks: Vec<LavalinkTrack> },
    Search(Vec<LavalinkTrack>),
    Empty(IgnoredAny),
    Error { message: Option<String> },
}

impl From<LoadTracksResponse> for LoadResult {
    fn from(response: LoadTracksResponse) -> Self {
        match response {
            LoadTracksResponse::Track(track) => LoadResult::Search(vec![track.into()]),
            LoadTracksResponse::Playlist { tracks } | LoadTracksResponse::Search(tracks)
                if !tracks.is_empty() =>
            {
                LoadResult::Search(tracks.into_iter().map(Into::into).collect())
            }
            LoadTracksResponse::Playlist { .. }
            | LoadTracksResponse::Search(_)
            | LoadTracksResponse::Empty(_) => LoadResult::Empty,
            LoadTracksResponse::Error { message } => {
                LoadResult::Failed(message.unwrap_or_else(|| "unknown load error".into()))
            }
        }
    }
}

impl AudioPlayer for LavalinkPlayer {
    fn play(
        &self,
        room: &str,
        track: &PlayableTrack,
        window: PlaybackWindow,
    ) -> BoxFuture<'static, AudioResult<()>> {
        let builder = self
            .request(Method::PATCH, &self.player_path(room))
            .query(&[("noReplace", "false")])
            .json(&json!({
                "track": { "encoded": track.encoded },
                "position": window.start_ms,
                "endTime": window.end_ms,
                "paused": false,
            }));
        Box::pin(async move {
            Self::send(builder, "play").await?;
            Ok(())
        })
    }

    fn stop(&self, room: &str) -> BoxFuture<'static, AudioResult<()>> {
        let builder = self
            .request(Method::PATCH, &self.player_path(room))
            .json(&json!({ "track": { "encoded": null } }));
        Box::pin(async move {
            Self::send(builder, "stop").await?;
            Ok(())
        })
    }

    fn leave(&self, room: &str) -> BoxFuture<'static, AudioResult<()>> {
        let builder = self.request(Method::DELETE, &self.player_path(room));
        Box::pin(async move {
            match Self::send(builder, "leave").await {
                // Already gone.
                Ok(_) | Err(AudioError::Rejected(_)) => Ok(()),
                Err(err) => Err(err),
            }
        })
    }

    fn decode(&self, encoded: &str) -> BoxFuture<'static, AudioResult<TrackInfo>> {
        let builder = self
            .request(Method::GET, "decodetrack")
            .query(&[("encodedTrack", encoded)]);
        Box::pin(async move {
            let response = Self::send(builder, "decode").await?;
            let track: LavalinkTrack = response
                .json()
                .await
                .map_err(|source| AudioError::Decode {
                    operation: "decode",
                    source,
                })?;
            Ok(track.info.into())
        })
    }

    fn load(&self, query: &str) -> BoxFuture<'static, AudioResult<LoadResult>> {
        let builder = self
            .request(Method::GET, "loadtracks")
            .query(&[("identifier", query)]);
        Box::pin(async move {
            let response = Self::send(builder, "load").await?;
            let body: LoadTracksResponse =
                response
                    .json()
                    .await
                    .map_err(|source| AudioError::Decode {
                        operation: "load",
                        source,
                    })?;
            Ok(body.into())
        })
    }
}
