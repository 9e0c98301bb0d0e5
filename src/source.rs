//! Where photos come from.

use std::future::Future;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::Configuration;
use crate::error::SourceError;
use crate::photo::Photo;

/// Fetches one random photo per call.
///
/// Implementations must be safe to call from the session task; the session
/// guarantees at most one call is outstanding at a time.
pub trait ImageSource: Send + Sync + 'static {
    fn fetch_one(&self) -> impl Future<Output = Result<Photo, SourceError>> + Send;
}

/// [`ImageSource`] backed by the Unsplash random-photo endpoint.
#[derive(Debug, Clone)]
pub struct UnsplashSource {
    client: Client,
    endpoint: String,
    query: String,
    access_key: Option<String>,
}

impl UnsplashSource {
    /// Builds a source from configuration. The access key is taken from
    /// `cfg` only; a missing key is reported per fetch, not here.
    pub fn new(cfg: &Configuration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(cfg.request_timeout).build()?;
        Ok(Self::with_client(client, cfg))
    }

    /// Reuses an existing client (shared connection pool).
    pub fn with_client(client: Client, cfg: &Configuration) -> Self {
        Self {
            client,
            endpoint: format!("{}/photos/random", cfg.api_url.trim_end_matches('/')),
            query: cfg.query.clone(),
            access_key: cfg.access_key().map(str::to_owned),
        }
    }
}

impl ImageSource for UnsplashSource {
    #[instrument(skip(self), fields(query = %self.query))]
    async fn fetch_one(&self) -> Result<Photo, SourceError> {
        let Some(key) = self.access_key.as_deref() else {
            warn!("no access key configured; refusing to call the api");
            return Err(SourceError::MissingAccessKey);
        };

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("query", self.query.as_str())])
            .header(AUTHORIZATION, format!("Client-ID {key}"))
            .send()
            .await
            .map_err(|err| SourceError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "image api returned an error status");
            return Err(status_error(status));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| SourceError::Unexpected(err.to_string()))?;

        let photo = Photo::from_json(&body).inspect_err(|err| {
            warn!(issues = err.issues.len(), "photo payload failed validation: {err}");
        })?;
        debug!(id = %photo.id, "fetched photo");
        Ok(photo)
    }
}

fn status_error(status: StatusCode) -> SourceError {
    SourceError::Status {
        status: status.as_u16(),
        reason: status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_owned(),
    }
}
