mod dispatch;

pub use dispatch::{BackendDispatcher, BackendReply, BackendRequest, RequestSink, Ticket};

use crate::config::EditorConfig;
use crate::scene::serialization::{
    DownloadResponse, LoadSceneResponse, SaveSceneRequest, SaveSceneResponse,
};
use crate::scene::SearchResult;
use std::io::Read;

/// Upper bound for a single asset or thumbnail body.
const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("could not start a request worker: {0}")]
    Worker(#[source] std::io::Error),
    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Blocking JSON client for the scene backend. Cheap to clone; clones share
/// the connection pool.
#[derive(Clone)]
pub struct BackendClient {
    agent: ureq::Agent,
    config: EditorConfig,
}

impl BackendClient {
    pub fn new(config: &EditorConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.request_timeout)
            .build();
        Self {
            agent,
            config: config.clone(),
        }
    }

    pub fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let url = self.config.endpoint("/api/search");
        log::info!("Searching catalogue for '{}'", query);
        let response = self
            .agent
            .get(&url)
            .query("query", query)
            .call()
            .map_err(|err| request_error(&url, err))?;
        decode_json(&url, response)
    }

    pub fn download(&self, uid: &str) -> Result<DownloadResponse> {
        let url = self.download_url(uid)?;
        log::info!("Resolving asset {}", uid);
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|err| request_error(&url, err))?;
        decode_json(&url, response)
    }

    pub fn save_scene(&self, request: &SaveSceneRequest) -> Result<SaveSceneResponse> {
        let url = self.config.endpoint("/api/save-scene");
        log::info!("Saving {} objects", request.models.len());
        let response = self
            .agent
            .post(&url)
            .send_json(request)
            .map_err(|err| request_error(&url, err))?;
        decode_json(&url, response)
    }

    pub fn load_scene(&self) -> Result<LoadSceneResponse> {
        let url = self.config.endpoint("/api/load-scene");
        log::info!("Loading scene");
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|err| request_error(&url, err))?;
        decode_json(&url, response)
    }

    /// `/api/download/<uid>` with the uid percent-encoded as one path segment.
    fn download_url(&self, uid: &str) -> Result<String> {
        let base = self.config.endpoint("/api/download");
        let invalid = |reason: String| BackendError::InvalidUrl {
            url: base.clone(),
            reason,
        };
        let mut url = url::Url::parse(&base).map_err(|err| invalid(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(uid);
        Ok(url.to_string())
    }

    /// Raw body of an absolute URL (asset files, thumbnails).
    pub fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|err| request_error(url, err))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|source| BackendError::Decode {
                url: url.to_string(),
                source,
            })?;
        Ok(bytes)
    }
}

fn request_error(url: &str, err: ureq::Error) -> BackendError {
    match err {
        ureq::Error::Status(status, _) => BackendError::Status {
            url: url.to_string(),
            status,
        },
        ureq::Error::Transport(transport) => BackendError::Transport {
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(url: &str, response: ureq::Response) -> Result<T> {
    response.into_json().map_err(|source| BackendError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn unreachable_backend_is_a_transport_error() {
        let config = EditorConfig {
            // Port 9 (discard) on localhost is closed on CI machines.
            backend_url: "http://127.0.0.1:9".to_string(),
            request_timeout: Duration::from_secs(2),
            ..EditorConfig::default()
        };
        let client = BackendClient::new(&config);
        let err = client.search("sedan").unwrap_err();
        assert!(matches!(err, BackendError::Transport { .. }), "{err}");
        assert!(err.to_string().contains("/api/search"));
    }

    #[test]
    fn download_uid_is_a_single_encoded_path_segment() {
        let client = BackendClient::new(&EditorConfig::default());
        assert_eq!(
            client.download_url("abc123").unwrap(),
            "http://127.0.0.1:8001/api/download/abc123"
        );
        assert_eq!(
            client.download_url("a/b?c#d").unwrap(),
            "http://127.0.0.1:8001/api/download/a%2Fb%3Fc%23d"
        );
    }
}
