use super::{BackendClient, BackendError, Result};
use crate::scene::serialization::{
    DownloadResponse, LoadSceneResponse, SaveSceneRequest, SaveSceneResponse,
};
use crate::scene::SearchResult;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

/// Correlates a reply with the request that produced it.
pub type Ticket = u64;

#[derive(Debug, Clone)]
pub enum BackendRequest {
    Search { query: String },
    Download { uid: String, name: String },
    Save(SaveSceneRequest),
    Load,
}

#[derive(Debug)]
pub enum BackendReply {
    Search(Result<Vec<SearchResult>>),
    Download {
        uid: String,
        name: String,
        result: Result<DownloadResponse>,
    },
    Save(Result<SaveSceneResponse>),
    Load(Result<LoadSceneResponse>),
}

/// Where the editor controller sends its backend requests.
pub trait RequestSink {
    fn submit(&mut self, ticket: Ticket, request: BackendRequest);

    /// Replies that completed since the last call.
    fn poll(&mut self) -> Vec<(Ticket, BackendReply)>;
}

/// Runs every request on its own worker thread and collects replies over a
/// channel. Requests are neither cancelled nor de-duplicated. Every submitted
/// ticket gets exactly one reply, even when no worker could be started.
pub struct BackendDispatcher {
    client: BackendClient,
    reply_tx: Sender<(Ticket, BackendReply)>,
    reply_rx: Receiver<(Ticket, BackendReply)>,
}

impl BackendDispatcher {
    pub fn new(client: BackendClient) -> Self {
        let (reply_tx, reply_rx) = mpsc::channel();
        Self {
            client,
            reply_tx,
            reply_rx,
        }
    }
}

impl RequestSink for BackendDispatcher {
    fn submit(&mut self, ticket: Ticket, request: BackendRequest) {
        let client = self.client.clone();
        let reply_tx = self.reply_tx.clone();
        let worker_request = request.clone();
        let spawned = thread::Builder::new()
            .name(format!("backend-{ticket}"))
            .spawn(move || {
                let reply = execute(&client, worker_request);
                // The receiver only goes away when the editor shuts down.
                let _ = reply_tx.send((ticket, reply));
            });
        if let Err(err) = spawned {
            log::error!("Failed to spawn backend worker: {}", err);
            let reply = failed_reply(request, BackendError::Worker(err));
            let _ = self.reply_tx.send((ticket, reply));
        }
    }

    fn poll(&mut self) -> Vec<(Ticket, BackendReply)> {
        self.reply_rx.try_iter().collect()
    }
}

/// Reply of the matching kind carrying `error`.
fn failed_reply(request: BackendRequest, error: BackendError) -> BackendReply {
    match request {
        BackendRequest::Search { .. } => BackendReply::Search(Err(error)),
        BackendRequest::Download { uid, name } => BackendReply::Download {
            uid,
            name,
            result: Err(error),
        },
        BackendRequest::Save(_) => BackendReply::Save(Err(error)),
        BackendRequest::Load => BackendReply::Load(Err(error)),
    }
}

fn execute(client: &BackendClient, request: BackendRequest) -> BackendReply {
    match request {
        BackendRequest::Search { query } => BackendReply::Search(client.search(&query)),
        BackendRequest::Download { uid, name } => {
            let result = client.download(&uid);
            BackendReply::Download { uid, name, result }
        }
        BackendRequest::Save(request) => BackendReply::Save(client.save_scene(&request)),
        BackendRequest::Load => BackendReply::Load(client.load_scene()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use std::time::{Duration, Instant};

    #[test]
    fn failed_requests_still_produce_a_reply() {
        let config = EditorConfig {
            backend_url: "http://127.0.0.1:9".to_string(),
            request_timeout: Duration::from_secs(2),
            ..EditorConfig::default()
        };
        let mut dispatcher = BackendDispatcher::new(BackendClient::new(&config));
        dispatcher.submit(7, BackendRequest::Load);

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut replies = Vec::new();
        while replies.is_empty() && Instant::now() < deadline {
            replies = dispatcher.poll();
            thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(replies.len(), 1);
        assert!(dispatcher.poll().is_empty());
        let (ticket, reply) = replies.pop().unwrap();
        assert_eq!(ticket, 7);
        assert!(matches!(
            reply,
            BackendReply::Load(Err(BackendError::Transport { .. }))
        ));
    }

    #[test]
    fn worker_failure_reply_matches_request_kind() {
        let spawn_error = || BackendError::Worker(std::io::Error::other("no threads left"));

        let reply = failed_reply(
            BackendRequest::Download {
                uid: "abc".to_string(),
                name: "Sedan".to_string(),
            },
            spawn_error(),
        );
        match reply {
            BackendReply::Download { uid, name, result } => {
                assert_eq!(uid, "abc");
                assert_eq!(name, "Sedan");
                assert!(matches!(result, Err(BackendError::Worker(_))));
            }
            other => panic!("expected download reply, got {other:?}"),
        }

        let reply = failed_reply(
            BackendRequest::Search {
                query: "sedan".to_string(),
            },
            spawn_error(),
        );
        assert!(matches!(reply, BackendReply::Search(Err(BackendError::Worker(_)))));
        assert!(matches!(
            failed_reply(BackendRequest::Load, spawn_error()),
            BackendReply::Load(Err(BackendError::Worker(_)))
        ));
    }
}
