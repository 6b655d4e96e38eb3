//! Long-poll client for Syncthing's `/rest/events` endpoint

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::discovery::Endpoint;
use crate::error::Result;
use crate::events::{self, EventType, RawEvent};

/// How much longer the HTTP request may take than the server-side poll
pub const REQUEST_MARGIN: Duration = Duration::from_secs(10);

/// Result of a single long-poll.
///
/// Network failures, bad statuses and unreadable bodies all collapse into
/// `TransientError`; the monitor treats them identically.
#[derive(Debug)]
pub enum FetchOutcome {
    Batch(Vec<RawEvent>),
    Empty,
    TransientError,
}

/// Anything the monitor can pull events from
pub trait EventSource {
    fn fetch(
        &self,
        since: u64,
        types: &[EventType],
        poll_timeout: Duration,
    ) -> impl Future<Output = FetchOutcome> + Send;
}

impl<T: EventSource> EventSource for Arc<T> {
    fn fetch(
        &self,
        since: u64,
        types: &[EventType],
        poll_timeout: Duration,
    ) -> impl Future<Output = FetchOutcome> + Send {
        (**self).fetch(since, types, poll_timeout)
    }
}

/// HTTP client for a single Syncthing instance
pub struct StreamClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl StreamClient {
    pub fn new(endpoint: &Endpoint) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("syncthing-notifier/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(REQUEST_MARGIN)
            .build()?;

        Ok(Self {
            client,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
        })
    }

    pub fn events_url(&self, since: u64, types: &[EventType], poll_timeout: Duration) -> String {
        format!(
            "{}/rest/events?since={}&events={}&timeout={}",
            self.base_url,
            since,
            EventType::filter(types),
            poll_timeout.as_secs()
        )
    }

    async fn request(
        &self,
        since: u64,
        types: &[EventType],
        poll_timeout: Duration,
    ) -> Result<reqwest::Response> {
        let url = self.events_url(since, types, poll_timeout);
        debug!("Polling {}", url);

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .timeout(poll_timeout + REQUEST_MARGIN)
            .send()
            .await?;

        Ok(response)
    }
}

impl EventSource for StreamClient {
    async fn fetch(&self, since: u64, types: &[EventType], poll_timeout: Duration) -> FetchOutcome {
        let response = match self.request(since, types, poll_timeout).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Event request failed: {}", e);
                return FetchOutcome::TransientError;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("Event request returned status {}", status);
            return FetchOutcome::TransientError;
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read event response: {}", e);
                return FetchOutcome::TransientError;
            }
        };

        match events::parse_batch(&body) {
            Ok((events, skipped)) if events.is_empty() && skipped > 0 => {
                warn!("Event response contained {} unreadable events and nothing usable", skipped);
                FetchOutcome::TransientError
            }
            Ok((events, _)) if events.is_empty() => FetchOutcome::Empty,
            Ok((events, skipped)) => {
                debug!("Received {} events ({} skipped)", events.len(), skipped);
                FetchOutcome::Batch(events)
            }
            Err(e) => {
                warn!("Malformed event response: {}", e);
                FetchOutcome::TransientError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const POLL: Duration = Duration::from_secs(60);

    fn client_for(uri: String) -> StreamClient {
        StreamClient::new(&Endpoint {
            base_url: uri,
            api_key: "secret-key".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_events_url() {
        let client = client_for("http://127.0.0.1:8384/".to_string());
        assert_eq!(
            client.events_url(42, &EventType::SUBSCRIBED, POLL),
            "http://127.0.0.1:8384/rest/events?since=42&events=FolderErrors,ItemFinished,StateChanged&timeout=60"
        );
    }

    #[tokio::test]
    async fn test_fetch_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/events"))
            .and(query_param("since", "7"))
            .and(query_param("events", "FolderErrors,ItemFinished,StateChanged"))
            .and(query_param("timeout", "60"))
            .and(header("X-API-Key", "secret-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 8, "globalID": 100, "type": "StateChanged", "time": "2024-01-01T00:00:00Z",
                 "data": {"folder": "docs", "from": "idle", "to": "scanning"}},
                {"id": 9, "globalID": 101, "type": "ItemFinished", "time": "2024-01-01T00:00:01Z",
                 "data": {"folder": "docs", "item": "a.txt", "error": null}}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(server.uri());
        match client.fetch(7, &EventType::SUBSCRIBED, POLL).await {
            FetchOutcome::Batch(events) => {
                assert_eq!(events.iter().map(|e| e.id).collect::<Vec<_>>(), vec![8, 9]);
                assert_eq!(events[1].event_type, EventType::ItemFinished);
            }
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_array_is_empty() {
        let server = MockServer::start().await;
        Mock::given(path("/rest/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let outcome = client_for(server.uri()).fetch(0, &EventType::SUBSCRIBED, POLL).await;
        assert!(matches!(outcome, FetchOutcome::Empty));
    }

    #[tokio::test]
    async fn test_error_status_is_transient() {
        let server = MockServer::start().await;
        Mock::given(path("/rest/events"))
            .respond_with(ResponseTemplate::new(403).set_body_string("CSRF Error"))
            .mount(&server)
            .await;

        let outcome = client_for(server.uri()).fetch(0, &EventType::SUBSCRIBED, POLL).await;
        assert!(matches!(outcome, FetchOutcome::TransientError));
    }

    #[tokio::test]
    async fn test_only_unreadable_events_is_transient() {
        let server = MockServer::start().await;
        Mock::given(path("/rest/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "5", "type": "ItemFinished", "data": {}},
                {"type": "StateChanged"}
            ])))
            .mount(&server)
            .await;

        let outcome = client_for(server.uri()).fetch(0, &EventType::SUBSCRIBED, POLL).await;
        assert!(matches!(outcome, FetchOutcome::TransientError));
    }

    #[tokio::test]
    async fn test_unreadable_event_with_numeric_id_advances() {
        let server = MockServer::start().await;
        Mock::given(path("/rest/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 12, "type": ["ItemFinished"], "data": {}}
            ])))
            .mount(&server)
            .await;

        match client_for(server.uri()).fetch(0, &EventType::SUBSCRIBED, POLL).await {
            FetchOutcome::Batch(events) => {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].id, 12);
                assert_eq!(events[0].event_type, EventType::Other);
            }
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_transient() {
        let server = MockServer::start().await;
        Mock::given(path("/rest/events"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let outcome = client_for(server.uri()).fetch(0, &EventType::SUBSCRIBED, POLL).await;
        assert!(matches!(outcome, FetchOutcome::TransientError));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        let uri = {
            let server = MockServer::start().await;
            server.uri()
        };

        let outcome = client_for(uri).fetch(0, &EventType::SUBSCRIBED, POLL).await;
        assert!(matches!(outcome, FetchOutcome::TransientError));
    }
}
