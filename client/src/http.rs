//! Gateway to `club-server` over HTTP and one shared WebSocket.
//!
//! Snapshots, enrichment fetches and mutations are plain HTTP requests.
//! Realtime channels are multiplexed over a single WebSocket connection that
//! is opened on the first subscribe and reopened on the next subscribe after
//! it drops. Each channel has its own id; incoming frames are routed to the
//! channel's signal stream by that id.

use crate::config::ClientConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{
    ChannelHandle, ChannelSignal, Mutation, MutationReceipt, RemoteGateway, Subscription,
};
use async_trait::async_trait;
use club_engine::{ClientFrame, ScopeKey, ServerFrame, Table};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;

type Routes = Arc<DashMap<String, mpsc::UnboundedSender<ChannelSignal>>>;

/// Error body returned by the server.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

/// [`RemoteGateway`] backed by `club-server`.
pub struct HttpGateway {
    http: reqwest::Client,
    config: ClientConfig,
    base: Url,
    outgoing: Mutex<Option<mpsc::UnboundedSender<ClientFrame>>>,
    routes: Routes,
}

impl HttpGateway {
    pub fn new(config: ClientConfig) -> GatewayResult<Self> {
        let base = Url::parse(&config.api_url)
            .map_err(|e| GatewayError::Decode(format!("invalid API URL: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            config,
            base,
            outgoing: Mutex::new(None),
            routes: Arc::new(DashMap::new()),
        })
    }

    /// Number of channels currently routed.
    pub fn channel_count(&self) -> usize {
        self.routes.len()
    }

    fn url(&self, segments: &[&str]) -> GatewayResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Decode("API URL cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let request = self.http.request(method, url);
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn collection_url(&self, scope: &ScopeKey) -> GatewayResult<Url> {
        match scope {
            ScopeKey::Room { room_id } => self.url(&["rooms", room_id.as_str(), "messages"]),
            ScopeKey::Month { year, month } => {
                let mut url = self.url(&["events"])?;
                url.query_pairs_mut()
                    .append_pair("year", &year.to_string())
                    .append_pair("month", &month.to_string());
                Ok(url)
            }
            ScopeKey::Event { event_id } => self.url(&["events", event_id.as_str(), "registrations"]),
        }
    }

    /// The sender half of the realtime connection, connecting if needed.
    async fn link(&self) -> GatewayResult<mpsc::UnboundedSender<ClientFrame>> {
        let mut outgoing = self.outgoing.lock().await;
        if let Some(sender) = outgoing.as_ref().filter(|s| !s.is_closed()) {
            return Ok(sender.clone());
        }

        let sender = self.connect().await?;
        *outgoing = Some(sender.clone());
        Ok(sender)
    }

    async fn connect(&self) -> GatewayResult<mpsc::UnboundedSender<ClientFrame>> {
        let mut request = self.config.realtime_url.as_str().into_client_request()?;
        if let Some(token) = &self.config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| GatewayError::WebSocket(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (socket, _) = tokio_tungstenite::connect_async(request).await?;
        let (mut sink, mut stream) = socket.split();
        tracing::info!(url = %self.config.realtime_url, "Realtime connection established");

        let (tx, mut rx) = mpsc::unbounded_channel::<ClientFrame>();

        let writer = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("Failed to serialize client frame: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::warn!("Failed to send realtime frame: {}", e);
                    break;
                }
            }
        });
        let writer = writer.abort_handle();

        let routes = self.routes.clone();
        tokio::spawn(async move {
            while let Some(result) = stream.next().await {
                match result {
                    Ok(Message::Text(text)) => route_frame(&routes, text.as_str()),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Realtime connection error: {}", e);
                        break;
                    }
                }
            }

            writer.abort();
            let lost = routes.len();
            for entry in routes.iter() {
                let _ = entry
                    .value()
                    .send(ChannelSignal::TransportError("realtime connection lost".to_string()));
            }
            routes.clear();
            tracing::warn!(channels = lost, "Realtime connection closed");
        });

        Ok(tx)
    }
}

/// Deliver one server frame to the channel it names.
fn route_frame(routes: &Routes, text: &str) {
    let frame: ServerFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("Ignoring malformed server frame: {}", e);
            return;
        }
    };

    let (channel_id, signal) = match frame {
        ServerFrame::Subscribed { channel_id } => (channel_id, ChannelSignal::Acknowledged),
        ServerFrame::Change { channel_id, event } => (channel_id, ChannelSignal::Change(event)),
        ServerFrame::Unsubscribed { channel_id } => {
            // Server-initiated; a requested unsubscribe has already removed the route.
            if let Some((_, sender)) = routes.remove(&channel_id) {
                let _ = sender.send(ChannelSignal::Closed);
            }
            return;
        }
        ServerFrame::Error {
            message,
            channel_id: Some(channel_id),
        } => (channel_id, ChannelSignal::TransportError(message)),
        ServerFrame::Error {
            message,
            channel_id: None,
        } => {
            tracing::warn!(message = %message, "Realtime error");
            return;
        }
        ServerFrame::Pong => return,
    };

    match routes.get(&channel_id) {
        Some(sender) => {
            let _ = sender.send(signal);
        }
        None => tracing::trace!(channel_id = %channel_id, "Frame for unknown channel"),
    }
}

/// Turn a non-success response into [`GatewayError::Status`].
async fn check(response: reqwest::Response) -> GatewayResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(ErrorBody {
            error,
            details: Some(details),
        }) => format!("{error}: {details}"),
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    Err(GatewayError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn fetch_collection(&self, scope: &ScopeKey) -> GatewayResult<Vec<Value>> {
        let url = self.collection_url(scope)?;
        let response = check(self.request(Method::GET, url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn fetch_by_id(&self, table: Table, id: &str) -> GatewayResult<Option<Value>> {
        let url = self.url(&["records", table.as_str(), id])?;
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(response).await?.json().await?))
    }

    async fn mutate(&self, mutation: Mutation) -> GatewayResult<MutationReceipt> {
        let request = match &mutation {
            Mutation::SendMessage { room_id, content } => self
                .request(Method::POST, self.url(&["rooms", room_id.as_str(), "messages"])?)
                .json(&json!({ "content": content })),
            Mutation::Register { event_id } => self.request(
                Method::POST,
                self.url(&["events", event_id.as_str(), "registrations"])?,
            ),
            Mutation::CancelRegistration { event_id } => self.request(
                Method::DELETE,
                self.url(&["events", event_id.as_str(), "registrations"])?,
            ),
        };

        let response = check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn subscribe(&self, scope: &ScopeKey) -> GatewayResult<Subscription> {
        let outgoing = self.link().await?;
        let channel_id = uuid::Uuid::new_v4().to_string();
        let (sender, signals) = mpsc::unbounded_channel();
        self.routes.insert(channel_id.clone(), sender);

        let frame = ClientFrame::Subscribe {
            channel_id: channel_id.clone(),
            scope: scope.clone(),
        };
        if outgoing.send(frame).is_err() {
            self.routes.remove(&channel_id);
            return Err(GatewayError::Disconnected);
        }

        tracing::debug!(scope = %scope, channel_id = %channel_id, "Subscribe sent");
        Ok(Subscription {
            handle: ChannelHandle {
                id: channel_id,
                scope: scope.clone(),
            },
            signals,
        })
    }

    async fn unsubscribe(&self, handle: &ChannelHandle) -> GatewayResult<()> {
        if self.routes.remove(&handle.id).is_none() {
            return Ok(());
        }

        // A dropped connection has already closed every channel on it.
        if let Some(outgoing) = self.outgoing.lock().await.as_ref() {
            let _ = outgoing.send(ClientFrame::Unsubscribe {
                channel_id: handle.id.clone(),
            });
        }
        Ok(())
    }
}
