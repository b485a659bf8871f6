//! Authenticated WebSocket session with the avatar controller

use crate::config::AvatarConfig;
use crate::error::AvatarError;
use crate::protocol::{Request, Response};
use futures_util::{FutureExt, SinkExt, StreamExt};
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
const PING_PAYLOAD: &[u8] = b"murmur";

/// Handshake progress while authenticating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// Token request sent, waiting for the token
    TokenRequested,
    /// Token presented, waiting for the verdict
    TokenConfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Authenticating(AuthPhase),
    Ready,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => f.write_str("disconnected"),
            LinkState::Connecting => f.write_str("connecting"),
            LinkState::Authenticating(AuthPhase::TokenRequested) => f.write_str("authenticating (token requested)"),
            LinkState::Authenticating(AuthPhase::TokenConfirmed) => f.write_str("authenticating (token confirmed)"),
            LinkState::Ready => f.write_str("ready"),
        }
    }
}

/// Client driving one mouth parameter of a VTube Studio model.
///
/// Failures never surface to callers of [`AvatarLinkClient::push`]: a broken
/// link degrades to `Disconnected` and further pushes are dropped until the
/// owner reconnects.
pub struct AvatarLinkClient {
    config: AvatarConfig,
    state: LinkState,
    ws: Option<WsStream>,
    token: Option<String>,
    smoothed: f32,
    creation_requested: bool,
}

impl AvatarLinkClient {
    pub fn new(config: AvatarConfig) -> Result<Self, AvatarError> {
        config.validate().map_err(AvatarError::Config)?;
        Ok(Self {
            config,
            state: LinkState::Disconnected,
            ws: None,
            token: None,
            smoothed: 0.0,
            creation_requested: false,
        })
    }

    pub fn config(&self) -> &AvatarConfig {
        &self.config
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LinkState::Ready
    }

    /// Current smoothed mouth level
    pub fn level(&self) -> f32 {
        self.smoothed
    }

    /// Token granted by the controller for the current session
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Open the socket and authenticate.
    ///
    /// Always ends in `Ready` or `Disconnected`; the error only explains why
    /// the link is unusable.
    pub async fn connect(&mut self) -> Result<(), AvatarError> {
        if self.ws.is_some() {
            self.close().await;
        }

        self.state = LinkState::Connecting;
        self.smoothed = 0.0;
        self.creation_requested = false;
        self.token = None;

        match self.handshake().await {
            Ok((ws, token)) => {
                self.ws = Some(ws);
                self.token = Some(token);
                self.state = LinkState::Ready;
                info!("VTube Studio link ready at {}", self.config.url);
                Ok(())
            }
            Err(e) => {
                self.state = LinkState::Disconnected;
                warn!("VTube Studio handshake failed: {}", e);
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<(WsStream, String), AvatarError> {
        let (mut ws, _) = tokio::time::timeout(self.config.connect_timeout(), connect_async(self.config.url.as_str()))
            .await
            .map_err(|_| AvatarError::Timeout("WebSocket connection".to_string()))?
            .map_err(|e| AvatarError::Connect(e.to_string()))?;
        debug!("VTube Studio WebSocket connected to {}", self.config.url);

        let response_timeout = self.config.response_timeout();

        self.state = LinkState::Authenticating(AuthPhase::TokenRequested);
        let request = Request::authentication_token(&self.config.plugin_name, &self.config.plugin_developer);
        send(&mut ws, &request).await?;
        let response = recv_response(&mut ws, response_timeout, "authentication token").await?;
        if response.is_error() {
            return Err(AvatarError::AuthenticationRejected(response.describe_error()));
        }
        let token = response
            .authentication_token()
            .ok_or(AvatarError::MissingToken)?
            .to_string();

        self.state = LinkState::Authenticating(AuthPhase::TokenConfirmed);
        let request = Request::authentication(&self.config.plugin_name, &self.config.plugin_developer, &token);
        send(&mut ws, &request).await?;
        let response = recv_response(&mut ws, response_timeout, "authentication result").await?;
        if response.is_error() {
            return Err(AvatarError::AuthenticationRejected(response.describe_error()));
        }
        if !response.authenticated() {
            let reason = response.reason().unwrap_or("no reason given").to_string();
            return Err(AvatarError::AuthenticationRejected(reason));
        }

        Ok((ws, token))
    }

    /// Feed one loudness sample. Does nothing unless the link is ready.
    pub async fn push(&mut self, level: f32) {
        if self.state != LinkState::Ready {
            return;
        }

        let level = if level.is_finite() { level } else { 0.0 };
        self.smoothed += self.config.smoothing * (level - self.smoothed);
        self.smoothed = self.smoothed.clamp(0.0, 1.0);

        let request = Request::inject_parameter(&self.config.parameter, self.smoothed);
        let result = match self.ws.as_mut() {
            Some(ws) => send(ws, &request).await,
            None => Err(AvatarError::Closed),
        };
        if let Err(e) = result {
            self.drop_connection(&e);
            return;
        }

        self.drain_responses().await;
    }

    /// Handle responses that have already arrived without waiting for more
    async fn drain_responses(&mut self) {
        loop {
            let Some(ws) = self.ws.as_mut() else {
                return;
            };
            let next = match ws.next().now_or_never() {
                Some(next) => next,
                None => return,
            };

            match next {
                Some(Ok(Message::Text(text))) => self.handle_response(&text).await,
                Some(Ok(Message::Close(_))) | None => {
                    self.drop_connection(&AvatarError::Closed);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.drop_connection(&AvatarError::Protocol(e.to_string()));
                    return;
                }
            }
        }
    }

    async fn handle_response(&mut self, text: &str) {
        let response = match Response::parse(text) {
            Ok(response) => response,
            Err(e) => {
                debug!("Ignoring unparseable VTube Studio message: {}", e);
                return;
            }
        };

        if response.is_parameter_not_found() {
            if self.creation_requested {
                return;
            }
            self.creation_requested = true;

            let request = Request::create_parameter(&self.config.parameter, "Mouth level driven by murmur speech");
            let result = match self.ws.as_mut() {
                Some(ws) => send(ws, &request).await,
                None => return,
            };
            match result {
                Ok(()) => info!(
                    "Created parameter '{}' in VTube Studio; bind it to the model's mouth in the VTube Studio settings",
                    self.config.parameter
                ),
                Err(e) => self.drop_connection(&e),
            }
        } else if response.is_error() {
            debug!("VTube Studio error: {}", response.describe_error());
        }
    }

    /// Ping the controller. A missing pong marks the link disconnected.
    pub async fn check_connection(&mut self) -> bool {
        if self.state != LinkState::Ready {
            return false;
        }
        let Some(ws) = self.ws.as_mut() else {
            self.state = LinkState::Disconnected;
            return false;
        };

        if let Err(e) = ws.send(Message::Ping(PING_PAYLOAD.to_vec())).await {
            self.drop_connection(&AvatarError::Protocol(e.to_string()));
            return false;
        }

        let mut pending = Vec::new();
        let outcome = tokio::time::timeout(self.config.ping_timeout(), async {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Pong(_))) => return Ok(()),
                    Some(Ok(Message::Text(text))) => pending.push(text),
                    Some(Ok(Message::Close(_))) | None => return Err(AvatarError::Closed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(AvatarError::Protocol(e.to_string())),
                }
            }
        })
        .await
        .unwrap_or_else(|_| Err(AvatarError::Timeout("pong".to_string())));

        for text in pending {
            self.handle_response(&text).await;
        }

        match outcome {
            Ok(()) if self.state == LinkState::Ready => {
                debug!("VTube Studio ping OK");
                true
            }
            Ok(()) => false,
            Err(e) => {
                self.drop_connection(&e);
                false
            }
        }
    }

    /// Close the current session and authenticate again
    pub async fn reconnect(&mut self) -> Result<(), AvatarError> {
        self.close().await;
        self.connect().await
    }

    /// Release the connection. Safe to call in any state, any number of times.
    pub async fn close(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, ws.close(None)).await {
                Ok(Ok(())) => debug!("VTube Studio WebSocket closed"),
                Ok(Err(e)) => debug!("VTube Studio WebSocket close error: {}", e),
                Err(_) => warn!("VTube Studio WebSocket close timed out"),
            }
        }
        self.state = LinkState::Disconnected;
    }

    /// Forget a dead socket without trying to close it again
    fn drop_connection(&mut self, cause: &AvatarError) {
        if self.ws.take().is_some() {
            warn!("VTube Studio connection lost: {}", cause);
        }
        self.state = LinkState::Disconnected;
    }
}

impl fmt::Debug for AvatarLinkClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvatarLinkClient")
            .field("url", &self.config.url)
            .field("state", &self.state)
            .field("level", &self.smoothed)
            .finish()
    }
}

async fn send(ws: &mut WsStream, request: &Request) -> Result<(), AvatarError> {
    let message = request.to_message()?;
    ws.send(message).await.map_err(|e| AvatarError::Protocol(e.to_string()))
}

/// Wait for the next JSON response, skipping control frames
async fn recv_response(ws: &mut WsStream, timeout: Duration, waiting_for: &str) -> Result<Response, AvatarError> {
    let next = async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return Response::parse(&text),
                Some(Ok(Message::Close(_))) | None => return Err(AvatarError::Closed),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(AvatarError::Protocol(e.to_string())),
            }
        }
    };

    tokio::time::timeout(timeout, next)
        .await
        .map_err(|_| AvatarError::Timeout(waiting_for.to_string()))?
}
