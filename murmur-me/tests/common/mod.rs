//! In-process stand-in for the VTube Studio API

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use murmur_me::AvatarConfig;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// Grants a token and accepts it
    Normal,
    /// Never answers the token request
    SilentOnToken,
    /// Answers the token request without a token
    MissingToken,
    /// Answers the authentication request negatively
    RejectAuth,
    /// Reports every injected parameter as unknown
    ParameterMissing,
    /// Stops reading (and so stops answering pings) once authenticated
    DeafAfterAuth,
    /// Closes the socket once authenticated
    CloseAfterAuth,
}

pub struct MockController {
    pub url: String,
    pub received: mpsc::UnboundedReceiver<Value>,
}

impl MockController {
    /// Collect the message types received so far
    pub async fn drain_types(&mut self) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(Some(message)) =
            tokio::time::timeout(std::time::Duration::from_millis(200), self.received.recv()).await
        {
            types.push(message["messageType"].as_str().unwrap_or_default().to_string());
        }
        types
    }
}

pub async fn spawn_controller(behaviour: Behaviour) -> MockController {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (tx, received) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };

                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(text) = message else {
                        continue;
                    };
                    let request: Value = serde_json::from_str(&text).unwrap();
                    let _ = tx.send(request.clone());

                    let reply = match request["messageType"].as_str().unwrap_or_default() {
                        "AuthenticationTokenRequest" => match behaviour {
                            Behaviour::SilentOnToken => None,
                            Behaviour::MissingToken => Some(envelope("AuthenticationTokenResponse", json!({}))),
                            _ => Some(envelope(
                                "AuthenticationTokenResponse",
                                json!({"authenticationToken": "test-token"}),
                            )),
                        },
                        "AuthenticationRequest" => {
                            if behaviour == Behaviour::RejectAuth {
                                Some(envelope(
                                    "AuthenticationResponse",
                                    json!({"authenticated": false, "reason": "Token invalid"}),
                                ))
                            } else {
                                let ok = request["data"]["authenticationToken"] == "test-token";
                                Some(envelope("AuthenticationResponse", json!({"authenticated": ok, "reason": ""})))
                            }
                        }
                        "InjectParameterDataRequest" => {
                            if behaviour == Behaviour::ParameterMissing {
                                Some(envelope(
                                    "APIError",
                                    json!({"errorID": 453, "message": "Parameter MouthOpen not found"}),
                                ))
                            } else {
                                Some(envelope("InjectParameterDataResponse", json!({})))
                            }
                        }
                        "ParameterCreationRequest" => Some(envelope(
                            "ParameterCreationResponse",
                            json!({"parameterName": request["data"]["parameterName"]}),
                        )),
                        _ => None,
                    };

                    if let Some(reply) = reply {
                        if ws.send(Message::Text(reply.to_string())).await.is_err() {
                            return;
                        }
                    }

                    let authenticated = request["messageType"] == "AuthenticationRequest";
                    if authenticated && behaviour == Behaviour::CloseAfterAuth {
                        let _ = ws.close(None).await;
                        return;
                    }
                    if authenticated && behaviour == Behaviour::DeafAfterAuth {
                        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                        return;
                    }
                }
            });
        }
    });

    MockController { url, received }
}

fn envelope(message_type: &str, data: Value) -> Value {
    json!({
        "apiName": "VTubeStudioPublicAPI",
        "apiVersion": "1.0",
        "timestamp": 0,
        "requestID": "mock",
        "messageType": message_type,
        "data": data,
    })
}

pub fn config_for(url: &str) -> AvatarConfig {
    AvatarConfig {
        enabled: true,
        url: url.to_string(),
        connect_timeout_ms: 2_000,
        response_timeout_ms: 300,
        ping_timeout_ms: 300,
        reconnect_cooldown_ms: 0,
        ..AvatarConfig::default()
    }
}
