use crate::consts::OUTBOUND_CHANNEL_CAPACITY;
use crate::error::{handle_error, AppError};
use crate::platform_types::{PlatformMessage, StartMeta};
use crate::session::CallSession;
use crate::tasks::{manage_session, send_platform_ws_messages};
use crate::types::AppState;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::{SplitStream, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info_span, trace, warn, Instrument};
use uuid::Uuid;

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/session", get(ws_handler))
        .route("/booking", post(booking_handler))
        .route("/", get(|| async { "OK" }))
        .with_state(app_state)
}

/// Capture the Start message from the beginning of a platform session stream.
async fn get_start_meta(
    platform_stream: &mut SplitStream<WebSocket>,
) -> Result<StartMeta, AppError> {
    loop {
        match platform_stream.next().await {
            Some(msg) => match msg {
                Ok(Message::Text(json)) => match serde_json::from_str(&json) {
                    Ok(message) => match message {
                        PlatformMessage::Start { start: start_meta } => {
                            break Ok(start_meta);
                        }
                        _ => {
                            break Err(AppError("The first event of a session must be a Start event."));
                        }
                    },
                    Err(e) => {
                        error!(error=%e, "failed to deserialize platform text message");
                        break Err(AppError("Error deserializing platform text message"));
                    }
                },
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    trace!("keepalive before start");
                }
                _ => {
                    break Err(AppError(
                        "Got unexpected websocket message type from platform!",
                    ));
                }
            },
            None => break Err(AppError("End of stream")),
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| socket_handler(socket, app_state))
}

async fn socket_handler(socket: WebSocket, app_state: Arc<AppState>) {
    let (platform_sink, mut platform_stream) = socket.split();
    let start_meta = match get_start_meta(&mut platform_stream).await {
        Ok(start_meta) => start_meta,
        Err(e) => {
            handle_error(e).await;
            return;
        }
    };
    debug!(meta = ?start_meta, "got start meta from platform stream");

    let (outbound_sink, outbound_stream) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        if let Err(e) = send_platform_ws_messages(outbound_stream, platform_sink).await {
            handle_error(e).await;
        }
    });

    let session_id = Uuid::new_v4();
    let span = info_span!(
        "session",
        room = %start_meta.room,
        job = ?start_meta.job_id,
        session_id = %session_id
    );
    async move {
        let session = match CallSession::start(session_id, start_meta, outbound_sink, app_state)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                handle_error(e).await;
                return;
            }
        };
        if let Err(e) = manage_session(platform_stream, session).await {
            handle_error(e).await;
        }
    }
    .instrument(span)
    .await;
}

/// Relay a booking form submission to the appointment webhook.
pub async fn booking_handler(
    State(app_state): State<Arc<AppState>>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let internal_error = || {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Internal Server Error"})),
        )
    };

    let body = match serde_json::from_slice::<Value>(&body) {
        Ok(body) => body,
        Err(e) => {
            warn!(error=%e, "booking request body is not JSON");
            return internal_error();
        }
    };

    let resp = match app_state
        .http_client
        .post(&app_state.config.appointment_webhook_url)
        .json(&body)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            error!(error=%e, "failed to relay booking to webhook");
            return internal_error();
        }
    };

    let status = resp.status();
    let text = match resp.text().await {
        Ok(text) => text,
        Err(e) => {
            error!(error=%e, "failed to read webhook response body");
            return internal_error();
        }
    };

    if !status.is_success() {
        warn!(status=%status, body=%text, "webhook rejected booking");
        let code = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        return (
            code,
            Json(json!({"error": format!("Webhook failed: {} {}", status.as_u16(), text)})),
        );
    }

    let body = serde_json::from_str::<Value>(&text).unwrap_or_else(|_| json!({"success": true}));
    (StatusCode::OK, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::consts::TRANSFER_PATH;
    use crate::test_support::{app_state, record, serve, Recorded};

    use futures_util::sink::SinkExt;
    use tokio::net::TcpStream;
    use tokio_tungstenite::{connect_async, tungstenite, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn connect(config: Config) -> Client {
        let addr = serve(router(app_state(config))).await;
        let (ws, _) = connect_async(format!("ws://{addr}/session")).await.unwrap();
        ws
    }

    async fn send(ws: &mut Client, event: Value) {
        ws.send(tungstenite::Message::Text(event.to_string()))
            .await
            .unwrap();
    }

    async fn next_event(ws: &mut Client) -> Value {
        loop {
            match ws.next().await.unwrap().unwrap() {
                tungstenite::Message::Text(text) => return serde_json::from_str(&text).unwrap(),
                _ => continue,
            }
        }
    }

    fn start_event() -> Value {
        json!({
            "event": "start",
            "start": {
                "room": "call-abc",
                "job_id": "job-1",
                "participants": [
                    {"identity": "agent-1", "kind": "agent"},
                    {"identity": "sip_+13055550100", "kind": "sip"}
                ]
            }
        })
    }

    #[tokio::test]
    async fn call_lifecycle_over_websocket() {
        let rec = Recorded::default();
        let call_control = Router::new()
            .route(TRANSFER_PATH, post(record))
            .with_state(rec.clone());
        let call_control_addr = serve(call_control).await;
        let mut config = Config::for_tests("http://127.0.0.1:9/hook");
        config.call_control_url = Some(format!("http://{call_control_addr}"));
        let mut ws = connect(config).await;

        send(&mut ws, start_event()).await;
        let configure = next_event(&mut ws).await;
        assert_eq!(configure["event"], "configure");
        assert_eq!(configure["options"]["noise_cancellation"], "bvc_telephony");
        let greeting = next_event(&mut ws).await;
        assert_eq!(greeting["event"], "generate_reply");

        send(
            &mut ws,
            json!({
                "event": "tool_call",
                "call_id": "call-7",
                "name": "transfer_to_human",
                "arguments": {"reason": "insurance question"}
            }),
        )
        .await;
        let result = next_event(&mut ws).await;
        assert_eq!(result["event"], "tool_result");
        assert_eq!(result["call_id"], "call-7");
        assert_eq!(rec.bodies()[0]["participant_identity"], "sip_+13055550100");

        send(
            &mut ws,
            json!({"event": "tool_call", "call_id": "call-8", "name": "end_call", "arguments": {"reason": "done"}}),
        )
        .await;
        let farewell = next_event(&mut ws).await;
        assert_eq!(farewell["event"], "generate_reply");
        let hangup = next_event(&mut ws).await;
        assert_eq!(hangup, json!({"event": "hangup", "reason": "done"}));
    }

    #[tokio::test]
    async fn session_must_open_with_start() {
        let mut ws = connect(Config::for_tests("http://127.0.0.1:9/hook")).await;

        send(
            &mut ws,
            json!({"event": "transcript", "text": "hello", "is_final": true}),
        )
        .await;
        match ws.next().await {
            Some(Ok(tungstenite::Message::Text(text))) => panic!("unexpected event {text}"),
            _ => (),
        }
    }

    async fn upstream_webhook(status: StatusCode, body: &'static str) -> String {
        let app = Router::new().route("/hook", post(move || async move { (status, body) }));
        let addr = serve(app).await;
        format!("http://{addr}/hook")
    }

    async fn post_booking(webhook_url: &str) -> (reqwest::StatusCode, Value) {
        let addr = serve(router(app_state(Config::for_tests(webhook_url)))).await;
        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/booking"))
            .json(&json!({"name": "Maria Lopez", "service": "Routine Checkup"}))
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn booking_relay_mirrors_webhook_failure() {
        let webhook = upstream_webhook(StatusCode::BAD_GATEWAY, "upstream down").await;
        let (status, body) = post_booking(&webhook).await;
        assert_eq!(status.as_u16(), 502);
        assert_eq!(body["error"], "Webhook failed: 502 upstream down");
    }

    #[tokio::test]
    async fn booking_relay_passes_through_success() {
        let webhook = upstream_webhook(StatusCode::OK, r#"{"id":"apt-1"}"#).await;
        assert_eq!(post_booking(&webhook).await.1, json!({"id": "apt-1"}));

        let webhook = upstream_webhook(StatusCode::OK, "Accepted").await;
        assert_eq!(post_booking(&webhook).await.1, json!({"success": true}));
    }

    #[tokio::test]
    async fn booking_relay_rejects_malformed_body() {
        let rec = Recorded::default();
        let webhook = Router::new().route("/hook", post(record)).with_state(rec.clone());
        let webhook_addr = serve(webhook).await;
        let config = Config::for_tests(&format!("http://{webhook_addr}/hook"));
        let addr = serve(router(app_state(config))).await;

        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/booking"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 500);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"error": "Internal Server Error"}));
        assert!(rec.bodies().is_empty());
    }

    #[tokio::test]
    async fn booking_relay_reports_unreachable_webhook() {
        let (status, body) = post_booking("http://127.0.0.1:9/hook").await;
        assert_eq!(status.as_u16(), 500);
        assert_eq!(body, json!({"error": "Internal Server Error"}));
    }
}
