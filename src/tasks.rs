use crate::error::AppError;
use crate::platform_types::{PlatformMessage, PlatformOutbound};
use crate::session::CallSession;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Task that is the funnel of all PlatformOutbound messages going to the platform.
pub async fn send_platform_ws_messages(
    mut outbound_stream: mpsc::Receiver<PlatformOutbound>,
    mut ws_sink: SplitSink<WebSocket, Message>,
) -> Result<(), AppError> {
    while let Some(outbound) = outbound_stream.recv().await {
        let json = serde_json::to_string(&outbound).map_err(|e| {
            error!(error=%e, "failed to serialize platform outbound");
            AppError("Platform message serialization error")
        })?;
        ws_sink.send(Message::Text(json)).await.map_err(|e| {
            error!(error=%e, "failed to send message to platform");
            AppError("Failed to send message to platform")
        })?;
    }

    Ok(())
}

/// Task that feeds the platform's events to the call session until the call is over.
pub async fn manage_session(
    mut platform_stream: SplitStream<WebSocket>,
    mut session: CallSession,
) -> Result<(), AppError> {
    let res = loop {
        match platform_stream.next().await {
            Some(Ok(Message::Text(json))) => match serde_json::from_str::<PlatformMessage>(&json) {
                Ok(message) => {
                    let disconnected = matches!(message, PlatformMessage::Disconnected { .. });
                    if let Err(e) = session.handle_platform_message(message).await {
                        break Err(e);
                    }
                    if disconnected {
                        break Ok(());
                    }
                }
                Err(e) => {
                    // unknown events are not worth dropping a live call over
                    warn!(msg=%json, error=%e, "failed to parse platform message");
                }
            },
            Some(Ok(Message::Close(frame))) => {
                debug!(frame=?frame, "platform closed the session socket");
                break Ok(());
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => (),
            Some(Ok(m)) => {
                warn!(message=?m, "unsupported message type from platform");
            }
            Some(Err(e)) => {
                error!(error=%e, "failed to receive message from platform");
                break Err(AppError("Failed to receive message from platform stream"));
            }
            None => {
                info!("end of platform stream");
                break Ok(());
            }
        }
    };

    session.on_disconnect(None);
    session.wait_for_tools().await;
    res
}
