//! Per-connection task: framed I/O, handshake, request forwarding.
//!
//! Each client connection spawns a tokio task that:
//! 1. Wraps the socket in the length-prefixed frame codec.
//! 2. Requires `hello` as the first message and forwards it to the
//!    broker loop for validation.
//! 3. Forwards each request to the broker loop and writes back the
//!    reply, strictly in order.
//! 4. On exit, notifies the broker loop so owned objects are released.

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;

use crate::ipc::codec::{CodecError, DecodeResult, FrameCodec, decode_frame};
use crate::ipc::protocol::{Message, Status};

use super::state::ConnectionId;

/// Command sent from a connection task to the broker loop.
#[derive(Debug)]
pub struct BrokerCommand {
    pub request: Message,
    pub response_tx: oneshot::Sender<Message>,
    pub connection_id: ConnectionId,
}

/// Sent when a connection closes, for whatever reason.
#[derive(Debug)]
pub struct DisconnectNotice {
    pub connection_id: ConnectionId,
}

#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("unexpected EOF during handshake")]
    HandshakeEof,
    #[error("first message must be hello")]
    NotHello,
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] rmp_serde::decode::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("broker loop closed")]
    BrokerGone,
    #[error("response channel closed")]
    ResponseDropped,
}

/// Spawn a connection handler task.
///
/// The task runs until the client disconnects or breaks the protocol.
/// A [`DisconnectNotice`] is always sent on exit.
pub fn spawn_connection(
    stream: UnixStream,
    conn_id: ConnectionId,
    cmd_tx: mpsc::UnboundedSender<BrokerCommand>,
    disconnect_tx: mpsc::UnboundedSender<DisconnectNotice>,
) {
    tokio::spawn(async move {
        if let Err(e) = handle_connection(stream, conn_id, cmd_tx).await {
            tracing::debug!(?conn_id, error = %e, "connection closed");
        }
        let _ = disconnect_tx.send(DisconnectNotice {
            connection_id: conn_id,
        });
    });
}

async fn handle_connection(
    stream: UnixStream,
    conn_id: ConnectionId,
    cmd_tx: mpsc::UnboundedSender<BrokerCommand>,
) -> Result<(), ConnectionError> {
    let mut framed = Framed::new(stream, FrameCodec::new());

    // -- Handshake --
    let first_frame = framed.next().await.ok_or(ConnectionError::HandshakeEof)??;

    let hello = match decode_frame(&first_frame) {
        DecodeResult::Ok(msg @ Message::Hello { .. }) => msg,
        DecodeResult::Ok(_) | DecodeResult::UnknownType(_) => {
            return Err(ConnectionError::NotHello);
        }
        DecodeResult::Malformed(e) => return Err(ConnectionError::MalformedFrame(e)),
    };

    let ack = send_command(&cmd_tx, hello, conn_id).await?;
    let refused = matches!(
        ack,
        Message::HelloAck {
            status: Status::Error,
            ..
        }
    );
    framed.send(ack).await?;
    if refused {
        return Ok(());
    }

    // -- Requests --
    while let Some(frame) = framed.next().await {
        let raw = frame?;
        let response = match decode_frame(&raw) {
            DecodeResult::Ok(msg) => send_command(&cmd_tx, msg, conn_id).await?,
            DecodeResult::UnknownType(envelope) => {
                tracing::debug!(?conn_id, msg_type = %envelope.msg_type, "unknown message type");
                unknown_type(envelope.id)
            }
            DecodeResult::Malformed(e) => return Err(ConnectionError::MalformedFrame(e)),
        };
        framed.send(response).await?;
    }
    Ok(())
}

/// Send a command to the broker loop and wait for the response.
async fn send_command(
    cmd_tx: &mpsc::UnboundedSender<BrokerCommand>,
    request: Message,
    conn_id: ConnectionId,
) -> Result<Message, ConnectionError> {
    let (response_tx, response_rx) = oneshot::channel();
    cmd_tx
        .send(BrokerCommand {
            request,
            response_tx,
            connection_id: conn_id,
        })
        .map_err(|_| ConnectionError::BrokerGone)?;
    response_rx
        .await
        .map_err(|_| ConnectionError::ResponseDropped)
}

fn unknown_type(id: u32) -> Message {
    Message::Response {
        id,
        status: Status::Error,
        error: Some("unknown_type".into()),
        hresult: None,
        object: None,
        objects: None,
        format: None,
        formats: None,
        fetched: None,
        medium: None,
        enumerator: None,
    }
}
