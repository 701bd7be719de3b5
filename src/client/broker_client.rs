//! Connection to the host for one-shot CLI commands and `source`.
//!
//! Each method sends one request and waits for its reply. Requests
//! are strictly sequential, so no split sink/stream is needed.

use std::path::Path;

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

use crate::data_object::DataDir;
use crate::format::{ClipFormat, FormatEtc};
use crate::hresult::HResult;
use crate::ipc::codec::LengthPrefixedCodec;
use crate::ipc::protocol::{Message, ObjectDescriptor, PROTOCOL_VERSION, Role, Status};
use crate::medium::Medium;

use super::ClientError;

/// Descriptors per `enum_next` when walking an enumerator.
const ENUM_BATCH: u32 = 16;

pub struct BrokerClient {
    framed: Framed<UnixStream, LengthPrefixedCodec>,
    next_id: u32,
}

impl BrokerClient {
    /// Connect to the host at `socket_path` and perform the handshake.
    pub async fn connect(socket_path: &Path, role: Role) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            ClientError::Broker(format!("connect to {} failed: {e}", socket_path.display()))
        })?;
        let mut framed = Framed::new(stream, LengthPrefixedCodec::new());

        framed
            .send(Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
                role,
            })
            .await
            .map_err(|e| ClientError::Broker(format!("send hello: {e}")))?;

        match framed.next().await {
            Some(Ok(Message::HelloAck {
                status: Status::Ok, ..
            })) => {}
            Some(Ok(Message::HelloAck {
                status: Status::Error,
                error,
                ..
            })) => {
                return Err(ClientError::Broker(format!(
                    "handshake rejected: {}",
                    error.unwrap_or_default()
                )));
            }
            other => {
                return Err(ClientError::Broker(format!(
                    "unexpected handshake response: {other:?}"
                )));
            }
        }

        Ok(Self {
            framed,
            next_id: 1, // 0 = Hello
        })
    }

    pub async fn register_format(&mut self, name: &str) -> Result<ClipFormat, ClientError> {
        let reply = self
            .call("register_format", |id| Message::RegisterFormat {
                id,
                name: name.into(),
            })
            .await?;
        match reply {
            Message::Response {
                format: Some(format),
                ..
            } => Ok(format),
            other => Err(unexpected("register_format", &other)),
        }
    }

    pub async fn create_object(&mut self, name: Option<String>) -> Result<String, ClientError> {
        match self
            .call("create_object", |id| Message::CreateObject { id, name })
            .await?
        {
            Message::Response {
                object: Some(object),
                ..
            } => Ok(object),
            other => Err(unexpected("create_object", &other)),
        }
    }

    pub async fn release_object(&mut self, object: &str) -> Result<(), ClientError> {
        self.call("release_object", |id| Message::ReleaseObject {
            id,
            object: object.into(),
        })
        .await?;
        Ok(())
    }

    pub async fn list_objects(&mut self) -> Result<Vec<ObjectDescriptor>, ClientError> {
        match self.call("list_objects", |id| Message::ListObjects { id }).await? {
            Message::Response { objects, .. } => Ok(objects.unwrap_or_default()),
            other => Err(unexpected("list_objects", &other)),
        }
    }

    /// Hand `medium` to the host, which keeps it as-is.
    pub async fn set_data(
        &mut self,
        object: &str,
        format: FormatEtc,
        medium: Medium,
    ) -> Result<(), ClientError> {
        self.call("set_data", |id| Message::SetData {
            id,
            object: object.into(),
            format,
            medium,
            release: true,
        })
        .await?;
        Ok(())
    }

    pub async fn get_data(&mut self, object: &str, format: FormatEtc) -> Result<Medium, ClientError> {
        match self
            .call("get_data", |id| Message::GetData {
                id,
                object: object.into(),
                format,
            })
            .await?
        {
            Message::Response { medium, .. } => Ok(medium.unwrap_or_default()),
            other => Err(unexpected("get_data", &other)),
        }
    }

    pub async fn query_get_data(
        &mut self,
        object: &str,
        format: FormatEtc,
    ) -> Result<HResult, ClientError> {
        match self
            .call("query_get_data", |id| Message::QueryGetData {
                id,
                object: object.into(),
                format,
            })
            .await?
        {
            Message::Response {
                hresult: Some(hresult),
                ..
            } => Ok(hresult),
            other => Err(unexpected("query_get_data", &other)),
        }
    }

    /// Every format the object offers, in its enumeration order.
    ///
    /// Opens an enumerator, drains it in batches and releases it.
    pub async fn formats(&mut self, object: &str) -> Result<Vec<FormatEtc>, ClientError> {
        let handle = match self
            .call("enum_formats", |id| Message::EnumFormats {
                id,
                object: object.into(),
                direction: DataDir::Get,
            })
            .await?
        {
            Message::Response {
                enumerator: Some(handle),
                ..
            } => handle,
            other => return Err(unexpected("enum_formats", &other)),
        };

        let mut all = Vec::new();
        loop {
            let reply = self
                .call("enum_next", |id| Message::EnumNext {
                    id,
                    enumerator: handle,
                    count: ENUM_BATCH,
                    capacity: ENUM_BATCH,
                    want_fetched: true,
                })
                .await?;
            match reply {
                Message::Response {
                    hresult, formats, ..
                } => {
                    all.extend(formats.unwrap_or_default());
                    if hresult != Some(HResult::S_OK) {
                        break;
                    }
                }
                other => return Err(unexpected("enum_next", &other)),
            }
        }

        self.call("enum_release", |id| Message::EnumRelease {
            id,
            enumerator: handle,
        })
        .await?;
        Ok(all)
    }

    /// Send one request and return the `ok` reply. Error replies become
    /// [`ClientError::Rejected`].
    async fn call(
        &mut self,
        op: &'static str,
        build: impl FnOnce(u32) -> Message,
    ) -> Result<Message, ClientError> {
        let id = self.next_id;
        self.next_id += 1;

        self.framed
            .send(build(id))
            .await
            .map_err(|e| ClientError::Broker(format!("send {op}: {e}")))?;

        match self.framed.next().await {
            Some(Ok(
                reply @ Message::Response {
                    status: Status::Ok,
                    ..
                },
            )) => Ok(reply),
            Some(Ok(Message::Response { error, hresult, .. })) => Err(ClientError::Rejected {
                op,
                reason: error.unwrap_or_default(),
                hresult,
            }),
            Some(Err(e)) => Err(ClientError::Broker(format!("read {op} response: {e}"))),
            other => Err(ClientError::Broker(format!(
                "unexpected {op} response: {other:?}"
            ))),
        }
    }
}

fn unexpected(op: &str, reply: &Message) -> ClientError {
    ClientError::Broker(format!("unexpected {op} response: {reply:?}"))
}
