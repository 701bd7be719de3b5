//! CLI commands that talk to a running host.
//!
//! `client` actions connect as a consumer, perform one request, print
//! the result and exit. `source` connects as a publisher and keeps its
//! object alive until interrupted.

mod broker_client;
mod format;

use std::path::PathBuf;

use tokio::io::AsyncReadExt;

use crate::cli::{ClientAction, FormatRequest};
use crate::format::names::predefined_format;
use crate::format::{Aspect, ClipFormat, FormatEtc, Tymed};
use crate::hresult::HResult;
use crate::ipc::protocol::Role;
use crate::ipc::resolve_socket_path;
use crate::medium::Medium;
use broker_client::BrokerClient;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("broker: {0}")]
    Broker(String),
    #[error("{op} failed: {reason}{}", hresult_suffix(.hresult))]
    Rejected {
        op: &'static str,
        reason: String,
        hresult: Option<HResult>,
    },
    #[error("{0}")]
    Usage(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn hresult_suffix(hresult: &Option<HResult>) -> String {
    hresult.map(|h| format!(" ({h})")).unwrap_or_default()
}

/// Run a one-shot consumer command.
pub async fn run(action: ClientAction, socket: Option<PathBuf>) -> Result<(), ClientError> {
    let socket_path = resolve_socket_path(socket);
    let mut broker = BrokerClient::connect(&socket_path, Role::Consumer).await?;

    match action {
        ClientAction::List => {
            let objects = broker.list_objects().await?;
            format::print_objects(&objects);
        }
        ClientAction::Formats { object } => {
            let formats = broker.formats(&object).await?;
            format::print_formats(&formats);
        }
        ClientAction::Query { object, request } => {
            let request = build_request(&mut broker, &request).await?;
            let status = broker.query_get_data(&object, request).await?;
            format::print_query(&request, status);
        }
        ClientAction::Get { object, request } => {
            let request = build_request(&mut broker, &request).await?;
            let medium = broker.get_data(&object, request).await?;
            if medium.is_null() {
                return Err(ClientError::Usage(format!(
                    "object {object} has no data for {request}"
                )));
            }
            format::write_medium(&medium)?;
        }
    }

    Ok(())
}

/// Publish stdin under `format` in a new object, print the object id
/// and hold the object until Ctrl-C.
pub async fn publish(
    format_arg: &str,
    tymed: &str,
    name: Option<String>,
    socket: Option<PathBuf>,
) -> Result<(), ClientError> {
    let tymed = match Tymed::parse(tymed) {
        Some(t) if t == Tymed::HGLOBAL || t == Tymed::ISTREAM => t,
        _ => {
            return Err(ClientError::Usage(format!(
                "--tymed {tymed}: source publishes hglobal or stream only"
            )));
        }
    };

    let mut payload = Vec::new();
    tokio::io::stdin().read_to_end(&mut payload).await?;

    let socket_path = resolve_socket_path(socket);
    let mut broker = BrokerClient::connect(&socket_path, Role::Source).await?;
    let format = resolve_format(&mut broker, format_arg).await?;
    let descriptor = FormatEtc::new(format, tymed);

    let object = broker.create_object(name).await?;
    let size = payload.len();
    let medium = if tymed == Tymed::ISTREAM {
        Medium::Stream(payload)
    } else {
        Medium::HGlobal(payload)
    };
    broker.set_data(&object, descriptor, medium).await?;

    tracing::info!(%object, %descriptor, size, "published");
    format::print_published(&object);

    tokio::signal::ctrl_c().await?;
    broker.release_object(&object).await?;
    tracing::info!(%object, "released");
    Ok(())
}

// -- Argument resolution --

/// A `--format` argument before it is resolved against the host.
#[derive(Debug, PartialEq, Eq)]
enum FormatArg {
    Id(ClipFormat),
    Name(String),
}

/// Predefined names and numeric ids resolve locally; anything else is
/// a registered name.
fn parse_format_arg(arg: &str) -> Result<FormatArg, ClientError> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Err(ClientError::Usage("--format must not be empty".into()));
    }
    if let Some(format) = predefined_format(arg) {
        return Ok(FormatArg::Id(format));
    }

    let numeric = arg.strip_prefix('#').unwrap_or(arg);
    if let Some(hex) = numeric
        .strip_prefix("0x")
        .or_else(|| numeric.strip_prefix("0X"))
    {
        return u16::from_str_radix(hex, 16)
            .map(|id| FormatArg::Id(ClipFormat(id)))
            .map_err(|_| ClientError::Usage(format!("--format {arg}: not a 16-bit id")));
    }
    if let Ok(id) = numeric.parse::<u16>() {
        return Ok(FormatArg::Id(ClipFormat(id)));
    }

    Ok(FormatArg::Name(arg.to_string()))
}

fn parse_tymed_set(arg: &str) -> Result<Tymed, ClientError> {
    arg.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .try_fold(Tymed::empty(), |set, name| {
            Tymed::parse(name)
                .map(|t| set | t)
                .ok_or_else(|| ClientError::Usage(format!("--tymed: unknown medium kind {name}")))
        })
}

async fn resolve_format(broker: &mut BrokerClient, arg: &str) -> Result<ClipFormat, ClientError> {
    match parse_format_arg(arg)? {
        FormatArg::Id(format) => Ok(format),
        FormatArg::Name(name) => broker.register_format(&name).await,
    }
}

async fn build_request(
    broker: &mut BrokerClient,
    request: &FormatRequest,
) -> Result<FormatEtc, ClientError> {
    let tymed = parse_tymed_set(&request.tymed)?;
    let aspect = Aspect::parse(&request.aspect)
        .ok_or_else(|| ClientError::Usage(format!("--aspect: unknown aspect {}", request.aspect)))?;
    let format = resolve_format(broker, &request.format).await?;
    Ok(FormatEtc::new(format, tymed).with_aspect(aspect))
}
