use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xferd", about = "Multi-format data objects hosted over a Unix socket")]
pub struct Cli {
    /// Socket path (default: $XDG_RUNTIME_DIR/xferd/broker.sock)
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the host daemon
    Host {
        /// Objects hosted at once
        #[arg(long, default_value = "64")]
        max_objects: NonZeroUsize,

        /// Formats per object
        #[arg(long, default_value = "32")]
        max_formats: NonZeroUsize,

        /// Open enumerators per connection
        #[arg(long, default_value = "64")]
        max_enumerators: NonZeroUsize,
    },

    /// Publish stdin as a new object and hold it until interrupted
    Source {
        /// Format name or numeric id (e.g. text, 13, 0xc001, "HTML Format")
        #[arg(long)]
        format: String,

        /// Medium kind: hglobal or stream
        #[arg(long, default_value = "hglobal")]
        tymed: String,

        /// Label shown by `client list`
        #[arg(long)]
        name: Option<String>,
    },

    /// One-shot consumer commands
    Client {
        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(Subcommand)]
pub enum ClientAction {
    /// List hosted objects
    List,

    /// List the formats an object offers
    Formats { object: String },

    /// Ask whether an object can render a format
    Query {
        object: String,

        #[command(flatten)]
        request: FormatRequest,
    },

    /// Write an object's data for a format to stdout
    Get {
        object: String,

        #[command(flatten)]
        request: FormatRequest,
    },
}

/// Descriptor fields for `query` and `get`.
#[derive(Args, Debug, Clone)]
pub struct FormatRequest {
    /// Format name or numeric id
    #[arg(long)]
    pub format: String,

    /// Accepted medium kinds, `|`-separated (e.g. hglobal|stream)
    #[arg(long, default_value = "hglobal|stream")]
    pub tymed: String,

    /// content, thumbnail, icon or docprint
    #[arg(long, default_value = "content")]
    pub aspect: String,
}
