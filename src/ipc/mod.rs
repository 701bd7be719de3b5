//! IPC framing and wire protocol shared by the host and its clients.

pub mod codec;
pub mod protocol;

use std::path::PathBuf;

/// Socket file name inside the per-user runtime directory.
pub const SOCKET_NAME: &str = "broker.sock";

/// Where the host listens and clients connect.
///
/// An explicit path wins. Otherwise `$XDG_RUNTIME_DIR/xferd/broker.sock`,
/// falling back to `/tmp/xferd-<uid>/broker.sock` when the runtime
/// directory is unset or empty.
pub fn resolve_socket_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join("xferd").join(SOCKET_NAME),
        _ => {
            let uid = nix::unistd::getuid();
            PathBuf::from(format!("/tmp/xferd-{uid}")).join(SOCKET_NAME)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let path = PathBuf::from("/run/custom.sock");
        assert_eq!(resolve_socket_path(Some(path.clone())), path);
    }

    #[test]
    fn default_path_ends_in_socket_name() {
        let path = resolve_socket_path(None);
        assert!(path.ends_with(SOCKET_NAME));
        let parent = path.parent().unwrap().file_name().unwrap().to_string_lossy();
        assert!(parent.starts_with("xferd"));
    }
}
