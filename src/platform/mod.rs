use std::fs::File;
use std::io;
use std::net::{IpAddr, UdpSocket};
use std::path::PathBuf;

#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod other;

#[cfg(not(unix))]
use other as imp;
#[cfg(unix)]
use unix as imp;

/// Get the current user's home directory.
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

/// Expand leading `~` or `$HOME` in a path string to the actual home directory.
///
/// Returns the original string unchanged when no home directory is available
/// or the string doesn't start with `~` or `$HOME`.
pub fn expand_home(path: &str) -> String {
    let Some(home) = home_dir() else {
        return path.to_string();
    };
    let home = home.to_string_lossy();
    if path == "~" || path == "$HOME" {
        return home.to_string();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return format!("{}/{}", home, rest);
    }
    if let Some(rest) = path
        .strip_prefix("$HOME/")
        .or_else(|| path.strip_prefix("$HOME\\"))
    {
        return format!("{}/{}", home, rest);
    }
    path.to_string()
}

/// Block until an exclusive advisory lock is held on `file`.
/// The lock is released when the file handle is dropped.
pub fn lock_exclusive(file: &File) -> io::Result<()> {
    imp::lock_exclusive(file)
}

/// Identify which process owns a given TCP port.
pub fn identify_port_owner(port: u16) -> Option<String> {
    imp::identify_port_owner(port)
}

/// The address this host uses for outbound traffic.
///
/// Connecting a UDP socket sends no packets; it only asks the kernel to pick
/// a route, whose local end is the address other machines can reach.
pub fn outbound_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> String {
        home_dir().unwrap().to_string_lossy().to_string()
    }

    #[test]
    fn expand_home_tilde_slash() {
        assert_eq!(expand_home("~/rig/templates"), format!("{}/rig/templates", home()));
    }

    #[test]
    fn expand_home_bare_tilde_and_dollar_home() {
        assert_eq!(expand_home("~"), home());
        assert_eq!(expand_home("$HOME"), home());
        assert_eq!(expand_home("$HOME/state"), format!("{}/state", home()));
    }

    #[test]
    fn expand_home_leaves_other_paths_alone() {
        assert_eq!(expand_home("/var/lib/svcrig"), "/var/lib/svcrig");
        assert_eq!(expand_home("templates"), "templates");
        assert_eq!(expand_home("/some/~path"), "/some/~path");
        assert_eq!(expand_home(""), "");
    }

    #[test]
    fn lock_can_be_reacquired_after_drop() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("registry.json.lock");
        {
            let file = File::create(&path).unwrap();
            lock_exclusive(&file).unwrap();
        }
        let file = File::create(&path).unwrap();
        lock_exclusive(&file).unwrap();
    }
}
