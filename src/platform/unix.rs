use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;

pub fn lock_exclusive(file: &File) -> io::Result<()> {
    loop {
        // SAFETY: fd is valid for the lifetime of `file`
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(target_os = "linux")]
pub fn identify_port_owner(port: u16) -> Option<String> {
    let inode = ["/proc/net/tcp", "/proc/net/tcp6"]
        .iter()
        .find_map(|table| listening_inode(table, port))?;
    process_holding_socket(&inode)
}

/// Inode of the socket listening on `port` in a `/proc/net/tcp*` table.
#[cfg(target_os = "linux")]
fn listening_inode(table: &str, port: u16) -> Option<String> {
    const TCP_LISTEN: &str = "0A";

    let content = std::fs::read_to_string(table).ok()?;
    let port_hex = format!("{:04X}", port);

    content.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 || fields[3] != TCP_LISTEN {
            return None;
        }
        let local_port = fields[1].rsplit(':').next()?;
        (local_port == port_hex && fields[9] != "0").then(|| fields[9].to_string())
    })
}

#[cfg(target_os = "linux")]
fn process_holding_socket(inode: &str) -> Option<String> {
    let needle = format!("socket:[{}]", inode);

    for entry in std::fs::read_dir("/proc").ok()?.flatten() {
        let pid = entry.file_name().to_string_lossy().to_string();
        if !pid.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let Ok(fds) = std::fs::read_dir(format!("/proc/{}/fd", pid)) else {
            continue;
        };
        let owns = fds.flatten().any(|fd| {
            std::fs::read_link(fd.path())
                .map(|link| link.to_string_lossy() == needle)
                .unwrap_or(false)
        });
        if !owns {
            continue;
        }

        let cmd = std::fs::read_to_string(format!("/proc/{}/cmdline", pid))
            .map(|c| c.replace('\0', " ").trim().to_string())
            .unwrap_or_default();
        return Some(match cmd.chars().count() {
            0 => format!("PID {}", pid),
            n if n > 60 => {
                let short: String = cmd.chars().take(57).collect();
                format!("{}... (PID {})", short, pid)
            }
            _ => format!("{} (PID {})", cmd, pid),
        });
    }

    None
}

#[cfg(not(target_os = "linux"))]
pub fn identify_port_owner(_port: u16) -> Option<String> {
    None
}
