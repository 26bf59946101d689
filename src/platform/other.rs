use std::fs::File;
use std::io;

/// Cross-process locking is unavailable here; the in-process mutex still
/// serializes registry access within one process.
pub fn lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}

pub fn identify_port_owner(_port: u16) -> Option<String> {
    None
}
