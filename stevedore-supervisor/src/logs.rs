//! Service output capture.
//!
//! Exec streams come back through a TTY, so the raw bytes carry color
//! codes, cursor movement, and whatever else the command prints.
//! [`sanitize`] reduces a chunk to plain ASCII text before it is appended
//! to the service's `stdout.log`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Sanitizer
// ---------------------------------------------------------------------------

/// Strips ANSI CSI sequences (`ESC [` through the final byte), backspaces,
/// and non-ASCII bytes from a raw output chunk.
///
/// A truncated CSI sequence at the end of a chunk is dropped up to where it
/// breaks off; a lone escape byte without the `[` introducer is kept as-is.
pub fn sanitize(raw: &[u8]) -> String {
    let mut kept = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let byte = raw[i];
        match byte {
            0x1b if raw.get(i + 1) == Some(&b'[') => {
                // Skip parameter and intermediate bytes up to the final byte.
                let mut j = i + 2;
                while j < raw.len() && !(0x40..=0x7e).contains(&raw[j]) {
                    j += 1;
                }
                i = if j < raw.len() { j + 1 } else { j };
                continue;
            }
            0x08 => {}
            b if b >= 0x80 => {}
            b => kept.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&kept).into_owned()
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Append-only handle on a service's `stdout.log`.
///
/// Procedure tasks run concurrently with the poller, so writes go through a
/// mutex to keep chunks contiguous.
#[derive(Debug)]
pub struct LogSink {
    file: Mutex<File>,
}

impl LogSink {
    /// Opens (creating if needed) the log file in append mode.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one sanitized chunk and flushes it to disk.
    pub fn append(&self, chunk: &str) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        file.write_all(chunk.as_bytes())?;
        file.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
