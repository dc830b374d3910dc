//! `stevedore logs` — trailing procedure output for one service.
//!
//! Reads the sanitized log file straight from the services root rather than
//! asking the daemon, so logs stay reachable even while the daemon is down.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::{Context, Result};
use clap::Args;

use stevedore_core::{layout, ServiceId};
use stevedore_daemon::paths::services_root;

/// Arguments for `stevedore logs`.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Service identifier (the name of its directory under the services root).
    pub service: String,

    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,
}

impl LogsArgs {
    pub fn run(self) -> Result<()> {
        let id = ServiceId::from(self.service.as_str());
        let path = layout::log_path(&services_root(), &id);
        print_tail(&path, self.lines)
            .with_context(|| format!("failed to read log for service '{id}'"))
    }
}

fn print_tail(path: &std::path::Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    for line in tail {
        println!("{line}");
    }
    Ok(())
}
