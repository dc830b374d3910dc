//! `stevedore list` — loaded services with status and resource usage.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use stevedore_core::Status;
use stevedore_daemon::paths::control_socket;
use stevedore_daemon::{send_command, Command, Reply};
use stevedore_supervisor::ServiceSnapshot;

/// Arguments for `stevedore list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let socket = control_socket();
        let reply = send_command(&socket, &Command::List)
            .context("failed to reach the stevedore daemon")?;

        let services = match reply {
            Reply::Services(services) => services,
            Reply::Error { error } => anyhow::bail!(error),
            Reply::Info { .. } => anyhow::bail!("unexpected reply from daemon"),
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&services)
                    .context("failed to serialize service list")?
            );
            return Ok(());
        }

        print_table(services);
        Ok(())
    }
}

#[derive(Tabled)]
struct ServiceTableRow {
    #[tabled(rename = "service")]
    service: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "container")]
    container: String,
    #[tabled(rename = "cpu %")]
    cpu: String,
    #[tabled(rename = "mem (MB)")]
    memory: String,
}

fn print_table(services: Vec<ServiceSnapshot>) {
    println!(
        "Stevedore v{} | {} services | {} running",
        env!("CARGO_PKG_VERSION"),
        services.len(),
        services
            .iter()
            .filter(|snapshot| snapshot.status == Status::Running)
            .count(),
    );

    if services.is_empty() {
        println!("No services loaded.");
        return;
    }

    let rows: Vec<ServiceTableRow> = services.into_iter().map(table_row).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn table_row(snapshot: ServiceSnapshot) -> ServiceTableRow {
    let running = snapshot.status == Status::Running;
    ServiceTableRow {
        service: snapshot.manifest.id.to_string(),
        name: snapshot.manifest.name.clone(),
        status: status_label(snapshot.status),
        container: snapshot
            .container_id
            .as_deref()
            .map(short_id)
            .unwrap_or_else(|| "-".to_string()),
        cpu: if running {
            format!("{:.2}", snapshot.stats.cpu_usage_percent)
        } else {
            "-".to_string()
        },
        memory: if running {
            snapshot.stats.memory_usage_mb.to_string()
        } else {
            "-".to_string()
        },
    }
}

fn status_label(status: Status) -> String {
    match status {
        Status::Running => "running".green().bold().to_string(),
        Status::Stopped => "stopped".bright_black().bold().to_string(),
    }
}

/// Engine container ids are 64 hex chars; the short form is enough to cross
/// reference with `docker ps`.
fn short_id(id: &str) -> String {
    id.chars().take(12).collect()
}
