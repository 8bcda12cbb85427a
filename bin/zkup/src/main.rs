//! zkup is a CLI tool to install and run a dockerized L1 + L2 development environment.

mod cli;
mod settings;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use tokio_util::sync::CancellationToken;

use cli::{Cli, Command};
use settings::Settings;
use zkup_env::{EnvironmentStatus, TickObserver, TickReport};

/// Print a progress line every this many readiness ticks.
const PROGRESS_EVERY_TICKS: u64 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let settings = Settings::load(cli.config.as_ref().map(PathBuf::from).as_deref())?;
    let data_dir = settings.data_dir()?;

    tracing::debug!(
        data_dir = %data_dir.display(),
        command = %cli.command,
        "Loaded settings"
    );

    let node = zkup_env::dockerized_node(&data_dir, settings.descriptor()?)
        .context("Failed to set up the dockerized node")?
        .with_readiness(settings.readiness()?);

    match cli.command {
        Command::Install | Command::Update => {
            let cancel = cancel_on_ctrl_c();
            let revision = if cli.command == Command::Install {
                node.install(Some(progress_observer()), &cancel).await?
            } else {
                node.update(Some(progress_observer()), &cancel).await?
            };

            tracing::info!(revision = %revision, "Environment is ready");
            println!("{}", node.get_startup_info());
        }
        Command::Start => node.start().await?,
        Command::Stop => node.stop().await?,
        Command::Clean => node.clean().await?,
        Command::Status => {
            let status = node.status().await?;
            let latest = match node.latest_version().await {
                Ok(latest) => Some(latest),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not resolve the latest version");
                    None
                }
            };
            println!("{}", render_status(&status, latest.as_deref()));
        }
        Command::Logs => {
            for line in node.get_logs().await? {
                println!("{}", line);
            }
        }
        Command::Info => println!("{}", node.get_startup_info()),
    }

    Ok(())
}

/// A token cancelled on the first Ctrl+C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping the readiness wait...");
            trigger.cancel();
        }
    });
    cancel
}

fn progress_observer() -> TickObserver {
    Box::new(|tick: &TickReport<'_>| {
        if tick.tick % PROGRESS_EVERY_TICKS == 0 {
            tracing::info!("Waiting for contracts... {}s", tick.elapsed.as_secs());
        }
    })
}

fn render_status(status: &EnvironmentStatus, latest: Option<&str>) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Service", "State"]);
    for service in &status.services {
        let state = if service.is_running { "running" } else { "stopped" };
        table.add_row(vec![service.service_name.as_str(), state]);
    }

    let installed = status.version.as_deref().unwrap_or("not installed");
    let latest = latest.unwrap_or("unknown");
    format!(
        "{}\nInstalled: {}\nRunning: {}\nInstalled version: {}\nLatest version: {}",
        table, status.installed, status.running, installed, latest
    )
}

#[cfg(test)]
mod tests {
    use zkup_env::ServiceStatus;

    use super::*;

    #[test]
    fn test_render_status_lists_services_and_versions() {
        let status = EnvironmentStatus {
            installed: true,
            running: true,
            version: Some("a1b2c3".to_string()),
            services: vec![
                ServiceStatus::new("postgres", true),
                ServiceStatus::new("zksync", false),
            ],
        };

        let rendered = render_status(&status, Some("d4e5f6"));

        assert!(rendered.contains("postgres"));
        assert!(rendered.contains("stopped"));
        assert!(rendered.contains("Installed version: a1b2c3"));
        assert!(rendered.contains("Latest version: d4e5f6"));
    }

    #[test]
    fn test_render_status_without_install() {
        let status = EnvironmentStatus {
            installed: false,
            running: false,
            version: None,
            services: Vec::new(),
        };

        let rendered = render_status(&status, None);
        assert!(rendered.contains("Installed version: not installed"));
        assert!(rendered.contains("Latest version: unknown"));
    }
}
