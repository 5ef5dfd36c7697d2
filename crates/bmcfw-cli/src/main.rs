//! bmcfw - firmware deployment for Redfish management controllers
//!
//! Applies firmware images to a controller only when the installed version
//! differs, and keeps a local record of what was applied.

mod commands;
mod config;
mod output;
mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};
use bmcfw_client::firmware::{FirmwareUpdater, UpdateRequest};
use bmcfw_client::{DeviceConfig, RedfishClient, Session, SessionToken};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{ArgOverrides, Config, MergedConfig};
use crate::output::{OutputContext, OutputFormat};
use crate::state::StateStore;

#[derive(Parser)]
#[command(name = "bmcfw")]
#[command(author, version, about = "Redfish firmware deployment")]
#[command(propagate_version = true)]
struct Cli {
    /// Controller URL
    #[arg(short, long, env = "BMCFW_SERVER")]
    server: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "BMCFW_CONFIG")]
    config: Option<PathBuf>,

    /// Device YAML file (endpoints, timeouts)
    #[arg(long, env = "BMCFW_DEVICE")]
    device: Option<PathBuf>,

    /// Session token from a prior login
    #[arg(long, env = "BMCFW_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Login user (when no token is given)
    #[arg(short, long, env = "BMCFW_USERNAME")]
    username: Option<String>,

    /// Login password (when no token is given)
    #[arg(long, env = "BMCFW_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Accept self-signed controller certificates
    #[arg(short = 'k', long)]
    insecure: bool,

    /// State file recording applied firmware
    #[arg(long, env = "BMCFW_STATE")]
    state_file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Update firmware unless the requested version is already installed
    Apply {
        /// Firmware name as reported by the inventory
        name: String,

        /// Desired version
        version: String,

        /// Firmware image file
        local_file: PathBuf,

        /// Detached signature file
        #[arg(long)]
        signature_file: Option<PathBuf>,

        /// Also update the recovery set (accepted, not transmitted)
        #[arg(long)]
        update_recovery_set: bool,
    },

    /// Show the installed version of one firmware
    Read {
        /// Firmware name
        name: String,
    },

    /// List all firmware on the controller
    Inventory,

    /// Drop the stored record for a firmware (device unchanged)
    Forget {
        /// Firmware name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(ArgOverrides {
        server: cli.server.as_deref(),
        output: cli.output.map(|o| o.as_str()),
        no_color: cli.no_color,
        username: cli.username.as_deref(),
        insecure: cli.insecure,
        device: cli.device.as_deref(),
        state_file: cli.state_file.as_deref(),
    })?;

    let format = OutputFormat::parse(&merged.output)
        .with_context(|| format!("Unknown output format: {}", merged.output))?;
    let ctx = OutputContext::new(format, merged.no_color, cli.quiet);

    // Execute command
    match &cli.command {
        Commands::Apply {
            name,
            version,
            local_file,
            signature_file,
            update_recovery_set,
        } => {
            let mut request = UpdateRequest::new(name, version, local_file)
                .with_recovery_set(*update_recovery_set);
            if let Some(signature) = signature_file {
                request = request.with_signature(signature);
            }
            let mut store = StateStore::open(&merged.state_file)?;
            let (updater, session) = create_updater(&cli, &merged).await?;
            let result = commands::apply(&updater, &request, &mut store, &ctx).await;
            close_session(&updater, session).await;
            result
        }

        Commands::Read { name } => {
            let mut store = StateStore::open(&merged.state_file)?;
            let (updater, session) = create_updater(&cli, &merged).await?;
            let result = commands::read(&updater, name, &mut store, &ctx).await;
            close_session(&updater, session).await;
            result
        }

        Commands::Inventory => {
            let (updater, session) = create_updater(&cli, &merged).await?;
            let result = commands::inventory(&updater, &ctx).await;
            close_session(&updater, session).await;
            result
        }

        Commands::Forget { name } => {
            let mut store = StateStore::open(&merged.state_file)?;
            commands::forget(name, &mut store, &ctx)
        }
    }
}

/// Build an authenticated updater from a token, or by logging in
///
/// Returns the login session when one was created here, so it can be closed.
async fn create_updater(
    cli: &Cli,
    merged: &MergedConfig,
) -> Result<(FirmwareUpdater, Option<Session>)> {
    let mut device = match &merged.device {
        Some(path) => DeviceConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load device config: {}", path.display()))?,
        None => DeviceConfig::builder(&merged.server).build(),
    };
    if cli.server.is_some() || merged.device.is_none() {
        device.connection.base_url = merged.server.clone();
    }
    if merged.insecure {
        device.connection.accept_invalid_certs = true;
    }

    tracing::debug!(
        server = %device.connection.base_url,
        insecure = device.connection.accept_invalid_certs,
        "Connecting to controller"
    );
    let client = RedfishClient::new(device).context("Failed to create Redfish client")?;

    match (&cli.token, &merged.username, &cli.password) {
        (Some(token), _, _) => {
            let token = SessionToken::new(token.as_str())?;
            Ok((FirmwareUpdater::new(client.with_session(token)), None))
        }
        (None, Some(username), Some(password)) => {
            tracing::debug!(username = %username, "Logging in");
            let session = client
                .login(username, password)
                .await
                .context("Login failed")?;
            let updater = FirmwareUpdater::new(client.with_session(session.token.clone()));
            Ok((updater, Some(session)))
        }
        _ => anyhow::bail!("No session token: pass --token or --username and --password"),
    }
}

/// Delete a session opened by this invocation; failures are only logged
async fn close_session(updater: &FirmwareUpdater, session: Option<Session>) {
    let Some(uri) = session.and_then(|s| s.uri) else {
        return;
    };
    if let Err(e) = updater.client().logout(&uri).await {
        tracing::warn!(error = %e, "Failed to close session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmcfw_client::testing::{MockDevice, TestServer, MOCK_PASSWORD, MOCK_TOKEN, MOCK_USER};

    fn cli(server: &TestServer, state_file: &std::path::Path, args: &[&str]) -> Cli {
        let base_url = server.base_url();
        let state_file = state_file.to_string_lossy().into_owned();
        let mut argv: Vec<&str> = vec![
            "bmcfw",
            "--server",
            base_url.as_str(),
            "--state-file",
            state_file.as_str(),
            "--quiet",
            "--no-color",
        ];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn test_inventory_ignores_corrupt_state_file() {
        let device = MockDevice::new().with_firmware("BIOS", "1.0");
        let server = TestServer::start(device.clone()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let state_file = dir.path().join("state.json");
        std::fs::write(&state_file, "{ not json").unwrap();

        run(cli(&server, &state_file, &["--token", MOCK_TOKEN, "inventory"]))
            .await
            .unwrap();

        let err = run(cli(&server, &state_file, &["forget", "BIOS"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse state file"));
    }

    #[tokio::test]
    async fn test_login_session_is_closed_after_command() {
        let device = MockDevice::new().with_firmware("BIOS", "1.0");
        let server = TestServer::start(device.clone()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let state_file = dir.path().join("state.json");

        run(cli(
            &server,
            &state_file,
            &["--username", MOCK_USER, "--password", MOCK_PASSWORD, "read", "BIOS"],
        ))
        .await
        .unwrap();

        assert_eq!(device.open_sessions(), 0);
    }
}
