use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use xschedule_client::DeviceConfig;
use xschedule_sdk::{BridgeConfig, NextScheduled, PlaybackStatus, XScheduleSystem};
use xschedule_state::logging::{init_logging_from_env, LoggingMode};

/// Environment variable holding the xSchedule password
const PASSWORD_ENV: &str = "XSCHEDULE_PASSWORD";

/// xSchedule command-line client
///
/// Connects to one xLights scheduler, then either watches it for events or
/// runs a single command and exits.
#[derive(Parser, Debug)]
#[command(name = "xschedule")]
#[command(about = "Watch and control an xLights scheduler")]
#[command(version)]
pub struct Args {
    /// Scheduler host name or IP address
    #[arg(long)]
    pub host: Option<String>,

    /// Scheduler web server port [default: 8080]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// JSON bridge configuration file; --host and --port override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Per-request timeout in seconds [default: 5]
    #[arg(long)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Print events as JSON lines until Ctrl-C
    Watch,
    /// Print the current status as JSON
    Status,
    /// List playlists
    Playlists,
    /// List the steps of a playlist
    Steps { playlist: String },
    /// Play a playlist
    Play {
        playlist: String,
        #[arg(long)]
        looped: bool,
    },
    /// Play one step of a playlist
    PlayStep { playlist: String, step: String },
    /// Stop the current playlist
    Stop,
    /// Set the volume (0-100)
    Volume { level: i64 },
    /// Seek within the current step
    Seek { position_ms: i64 },
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.host.is_none() && self.config.is_none() {
            return Err(anyhow::anyhow!("Either --host or --config is required"));
        }
        if self.port == Some(0) {
            return Err(anyhow::anyhow!("Port must not be 0"));
        }
        if self.timeout == Some(0) {
            return Err(anyhow::anyhow!("Timeout must be positive"));
        }
        Ok(())
    }

    /// Assemble the bridge configuration from the file, flags and `password`
    pub fn bridge_config(&self, password: Option<String>) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::from_json_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => BridgeConfig::new(DeviceConfig::new(String::new())),
        };

        if let Some(host) = &self.host {
            config.device.host = host.clone();
        }
        if let Some(port) = self.port {
            config.device.port = port;
        }
        if let Some(secs) = self.timeout {
            config.device.request_timeout = Duration::from_secs(secs);
        }
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            config = config.with_password(password);
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// What `status` prints
#[derive(Debug, Serialize)]
struct StatusReport {
    device: String,
    status: PlaybackStatus,
    title: Option<String>,
    playlist: Option<String>,
    step: Option<String>,
    position_secs: Option<u64>,
    duration_secs: Option<u64>,
    volume: Option<f32>,
    muted: Option<bool>,
    looping: Option<bool>,
    output_to_lights: Option<bool>,
    test_mode: Option<String>,
    next_scheduled: Option<NextScheduled>,
    version: String,
}

impl StatusReport {
    fn from_system(system: &XScheduleSystem) -> Self {
        Self {
            device: system.device_id().to_string(),
            status: system.playback_status(),
            title: system.media_title(),
            playlist: system.source(),
            step: system.current_step(),
            position_secs: system.media_position_secs(),
            duration_secs: system.media_duration_secs(),
            volume: system.volume_level(),
            muted: system.is_muted(),
            looping: system.playlist_looping(),
            output_to_lights: system.output_to_lights(),
            test_mode: system
                .test_mode()
                .filter(|t| t.active)
                .map(|t| t.mode.unwrap_or_default()),
            next_scheduled: system.next_scheduled(),
            version: system.device_info().sw_version,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print every event batch until Ctrl-C or the stream closes
async fn watch(system: &XScheduleSystem) -> Result<()> {
    let mut events = system.events();
    info!(device = %system.device_id(), "Watching for events (Ctrl-C to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
            batch = events.recv() => match batch {
                Ok(batch) => {
                    for event in &batch.events {
                        println!("{}", serde_json::to_string(event)?);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Output fell behind; events dropped");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
        }
    }
}

async fn run(system: &XScheduleSystem, command: &CliCommand) -> Result<()> {
    let commands = system.commands();
    match command {
        CliCommand::Watch => watch(system).await?,
        CliCommand::Status => print_json(&StatusReport::from_system(system))?,
        CliCommand::Playlists => print_json(&system.playlists().await?)?,
        CliCommand::Steps { playlist } => print_json(&system.steps(playlist).await?)?,
        CliCommand::Play { playlist, looped } => {
            print_json(&commands.play_playlist(playlist, *looped).await?)?
        }
        CliCommand::PlayStep { playlist, step } => {
            print_json(&commands.play_step(playlist, step, false).await?)?
        }
        CliCommand::Stop => print_json(&commands.stop_playlist().await?)?,
        CliCommand::Volume { level } => print_json(&commands.set_volume(*level).await?)?,
        CliCommand::Seek { position_ms } => print_json(&commands.seek_ms(*position_ms).await?)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging_from_env(LoggingMode::Development).context("Failed to initialize logging")?;

    let args = Args::parse();
    args.validate()?;
    let config = args.bridge_config(std::env::var(PASSWORD_ENV).ok())?;

    let system = XScheduleSystem::connect(config)
        .await
        .context("Failed to connect to xSchedule")?;

    let result = run(&system, &args.command).await;
    if let Err(e) = system.shutdown().await {
        warn!("Failed to stop polling: {}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use xschedule_client::DEFAULT_PORT;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("xschedule").chain(args.iter().copied())).unwrap()
    }

    #[rstest]
    #[case(&["--host", "show-pc", "watch"], CliCommand::Watch)]
    #[case(&["--host", "show-pc", "volume", "40"], CliCommand::Volume { level: 40 })]
    #[case(&["--host", "show-pc", "play", "Holiday Show", "--looped"], CliCommand::Play { playlist: "Holiday Show".into(), looped: true })]
    #[case(&["--host", "show-pc", "play-step", "Holiday Show", "Carol"], CliCommand::PlayStep { playlist: "Holiday Show".into(), step: "Carol".into() })]
    fn test_subcommands(#[case] argv: &[&str], #[case] expected: CliCommand) {
        assert_eq!(parse(argv).command, expected);
    }

    #[test]
    fn test_negative_volume_reaches_validation() {
        // Range checks belong to the dispatcher, so clap must accept the value
        let args = parse(&["--host", "show-pc", "volume", "--", "-5"]);
        assert_eq!(args.command, CliCommand::Volume { level: -5 });
    }

    #[rstest]
    #[case(&["status"], false)]
    #[case(&["--host", "show-pc", "--port", "0", "status"], false)]
    #[case(&["--host", "show-pc", "--timeout", "0", "status"], false)]
    #[case(&["--host", "show-pc", "status"], true)]
    fn test_validate(#[case] argv: &[&str], #[case] valid: bool) {
        assert_eq!(parse(argv).validate().is_ok(), valid);
    }

    #[test]
    fn test_password_from_environment() {
        let args = parse(&["--host", "show-pc", "--port", "9000", "status"]);
        let config = args.bridge_config(Some("secret".into())).unwrap();

        assert_eq!(config.device.host, "show-pc");
        assert_eq!(config.device.port, 9000);
        assert_eq!(config.device.password.as_deref(), Some("secret"));

        let config = args.bridge_config(Some(String::new())).unwrap();
        assert_eq!(config.device.password, None);
    }

    #[test]
    fn test_host_without_port_uses_default_port() {
        let config = parse(&["--host", "show-pc", "status"]).bridge_config(None).unwrap();
        assert_eq!(config.device.port, DEFAULT_PORT);
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"host":"old-host","port":8081,"options":{{"enable_browse_media":false}}}}"#
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let args = parse(&["--config", &path, "--host", "new-host", "status"]);
        let config = args.bridge_config(None).unwrap();
        assert_eq!(config.device.host, "new-host");
        assert_eq!(config.device.port, 8081, "--host alone keeps the file's port");
        assert!(!config.options.enable_browse_media);

        let args = parse(&["--config", &path, "--port", "9000", "status"]);
        let config = args.bridge_config(None).unwrap();
        assert_eq!(config.device.host, "old-host");
        assert_eq!(config.device.port, 9000);

        let args = parse(&["--config", &path, "--timeout", "2", "status"]);
        let config = args.bridge_config(None).unwrap();
        assert_eq!(config.device.request_timeout, Duration::from_secs(2));

        let args = parse(&["--config", &path, "status"]);
        let config = args.bridge_config(None).unwrap();
        assert_eq!(config.device.host, "old-host");
        assert_eq!(config.device.port, 8081);
        assert_eq!(config.device.request_timeout, Duration::from_secs(5));
    }
}
