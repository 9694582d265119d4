use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use drive_recorder::{
    serializer, simulator, AppConfig, Identity, Recorder, UploadOutcome, UploadStatus,
};

#[derive(Parser, Debug)]
#[command(name = "drive_recorder")]
#[command(about = "Sample motion and location sensors and upload the session as JSON", long_about = None)]
struct Cli {
    /// Config file (defaults to the built-in config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record one session from the simulated sensors, then upload it
    Record {
        /// Duration in seconds (0 = until Ctrl-C)
        #[arg(long, default_value = "10")]
        duration: u64,

        /// Operator name for this session, overriding the stored profile
        #[arg(long)]
        name: Option<String>,

        /// Ask the collector to smooth positions
        #[arg(long)]
        smooth: bool,

        /// Collector endpoint, overriding the config
        #[arg(long)]
        endpoint: Option<String>,

        /// Also write the JSON document to this path
        #[arg(long)]
        dump: Option<PathBuf>,
    },
    /// Print the stored device id and operator name
    Whoami,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AppConfig::load_default()?,
    };

    match cli.command {
        Command::Whoami => {
            let identity = Identity::load(&config.recorder.profile_path)?;
            match identity {
                Some(identity) => println!("{} {}", identity.device_id, identity.operator_name),
                None => println!("no profile at {}", config.recorder.profile_path.display()),
            }
            Ok(())
        }
        Command::Record {
            duration,
            name,
            smooth,
            endpoint,
            dump,
        } => {
            if let Some(endpoint) = endpoint {
                config.upload.endpoint = endpoint;
            }
            let mut identity =
                Identity::load_or_create(&config.recorder.profile_path, prompt_operator_name)?;
            if let Some(name) = name {
                identity.operator_name = name;
            }
            record(config, identity, duration, smooth, dump).await
        }
    }
}

fn prompt_operator_name() -> Option<String> {
    print!("To tag your data a name is helpful. Name: ");
    std::io::stdout().flush().ok()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).ok()?;
    Some(line)
}

async fn record(
    config: AppConfig,
    identity: Identity,
    duration: u64,
    smooth: bool,
    dump: Option<PathBuf>,
) -> Result<()> {
    info!("collector endpoint: {}", config.upload.endpoint);
    let mut recorder = Recorder::new(
        config.recorder.clone(),
        &config.upload,
        config.serializer.clone(),
    );

    let sensors_token = CancellationToken::new();
    let sensors = simulator::spawn_sources(
        recorder.aggregator(),
        &config.simulator,
        sensors_token.clone(),
    )?;

    recorder.start(&identity, smooth)?;

    let mut progress = tokio::time::interval(Duration::from_secs(1));
    let deadline = async {
        if duration == 0 {
            std::future::pending::<()>().await
        } else {
            tokio::time::sleep(Duration::from_secs(duration)).await
        }
    };
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(deadline, interrupted);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            res = &mut interrupted => {
                if let Err(e) = res {
                    warn!("failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
            _ = progress.tick() => {
                let latest = recorder.latest();
                let (lat, lon, speed) = latest
                    .geo
                    .map(|g| (g.latitude, g.longitude, g.speed))
                    .unwrap_or_default();
                info!(
                    "frames={} size={}KB gps=({:.6}, {:.6}) speed={:.2} m/s",
                    recorder.frame_count(),
                    recorder.estimated_byte_size() / 1024,
                    lat,
                    lon,
                    speed
                );
            }
        }
    }

    // Stop the session before the sources so the last frames still see live values.
    let session = recorder.stop_session().await?;
    sensors_token.cancel();

    if let Some(path) = dump {
        match serializer::to_json(&session, &config.serializer) {
            Ok(bytes) => {
                std::fs::write(&path, bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!("session written to {}", path.display());
            }
            Err(e) => warn!("not writing {}: {}", path.display(), e),
        }
    }

    let status = recorder.upload(session).await?;
    sensors.await?;

    match status {
        UploadStatus::Finished(UploadOutcome::Success) => info!("upload successful"),
        UploadStatus::Finished(UploadOutcome::ServerRejected { status, errors }) => {
            error!("collector rejected the session (status {}): {:?}", status, errors)
        }
        UploadStatus::Finished(UploadOutcome::NetworkFailure(cause)) => {
            error!("upload failed: {}", cause)
        }
        UploadStatus::SerializationFailed(cause) => error!("session not serializable: {}", cause),
        UploadStatus::Idle | UploadStatus::Uploading { .. } => {}
    }
    Ok(())
}
