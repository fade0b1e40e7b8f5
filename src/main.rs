use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use spotter_gateway::scan::{ScanController, ScanSession, ScanState};
use spotter_gateway::{
    AudioFeedback, Config, Detector, Feedback, HttpDetector, ImageDirSource, LogFeedback,
    PresetSpeech, SessionRelay, relay,
};

/// Spotter - voice-driven object finder gateway
#[derive(Parser)]
#[command(name = "spotter", version, about)]
struct Cli {
    /// Port for the session relay
    #[arg(long, env = "SPOTTER_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan still frames from a directory until the target is found
    Scan {
        /// What to look for (treated as a speech transcript)
        #[arg(short, long)]
        target: String,

        /// Directory of frames to cycle through
        #[arg(long)]
        frames: PathBuf,

        /// Detection service base URL
        #[arg(long, env = "SPOTTER_DETECTOR_URL")]
        detector_url: Option<String>,

        /// Seconds between captures
        #[arg(long)]
        interval_secs: Option<f64>,

        /// Detection confidence threshold
        #[arg(long)]
        threshold: Option<f32>,

        /// Give up after this many seconds
        #[arg(long, default_value = "60")]
        timeout_secs: u64,

        /// Log feedback instead of playing a tone
        #[arg(long)]
        silent: bool,

        /// Keep a detection history and dump the last frame on exit
        #[arg(long)]
        debug: bool,
    },
    /// Probe the detection service liveness endpoint
    CheckDetector {
        /// Detection service base URL
        #[arg(long, env = "SPOTTER_DETECTOR_URL")]
        detector_url: Option<String>,
    },
    /// Send a test notification through a running relay
    Notify {
        /// Relay base URL
        #[arg(long, default_value = "http://127.0.0.1:18790")]
        relay_url: String,

        /// Session identifier
        #[arg(short, long)]
        session: String,

        /// Notification type
        #[arg(long, default_value = "found")]
        kind: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,spotter_gateway=info",
        1 => "info,spotter_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Scan {
                target,
                frames,
                detector_url,
                interval_secs,
                threshold,
                timeout_secs,
                silent,
                debug,
            } => {
                let options = ScanOptions {
                    frames,
                    detector_url,
                    interval_secs,
                    threshold,
                    timeout_secs,
                    silent,
                    debug,
                };
                run_scan(&target, options).await
            }
            Command::CheckDetector { detector_url } => check_detector(detector_url).await,
            Command::Notify {
                relay_url,
                session,
                kind,
            } => send_notify(&relay_url, &session, &kind).await,
        };
    }

    serve_relay(cli.port).await
}

/// Run the session relay until interrupted
async fn serve_relay(port_override: Option<u16>) -> anyhow::Result<()> {
    let config = Config::from_env();
    let mut relay_config = config.relay;
    if let Some(port) = port_override {
        relay_config.port = port;
    }

    tracing::info!(
        port = relay_config.port,
        cooldown_ms = relay_config.notify_cooldown.as_millis(),
        "starting spotter relay"
    );

    let hub = Arc::new(SessionRelay::new(relay_config.notify_cooldown));
    relay::api::serve(hub, &relay_config).await?;

    Ok(())
}

/// Options for the scan subcommand
struct ScanOptions {
    frames: PathBuf,
    detector_url: Option<String>,
    interval_secs: Option<f64>,
    threshold: Option<f32>,
    timeout_secs: u64,
    silent: bool,
    debug: bool,
}

/// Drive the capture loop against a live detector using still frames
async fn run_scan(target: &str, options: ScanOptions) -> anyhow::Result<()> {
    let config = Config::from_env();

    let mut scan_config = config.scan;
    if let Some(secs) = options.interval_secs {
        scan_config.scan_interval = Duration::from_secs_f64(secs.max(0.001));
    }
    if let Some(t) = options.threshold {
        scan_config.threshold = t;
    }
    scan_config.debug_enabled = scan_config.debug_enabled || options.debug;
    let scan_config = scan_config.validated()?;

    let base_url = options.detector_url.unwrap_or(config.detector.base_url);
    let detector = Arc::new(HttpDetector::new(
        &base_url,
        config.detector.request_timeout,
    )?);

    let feedback: Box<dyn Feedback> = if options.silent {
        Box::new(LogFeedback)
    } else {
        match AudioFeedback::new() {
            Ok(audio) => Box::new(audio),
            Err(e) => {
                tracing::warn!(error = %e, "audio unavailable, logging feedback instead");
                Box::new(LogFeedback)
            }
        }
    };

    let session = ScanSession::new(
        Box::new(PresetSpeech::new(target)),
        Box::new(ImageDirSource::new(options.frames)),
        feedback,
        detector,
        scan_config,
    );

    let mut controller = ScanController::new(session);
    controller.start_recording().await?;
    controller.on_transcript(target).await;
    controller.stop_recording().await?;

    {
        let session = controller.session();
        let guard = session.lock().await;
        println!("scanning for \"{}\" against {base_url}", guard.target());
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(options.timeout_secs);
    let handle = controller.session();
    let found = loop {
        if tokio::time::Instant::now() >= deadline {
            break false;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let guard = handle.lock().await;
        if guard.state() == ScanState::Found {
            break true;
        }
    };

    controller.stop_detecting().await;

    {
        let guard = handle.lock().await;
        println!("{}", guard.status());
        if let Some(preview) = guard.last_preview() {
            let path = std::env::temp_dir().join("spotter-preview.png");
            std::fs::write(&path, preview)?;
            println!("preview written to {}", path.display());
        }
        if options.debug {
            if let Some(frame) = guard.last_frame() {
                let path = std::env::temp_dir().join("spotter-last-frame.png");
                std::fs::write(&path, frame)?;
                println!("last frame written to {}", path.display());
            }
        }
    }

    if found {
        Ok(())
    } else {
        anyhow::bail!("target not found within {}s", options.timeout_secs)
    }
}

/// Probe the detection service
async fn check_detector(detector_url: Option<String>) -> anyhow::Result<()> {
    let config = Config::from_env();
    let base_url = detector_url.unwrap_or(config.detector.base_url);

    let detector = HttpDetector::new(&base_url, config.detector.request_timeout)?;
    match detector.health().await {
        Ok(true) => {
            println!("detector at {base_url} is healthy");
            Ok(())
        }
        Ok(false) => anyhow::bail!("detector at {base_url} reports not ok"),
        Err(e) => anyhow::bail!("detector at {base_url} unreachable: {e}"),
    }
}

/// Send a test notification to a relay
async fn send_notify(relay_url: &str, session: &str, kind: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/notify", relay_url.trim_end_matches('/')))
        .json(&serde_json::json!({ "session": session, "type": kind, "payload": {} }))
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    println!("{status}: {body}");

    if status.is_success() {
        Ok(())
    } else {
        anyhow::bail!("notify rejected")
    }
}
