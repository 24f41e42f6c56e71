use cardscan::application::session::{ScanSession, frame_channel};
use cardscan::config::ScanConfig;
use cardscan::domain::ports::TextRecognizerBox;
use cardscan::infrastructure::replay::ReplayRecognizer;
use cardscan::interfaces::csv::fragment_reader::FragmentReader;
use cardscan::interfaces::json::report_writer::{ReportWriter, ScanReport};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Recorded OCR output (CSV: frame,text,x,y,width,height[,script])
    input: PathBuf,

    /// Scan configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Identical readings needed before a field locks. Overrides the config file.
    #[arg(long)]
    threshold: Option<u32>,

    /// Frame budget before the scan gives up. Overrides the config file.
    #[arg(long)]
    max_frames: Option<u32>,

    /// Log every frame and candidate to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => ScanConfig::load(path).into_diagnostic()?,
        None => ScanConfig::default(),
    };
    if let Some(threshold) = cli.threshold {
        config.consensus.threshold = threshold;
    }
    if let Some(max_frames) = cli.max_frames {
        config.consensus.max_frames = max_frames;
    }

    // Load the recording, skipping rows that cannot be read
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = FragmentReader::new(file);
    let fragments = reader.fragments().filter_map(|row| match row {
        Ok(fragment) => Some(fragment),
        Err(e) => {
            warn!("Skipping unreadable fragment row: {}", e);
            None
        }
    });
    let replay = ReplayRecognizer::from_fragments(fragments);
    let last_frame = replay.last_frame();

    let recognizer: TextRecognizerBox<u64> = Box::new(replay);
    let (mut session, _completion) = ScanSession::new(&config, recognizer).into_diagnostic()?;
    let (feed, frames) = frame_channel();

    // Replay every frame in order; gaps replay as unreadable frames
    let producer = tokio::spawn(async move {
        for frame in 1..=last_frame {
            if !feed.send(frame).await {
                break;
            }
        }
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let outcome = session.run(frames, cancel).await;
    producer.abort();

    let stats = session.stats();
    info!(
        completed = outcome.is_completed(),
        frames = stats.frames_processed,
        "Scan finished"
    );
    if !outcome.card().has_card_number() {
        warn!("No card number reached consensus");
    }

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer
        .write_report(&ScanReport::new(&outcome, stats))
        .into_diagnostic()?;

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "cardscan=debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}
