use clap::Parser;
use rezstd::{default_artifacts, load_manifest, run_pipeline, ArtifactOutcome, PipelineConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rezstd")]
#[command(about = "Fetch, verify, and recompress release archives from xz to zstd", long_about = None)]
#[command(version)]
struct Args {
    /// Output directory for .zst files and their .sha256 sidecars
    output: PathBuf,

    /// JSON manifest mapping source URL to expected SHA-256
    /// (defaults to the built-in LLVM release table)
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// zstd compression level
    #[arg(short, long, default_value_t = 19, value_parser = clap::value_parser!(i32).range(1..=22))]
    level: i32,

    /// Maximum concurrent downloads
    #[arg(long, default_value_t = 4)]
    max_concurrent_downloads: usize,

    /// Maximum concurrent transcodes (each one is internally multithreaded)
    #[arg(long, default_value_t = 2)]
    max_concurrent_transcodes: usize,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Exit 1 (not clap's default 2) on usage errors, with the message on stderr.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err)
            if matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
        {
            err.exit()
        }
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("rezstd={}", log_level))
        .init();

    let artifacts = match &args.manifest {
        Some(path) => load_manifest(path).await?,
        None => default_artifacts(),
    };
    info!(
        "Processing {} artifact(s) into {:?}",
        artifacts.len(),
        args.output
    );

    let config = PipelineConfig {
        output_dir: args.output,
        compression_level: args.level,
        max_concurrent_downloads: args.max_concurrent_downloads,
        max_concurrent_transcodes: args.max_concurrent_transcodes,
    };

    let reports = run_pipeline(&config, artifacts).await?;

    let mut failed = 0usize;
    for report in &reports {
        match &report.outcome {
            ArtifactOutcome::Published(published) => {
                println!("{}", published.output_path.display());
            }
            ArtifactOutcome::Failed { stage, error } => {
                failed += 1;
                eprintln!("FAILED [{}] {}: {}", stage, report.url, error);
            }
        }
    }

    if failed > 0 {
        eprintln!("{} of {} artifact(s) failed", failed, reports.len());
        std::process::exit(1);
    }
    Ok(())
}
