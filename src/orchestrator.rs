//! Stage-barrier orchestration of the fetch → verify → transcode → publish
//! pipeline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::fetch::fetch;
use crate::hash::write_digest_sidecar;
use crate::scratch::ScratchBuffer;
use crate::transcode::{derive_output_path, transcode_to_zstd};
use crate::types::{
    ArtifactOutcome, ArtifactReport, ArtifactSpec, PipelineConfig, PublishedArtifact, Stage,
};
use crate::verify::verify_digest;

/// Per-artifact progress through the pipeline.
///
/// Every artifact within a stage runs concurrently; the orchestrator joins
/// the whole cohort before any artifact advances, so no artifact transcodes
/// while a sibling is still downloading. `Failed` is terminal and never
/// aborts siblings.
enum ArtifactState {
    Fetched(ScratchBuffer),
    Verified(ScratchBuffer),
    Transcoded(PublishedArtifact),
    Published(PublishedArtifact),
    Failed {
        stage: Stage,
        error: PipelineError,
    },
}

/// Drives every artifact through fetch → verify → transcode → publish.
///
/// Downloads fan out under `max_concurrent_downloads`; transcodes under
/// `max_concurrent_transcodes`, each spreading its encoder over all cores —
/// so the transcode cap, not the download cap, is what bounds CPU
/// oversubscription. Per-artifact failures become that artifact's terminal
/// [`ArtifactOutcome::Failed`] while the rest of the cohort proceeds.
///
/// Returns one report per artifact, in input order. Only setup-level
/// problems (unusable output directory, client construction) error the whole
/// run.
pub async fn run_pipeline(
    config: &PipelineConfig,
    artifacts: Vec<ArtifactSpec>,
) -> Result<Vec<ArtifactReport>, PipelineError> {
    tokio::fs::create_dir_all(&config.output_dir).await?;

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .read_timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| {
            PipelineError::Write(std::io::Error::other(format!(
                "cannot build http client: {}",
                e
            )))
        })?;

    let states = fetch_stage(&client, &artifacts, config).await;
    info!("Fetch stage settled for {} artifact(s)", artifacts.len());

    let states = verify_stage(&artifacts, states).await;
    info!("Verify stage settled");

    let states = transcode_stage(&artifacts, states, config).await;
    info!("Transcode stage settled");

    let states = publish_stage(states).await;

    let reports: Vec<ArtifactReport> = artifacts
        .into_iter()
        .zip(states)
        .map(|(spec, state)| {
            let outcome = match state {
                ArtifactState::Published(published) => ArtifactOutcome::Published(published),
                ArtifactState::Failed { stage, error } => {
                    warn!("{} failed at {} stage: {}", spec.url, stage, error);
                    ArtifactOutcome::Failed { stage, error }
                }
                _ => unreachable!("artifact settled mid-stage"),
            };
            ArtifactReport {
                url: spec.url,
                outcome,
            }
        })
        .collect();

    Ok(reports)
}

/// Fans out all downloads, bounded by a semaphore, and waits for the full
/// cohort (barrier) before returning.
async fn fetch_stage(
    client: &reqwest::Client,
    artifacts: &[ArtifactSpec],
    config: &PipelineConfig,
) -> Vec<ArtifactState> {
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1)));

    let pb = indicatif::ProgressBar::new(artifacts.len() as u64);
    pb.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg} | {elapsed_precise} elapsed")
            .unwrap()
            .progress_chars("█▓▒░ "),
    );
    pb.set_message(format!("Downloading {} artifact(s)", artifacts.len()));

    let mut tasks = Vec::with_capacity(artifacts.len());
    for spec in artifacts {
        let client = client.clone();
        let url = spec.url.clone();
        let semaphore = Arc::clone(&semaphore);
        let pb_clone = pb.clone();

        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire().await.unwrap();
            let result = fetch(&client, &url).await;
            pb_clone.inc(1);
            result
        }));
    }

    let mut states = Vec::with_capacity(tasks.len());
    for task in tasks {
        states.push(match task.await {
            Ok(Ok(scratch)) => ArtifactState::Fetched(scratch),
            Ok(Err(error)) => ArtifactState::Failed {
                stage: Stage::Fetch,
                error,
            },
            Err(join) => ArtifactState::Failed {
                stage: Stage::Fetch,
                error: PipelineError::from_join(join),
            },
        });
    }

    pb.finish_with_message("Downloads settled");
    states
}

/// Hashes every fetched buffer against its manifest digest. Concurrency here
/// is bounded by the blocking worker pool the hash chunks run on.
async fn verify_stage(artifacts: &[ArtifactSpec], states: Vec<ArtifactState>) -> Vec<ArtifactState> {
    let mut slots: Vec<Option<ArtifactState>> = Vec::with_capacity(states.len());
    let mut tasks = Vec::new();

    for (i, (spec, state)) in artifacts.iter().zip(states).enumerate() {
        match state {
            ArtifactState::Fetched(mut scratch) => {
                slots.push(None);
                let url = spec.url.clone();
                let expected = spec.expected_sha256.clone();
                tasks.push((
                    i,
                    tokio::spawn(async move {
                        verify_digest(&mut scratch, &url, &expected)
                            .await
                            .map(|_| scratch)
                    }),
                ));
            }
            other => slots.push(Some(other)),
        }
    }

    for (i, task) in tasks {
        slots[i] = Some(match task.await {
            Ok(Ok(scratch)) => ArtifactState::Verified(scratch),
            Ok(Err(error)) => ArtifactState::Failed {
                stage: Stage::Verify,
                error,
            },
            Err(join) => ArtifactState::Failed {
                stage: Stage::Verify,
                error: PipelineError::from_join(join),
            },
        });
    }

    settle(slots)
}

/// Recompresses every verified buffer, at most `max_concurrent_transcodes`
/// at a time. The scratch buffer is dropped (and its backing storage
/// released) as soon as its transcode finishes.
async fn transcode_stage(
    artifacts: &[ArtifactSpec],
    states: Vec<ArtifactState>,
    config: &PipelineConfig,
) -> Vec<ArtifactState> {
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_transcodes.max(1)));
    let mut slots: Vec<Option<ArtifactState>> = Vec::with_capacity(states.len());
    let mut tasks = Vec::new();

    let survivors = states
        .iter()
        .filter(|state| matches!(state, ArtifactState::Verified(_)))
        .count();
    let pb = indicatif::ProgressBar::new(survivors as u64);
    pb.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg} | {elapsed_precise} elapsed")
            .unwrap()
            .progress_chars("█▓▒░ "),
    );
    pb.set_message(format!("Recompressing {} artifact(s)", survivors));

    for (i, (spec, state)) in artifacts.iter().zip(states).enumerate() {
        match state {
            ArtifactState::Verified(mut scratch) => {
                slots.push(None);
                let url = spec.url.clone();
                let out_dir = config.output_dir.clone();
                let level = config.compression_level;
                let semaphore = Arc::clone(&semaphore);
                let pb_clone = pb.clone();

                tasks.push((
                    i,
                    tokio::spawn(async move {
                        let _permit = semaphore.acquire().await.unwrap();
                        let output_path = derive_output_path(&url, &out_dir)?;
                        let byte_size =
                            transcode_to_zstd(&mut scratch, &output_path, level).await?;
                        pb_clone.inc(1);
                        Ok::<_, PipelineError>(PublishedArtifact {
                            output_path,
                            byte_size,
                        })
                    }),
                ));
            }
            other => slots.push(Some(other)),
        }
    }

    for (i, task) in tasks {
        slots[i] = Some(match task.await {
            Ok(Ok(published)) => ArtifactState::Transcoded(published),
            Ok(Err(error)) => ArtifactState::Failed {
                stage: Stage::Transcode,
                error,
            },
            Err(join) => ArtifactState::Failed {
                stage: Stage::Transcode,
                error: PipelineError::from_join(join),
            },
        });
    }

    pb.finish_with_message("Recompression settled");
    settle(slots)
}

/// Writes the `.sha256` sidecar for every transcoded output.
async fn publish_stage(states: Vec<ArtifactState>) -> Vec<ArtifactState> {
    let mut slots: Vec<Option<ArtifactState>> = Vec::with_capacity(states.len());
    let mut tasks = Vec::new();

    for (i, state) in states.into_iter().enumerate() {
        match state {
            ArtifactState::Transcoded(published) => {
                slots.push(None);
                tasks.push((
                    i,
                    tokio::spawn(async move {
                        write_digest_sidecar(&published.output_path).await?;
                        Ok::<_, PipelineError>(published)
                    }),
                ));
            }
            other => slots.push(Some(other)),
        }
    }

    for (i, task) in tasks {
        slots[i] = Some(match task.await {
            Ok(Ok(published)) => ArtifactState::Published(published),
            Ok(Err(error)) => ArtifactState::Failed {
                stage: Stage::Publish,
                error,
            },
            Err(join) => ArtifactState::Failed {
                stage: Stage::Publish,
                error: PipelineError::from_join(join),
            },
        });
    }

    settle(slots)
}

fn settle(slots: Vec<Option<ArtifactState>>) -> Vec<ArtifactState> {
    slots
        .into_iter()
        .map(|slot| slot.expect("every artifact settles before the barrier lifts"))
        .collect()
}
