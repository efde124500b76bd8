// src/main.rs

mod annotate;
mod classifier;
mod config;
mod gate;
mod history;
mod reports;
mod runner;
mod sampler;
mod storage;
mod types;
mod vehicle_detection;
mod verdict;
mod video;

use anyhow::Result;
use classifier::{Classifier, OnnxViolationClassifier};
use config::Config;
use reports::{FirestoreReports, ReportEmitter, ReportStore};
use runner::{VideoOutcome, VideoRunner};
use storage::{FirebaseStorage, ObjectStore};
use tracing::{error, info, warn};
use types::VideoTask;
use vehicle_detection::{Detector, YoloDetector};
use verdict::AggregationPolicy;
use video::{OpenCvFrameSource, OpenCvVideoSink};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(format!(
            "{},ort=warn",
            config.logging.level
        )))
        .init();

    info!("🚗 Violation Triage Pipeline Starting");
    info!("✓ Configuration loaded from {}", config_path);
    info!(
        "Sampling cadence: every {} frame(s), divergence threshold: {:.1}",
        config.sampling.cadence, config.aggregation.divergence_threshold
    );

    let mut detector = YoloDetector::new(&config.model.detector_path, &config.inference)?;
    let mut classifier =
        OnnxViolationClassifier::new(&config.model.classifier_path, &config.inference)?;

    let store = FirebaseStorage::new(
        config.firebase.bucket.clone(),
        config.firebase.api_key.clone(),
    )?;
    let reports = FirestoreReports::new(
        config.firebase.project_id.clone(),
        config.firebase.api_key.clone(),
        config.firebase.utc_offset_hours,
    )?;

    // Read once up front; videos uploaded mid-run wait for the next batch.
    let tasks = store.list().await?;

    let mut processed = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;

    for (idx, task) in tasks.iter().enumerate() {
        if task.is_processed() {
            info!("Skipping already-processed video: {}", task.object_name);
            skipped += 1;
            continue;
        }

        info!(
            "Processing video {}/{}: {}",
            idx + 1,
            tasks.len(),
            task.object_name
        );

        match process_video(
            task,
            &config,
            &mut detector,
            &mut classifier,
            &store,
            &reports,
        )
        .await
        {
            Ok(outcome) => {
                processed += 1;
                info!("✓ Video processed");
                info!("  Frames decoded: {}", outcome.stats.frames_decoded);
                info!(
                    "  Sampled: {} ({} gate rejection(s))",
                    outcome.stats.frames_sampled, outcome.stats.gate_rejections
                );
                info!(
                    "  Classified: {} ({} positive)",
                    outcome.stats.frames_classified, outcome.stats.positives
                );
                info!("  Verdict: {}", outcome.verdict);
            }
            Err(e) => {
                // One bad video must not take the batch down.
                failed += 1;
                error!("Failed to process {}: {:#}", task.object_name, e);
            }
        }
    }

    if failed > 0 {
        warn!(
            "Batch done: {} processed, {} skipped, {} failed",
            processed, skipped, failed
        );
    } else {
        info!("Batch done: {} processed, {} skipped", processed, skipped);
    }

    Ok(())
}

async fn process_video<D, C, S, R>(
    task: &VideoTask,
    config: &Config,
    detector: &mut D,
    classifier: &mut C,
    store: &S,
    reports: &R,
) -> Result<VideoOutcome>
where
    D: Detector,
    C: Classifier,
    S: ObjectStore,
    R: ReportStore,
{
    let url = store.fetch_url(&task.object_name);
    let mut source = OpenCvFrameSource::open(&url)?;
    let mut sink = OpenCvVideoSink::new(&config.video.output_dir, task.base_name());

    let policy = AggregationPolicy {
        divergence_threshold: config.aggregation.divergence_threshold,
        single_positive_is_noise: config.aggregation.single_positive_is_noise,
    };

    let outcome = VideoRunner::new(
        detector,
        classifier,
        &mut sink,
        config.sampling.cadence,
        policy,
    )
    .run(&mut source)?;

    ReportEmitter::new(store, reports)
        .apply(task, outcome.verdict)
        .await?;

    Ok(outcome)
}
