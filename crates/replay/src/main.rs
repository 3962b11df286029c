//! Fleet Replay - Main Entry Point
//!
//! Usage: `fleet-replay [config.toml] < positions.jsonl > events.jsonl`

use anyhow::Result;
use event_detection::{DetectionConfig, DetectionPipeline, HandlerContext};
use replay::{init_logging, replay, ReferenceData, ReplaySettings};
use state_store::StateStore;
use std::sync::Arc;
use storage::{DeviceRepository, MemoryCache};
use tokio::io::BufReader;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("FLEET_CONFIG").ok());

    let settings = ReplaySettings::load(path.as_deref())?;
    init_logging(&settings)?;
    info!("=== Fleet Replay v{} ===", env!("CARGO_PKG_VERSION"));

    let detection = DetectionConfig::load(path.as_deref())?;

    let cache = Arc::new(MemoryCache::new());
    let repository = Arc::new(DeviceRepository::new());
    if let Some(reference) = &settings.reference_data {
        ReferenceData::from_path(reference)?.install(&cache, &repository)?;
    }

    let ctx = HandlerContext::new(cache, StateStore::in_memory(), repository);
    let pipeline = Arc::new(DetectionPipeline::new(&detection, ctx));

    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    let stats = replay(input, &mut output, pipeline, &detection.dispatch).await?;

    info!(
        "Replay finished: positions={}, skipped={}, events={}",
        stats.positions, stats.skipped, stats.events
    );
    Ok(())
}
