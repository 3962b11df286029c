//! Per-device ordered dispatch
//!
//! Positions are routed to a fixed worker by device id, so reports of one
//! device are processed strictly in submission order while different
//! devices proceed in parallel.

use fleet_model::Position;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::pipeline::DetectionPipeline;
use crate::sink::EventSink;
use crate::DetectionError;

struct Partition {
    sender: mpsc::Sender<Position>,
    worker: JoinHandle<()>,
}

/// Partitioned worker pool around a [`DetectionPipeline`]
pub struct PartitionedDispatcher {
    partitions: Vec<Partition>,
}

impl PartitionedDispatcher {
    /// Spawn one worker task per partition
    pub fn spawn(
        pipeline: Arc<DetectionPipeline>,
        sink: Arc<dyn EventSink>,
        config: &DispatchConfig,
    ) -> Self {
        let count = config.partitions.max(1);
        info!(
            "Starting dispatcher: partitions={}, queue_depth={}",
            count, config.queue_depth
        );

        let partitions = (0..count)
            .map(|index| {
                let (sender, mut receiver) = mpsc::channel::<Position>(config.queue_depth.max(1));
                let pipeline = pipeline.clone();
                let sink = sink.clone();
                let worker = tokio::spawn(async move {
                    while let Some(position) = receiver.recv().await {
                        pipeline.process(&position, sink.as_ref());
                    }
                    debug!("Partition {} drained", index);
                });
                Partition { sender, worker }
            })
            .collect();

        Self { partitions }
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Partition owning a device
    pub fn partition_for(&self, device_id: i64) -> usize {
        device_id.rem_euclid(self.partitions.len() as i64) as usize
    }

    /// Queue a position; waits while the partition queue is full
    pub async fn dispatch(&self, position: Position) -> Result<(), DetectionError> {
        let partition = &self.partitions[self.partition_for(position.device_id)];
        partition
            .sender
            .send(position)
            .await
            .map_err(|_| DetectionError::DispatcherClosed)
    }

    /// Stop accepting positions, drain the queues and join the workers
    pub async fn shutdown(self) {
        let mut workers = Vec::with_capacity(self.partitions.len());
        for partition in self.partitions {
            drop(partition.sender);
            workers.push(partition.worker);
        }
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("Dispatcher worker failed: {}", e);
            }
        }
        info!("Dispatcher stopped");
    }
}
