use crate::cloud::PointCloudBuilder;
use crate::config::PipelineConfig;
use crate::plane::Plane;
use crate::ransac::PlaneEstimator;
use crate::sensor::{CoordinateMapper, RawFrame};
use crate::session::SnapshotStream;
use crate::snapshot::{FrameGate, FrameSnapshot, SnapshotStore};
use crate::types::Streams;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// What happened to a frame handed to [`FramePipeline::on_frame_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Published {
        frame_number: u64,
        points: usize,
        /// `None` when no plane was found.
        inliers: Option<usize>,
    },
    /// Another frame was still being processed.
    Dropped,
}

/// Delivery end of one subscription.
struct Subscriber {
    sender: Sender<Arc<FrameSnapshot>>,
    /// Second receiver on the same channel, used to evict the oldest entry.
    evict: Receiver<Arc<FrameSnapshot>>,
    /// Dead once the subscriber's stream is dropped.
    alive: Weak<()>,
}

/// Per-frame processing: point cloud, plane estimate, snapshot publication.
///
/// `on_frame_ready` is safe to call from the sensor's own callback thread.
/// It never waits: a frame arriving while another is being processed is
/// dropped.
pub struct FramePipeline {
    config: PipelineConfig,
    builder: PointCloudBuilder,
    estimator: Mutex<PlaneEstimator>,
    gate: FrameGate,
    store: SnapshotStore,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl FramePipeline {
    pub fn new(config: PipelineConfig, mapper: Arc<dyn CoordinateMapper>) -> Self {
        let builder = PointCloudBuilder::new(mapper)
            .with_stride(config.pixel_stride)
            .with_color(config.streams.contains(Streams::COLOR));
        let estimator = PlaneEstimator::new(config.ransac.clone());
        Self {
            config,
            builder,
            estimator: Mutex::new(estimator),
            gate: FrameGate::new(),
            store: SnapshotStore::new(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn mapper(&self) -> &Arc<dyn CoordinateMapper> {
        self.builder.mapper()
    }

    pub fn gate(&self) -> &FrameGate {
        &self.gate
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Process one frame unless another is in flight.
    pub fn on_frame_ready(&self, frame: RawFrame) -> FrameOutcome {
        let Some(_ticket) = self.gate.try_acquire() else {
            log::trace!("Frame {} dropped, pipeline busy", frame.frame_number);
            return FrameOutcome::Dropped;
        };

        let points = self.builder.build(&frame);
        let estimate = self
            .estimator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .estimate_auto(&points);

        let (plane, band, inliers) = match estimate {
            Some(e) => (Some(e.plane), e.band, Some(e.inlier_count)),
            None => (None, Vec::new(), None),
        };

        let color = if self.config.streams.contains(Streams::COLOR) {
            frame.color
        } else {
            None
        };

        let frame_number = frame.frame_number;
        let point_count = points.len();
        let snapshot = self.store.publish(FrameSnapshot {
            frame_number,
            points,
            color,
            depth: frame.depth,
            plane,
            band,
        });
        self.broadcast(&snapshot);

        match inliers {
            Some(n) => log::debug!(
                "Frame {}: plane with {}/{} inliers",
                frame_number,
                n,
                point_count
            ),
            None => log::debug!("Frame {}: no plane from {} points", frame_number, point_count),
        }

        FrameOutcome::Published {
            frame_number,
            points: point_count,
            inliers,
        }
    }

    /// Receive published snapshots, buffering at most `capacity`.
    ///
    /// When the buffer is full the oldest buffered snapshot is discarded, so
    /// a slow subscriber always holds the most recent `capacity` snapshots.
    pub fn subscribe(&self, capacity: usize) -> SnapshotStream {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        let alive = Arc::new(());
        self.lock_subscribers().push(Subscriber {
            sender,
            evict: receiver.clone(),
            alive: Arc::downgrade(&alive),
        });
        SnapshotStream::new(receiver, alive)
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    /// Drop every subscription, ending their streams.
    pub fn close_subscribers(&self) {
        self.lock_subscribers().clear();
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn broadcast(&self, snapshot: &Arc<FrameSnapshot>) {
        self.lock_subscribers().retain(|sub| {
            if sub.alive.strong_count() == 0 {
                log::debug!("Subscriber disconnected");
                return false;
            }
            match sub.sender.try_send(snapshot.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(snapshot)) => {
                    if let Ok(stale) = sub.evict.try_recv() {
                        log::trace!("Subscriber full, evicting frame {}", stale.frame_number);
                    }
                    let _ = sub.sender.try_send(snapshot);
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
    }

    pub fn latest(&self) -> Option<Arc<FrameSnapshot>> {
        self.store.latest()
    }

    /// Copy of the latest plane estimate.
    pub fn plane(&self) -> Option<Plane> {
        self.store.plane()
    }
}
