use crate::pipeline::FramePipeline;
use crate::sensor::RawFrame;
use crate::snapshot::FrameSnapshot;
use crate::{DepthPlaneError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How often the idle worker re-checks its stop flag.
const STOP_POLL: Duration = Duration::from_millis(100);

/// A running frame-processing worker.
///
/// Frames enter through a [`FrameSink`] and are processed one at a time on a
/// dedicated thread. The handoff channel has no capacity: a frame is only
/// accepted while the worker is idle and waiting, so nothing ever queues
/// behind a frame in progress.
pub struct SensorSession {
    pipeline: Arc<FramePipeline>,
    sender: Sender<RawFrame>,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SensorSession {
    /// Spawn the worker thread for `pipeline`.
    pub fn start(pipeline: FramePipeline) -> Result<SensorSession> {
        let pipeline = Arc::new(pipeline);
        let (sender, receiver) = crossbeam_channel::bounded(0);
        let stop_flag = Arc::new(AtomicBool::new(false));

        let worker_pipeline = pipeline.clone();
        let stop_clone = stop_flag.clone();
        let thread = std::thread::Builder::new()
            .name("depthplane-worker".into())
            .spawn(move || {
                worker_loop(worker_pipeline, receiver, stop_clone);
            })
            .map_err(|e| DepthPlaneError::ThreadSpawn(e.to_string()))?;

        Ok(SensorSession {
            pipeline,
            sender,
            stop_flag,
            thread: Some(thread),
        })
    }

    /// Producer handle for the sensor callback. Cheap to clone.
    pub fn sink(&self) -> FrameSink {
        FrameSink {
            sender: self.sender.clone(),
        }
    }

    /// Stream of published snapshots, buffering at most `capacity`. A full
    /// buffer discards its oldest snapshot.
    pub fn subscribe(&self, capacity: usize) -> SnapshotStream {
        self.pipeline.subscribe(capacity)
    }

    pub fn pipeline(&self) -> &Arc<FramePipeline> {
        &self.pipeline
    }

    pub fn latest(&self) -> Option<Arc<FrameSnapshot>> {
        self.pipeline.latest()
    }

    /// Check if the worker is still running.
    ///
    /// False after `stop`, and also once the worker thread has exited on its
    /// own (for example after a panic in the coordinate mapper).
    pub fn is_active(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed)
            && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the worker and wait for it to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Frame worker panicked");
            }
        }
        // Wake any consumer blocked on a stream.
        self.pipeline.close_subscribers();
    }
}

impl Drop for SensorSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Producer side of a session.
#[derive(Clone)]
pub struct FrameSink {
    sender: Sender<RawFrame>,
}

impl FrameSink {
    /// Hand a frame to the worker without waiting.
    ///
    /// Returns `false` when the frame was dropped because the worker is busy
    /// or the session has stopped.
    pub fn submit(&self, frame: RawFrame) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                log::trace!("Worker busy, dropping frame {}", frame.frame_number);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("Session stopped, frame discarded");
                false
            }
        }
    }
}

/// Consumer side of a session.
pub struct SnapshotStream {
    receiver: Receiver<Arc<FrameSnapshot>>,
    _alive: Arc<()>,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: Receiver<Arc<FrameSnapshot>>, alive: Arc<()>) -> Self {
        Self {
            receiver,
            _alive: alive,
        }
    }

    /// Receive the next snapshot (blocks until available).
    pub fn recv(&self) -> Result<Arc<FrameSnapshot>> {
        self.receiver
            .recv()
            .map_err(|_| DepthPlaneError::StreamStopped)
    }

    /// Try to receive a snapshot without blocking.
    pub fn try_recv(&self) -> Option<Arc<FrameSnapshot>> {
        self.receiver.try_recv().ok()
    }

    /// Receive a snapshot with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Arc<FrameSnapshot>> {
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => DepthPlaneError::Timeout,
            RecvTimeoutError::Disconnected => DepthPlaneError::StreamStopped,
        })
    }
}

fn worker_loop(
    pipeline: Arc<FramePipeline>,
    receiver: Receiver<RawFrame>,
    stop_flag: Arc<AtomicBool>,
) {
    log::info!("Frame worker started");

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            log::info!("Frame worker stopping (stop flag set)");
            break;
        }

        let frame = match receiver.recv_timeout(STOP_POLL) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                log::info!("Frame channel disconnected, stopping worker");
                break;
            }
        };

        pipeline.on_frame_ready(frame);
    }
}
