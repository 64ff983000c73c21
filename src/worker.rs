//! Run [`segment_crowns`] off the calling thread.
//!
//! The pipeline itself has no internal checkpoints: cancellation is observed
//! only before the run starts and before its result is handed back.

use crate::error::{CrownError, Result};
use crate::params::SegmentationParams;
use crate::pipeline::{segment_crowns, CrownSegmentation};
use crate::raster::MultiBandRaster;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Shared flag a caller flips to abandon a run.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle to a background run. `Ok(None)` means the run was cancelled.
pub struct SegmentationHandle {
    token: CancellationToken,
    rx: Receiver<Result<Option<CrownSegmentation>>>,
    thread: Option<JoinHandle<()>>,
}

impl SegmentationHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Non-blocking poll; `None` while the run is still going.
    pub fn try_result(&mut self) -> Option<Result<Option<CrownSegmentation>>> {
        match self.rx.try_recv() {
            Ok(res) => {
                self.reap();
                Some(res)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.reap();
                Some(Err(CrownError::WorkerError("worker exited without a result".into())))
            }
        }
    }

    /// Block until the run finishes.
    pub fn wait(mut self) -> Result<Option<CrownSegmentation>> {
        let res = self
            .rx
            .recv()
            .map_err(|_| CrownError::WorkerError("worker exited without a result".into()))?;
        self.reap();
        res
    }

    fn reap(&mut self) {
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

/// Start a run on a dedicated thread. The image is moved in, so no buffer is
/// shared with the caller or with other runs.
pub fn spawn_segmentation(
    image: MultiBandRaster,
    params: SegmentationParams,
    token: CancellationToken,
) -> Result<SegmentationHandle> {
    let (tx, rx) = mpsc::channel();
    let worker_token = token.clone();
    let thread = thread::Builder::new()
        .name("crown-segmentation".into())
        .spawn(move || {
            let res = if worker_token.is_cancelled() {
                Ok(None)
            } else {
                segment_crowns(&image, &params).map(|seg| {
                    if worker_token.is_cancelled() {
                        debug!("spawn_segmentation: result discarded after cancel");
                        None
                    } else {
                        Some(seg)
                    }
                })
            };
            let _ = tx.send(res);
        })?;
    Ok(SegmentationHandle {
        token,
        rx,
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::SampleKind;

    fn image() -> MultiBandRaster {
        let mut data = Vec::new();
        for r in 0..30 {
            for c in 0..30 {
                let veg = (r as i32 - 15).pow(2) + (c as i32 - 15).pow(2) < 64;
                let (red, nir) = if veg { (40.0, 220.0) } else { (220.0, 40.0) };
                data.extend_from_slice(&[red, (r * 3) as f64, (c * 5) as f64, nir]);
            }
        }
        MultiBandRaster::from_interleaved(30, 30, SampleKind::U8, data).unwrap()
    }

    #[test]
    fn test_background_run_delivers_result() {
        let handle =
            spawn_segmentation(image(), SegmentationParams::default(), CancellationToken::new())
                .unwrap();
        let seg = handle.wait().unwrap().unwrap();
        assert_eq!(seg.crown_count, 1);
    }

    #[test]
    fn test_cancel_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let handle = spawn_segmentation(image(), SegmentationParams::default(), token).unwrap();
        assert!(handle.wait().unwrap().is_none());
    }

    #[test]
    fn test_errors_are_forwarded() {
        let params = SegmentationParams { h: 0.0, ..Default::default() };
        let handle = spawn_segmentation(image(), params, CancellationToken::new()).unwrap();
        assert!(matches!(handle.wait(), Err(CrownError::ParameterOutOfRange(_))));
    }
}
