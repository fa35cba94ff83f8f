// src/pipeline/prefetch.rs
//
// Decode-and-detect worker. Decoding and per-frame detection are independent
// of tracker state, so they run ahead on their own thread; the bounded
// channel hands results back in strict frame order for the sequential
// tracker. Cancellation is observed between frames on both sides.

use super::progress::CancelToken;
use crate::detection::{DetectedLight, LightDetector};
use crate::types::Frame;
use crate::video_processor::VideoReader;
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread::JoinHandle;
use tracing::{debug, error};

pub enum PrefetchItem {
    Frame {
        index: u64,
        frame: Frame,
        detections: Vec<DetectedLight>,
    },
    Error(String),
}

pub struct PrefetchStage {
    pub receiver: Receiver<PrefetchItem>,
    handle: JoinHandle<()>,
}

impl PrefetchStage {
    /// Move the reader and detector onto a worker thread with `depth` frames
    /// of lookahead.
    pub fn spawn(
        mut reader: VideoReader,
        detector: LightDetector,
        depth: usize,
        cancel: CancelToken,
    ) -> Self {
        let (sender, receiver) = sync_channel::<PrefetchItem>(depth.max(1));

        let handle = std::thread::spawn(move || {
            loop {
                if cancel.is_cancelled() {
                    debug!("Prefetch worker observed cancellation");
                    return;
                }

                let (index, frame) = match reader.read_frame() {
                    Ok(Some(pair)) => pair,
                    Ok(None) => return,
                    Err(e) => {
                        error!("Frame decode failed: {}", e);
                        let _ = sender.send(PrefetchItem::Error(e.to_string()));
                        return;
                    }
                };

                let detections = match detector.detect(&frame.data, frame.width, frame.height) {
                    Ok(d) => d,
                    Err(e) => {
                        error!("Detection failed on frame {}: {}", index, e);
                        let _ = sender.send(PrefetchItem::Error(e.to_string()));
                        return;
                    }
                };

                // Blocks while the tracker is `depth` frames behind
                if sender
                    .send(PrefetchItem::Frame {
                        index,
                        frame,
                        detections,
                    })
                    .is_err()
                {
                    return;
                }
            }
        });

        Self { receiver, handle }
    }

    pub fn join(self) {
        drop(self.receiver);
        let _ = self.handle.join();
    }
}
