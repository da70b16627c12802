use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use crate::media::MediaBackend;
use crate::request::{RequestToken, RequestTracker};
use crate::slots::{LoadedSource, SlotContent};
use crate::types::SourceDescriptor;

const READY_POLL: Duration = Duration::from_millis(10);

/// Loads slot content off the render thread. Images resolve once decoded,
/// videos once their first frame is available.
pub struct SourceLoader {
    media: Arc<dyn MediaBackend>,
    tracker: RequestTracker,
    tx: Sender<LoadedSource>,
    rx: Receiver<LoadedSource>,
}

impl SourceLoader {
    pub fn new(media: Arc<dyn MediaBackend>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            media,
            tracker: RequestTracker::new(),
            tx,
            rx,
        }
    }

    pub fn request(&mut self, source: SourceDescriptor, now: Instant) -> u64 {
        let token = self.tracker.issue(now);
        let generation = token.generation();
        let media = Arc::clone(&self.media);
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name("moodwall-load".into())
            .spawn(move || run_load(media.as_ref(), source, token, tx));
        if let Err(err) = spawned {
            debug!(generation, error = %err, "failed to spawn load worker");
        }
        generation
    }

    /// The newest load that is still current. Superseded loads are dropped,
    /// which stops any video they opened.
    pub fn poll(&mut self) -> Option<LoadedSource> {
        let mut newest = None;
        while let Ok(loaded) = self.rx.try_recv() {
            if self.tracker.accepts(loaded.generation) {
                self.tracker.settle(loaded.generation);
                newest = Some(loaded);
            } else {
                debug!(
                    generation = loaded.generation,
                    source = %loaded.source,
                    "discarding superseded load"
                );
                loaded.release();
            }
        }
        newest
    }

    pub fn is_pending(&self) -> bool {
        self.tracker.is_pending()
    }

    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Option<u64> {
        self.tracker.expire(now, timeout)
    }

    pub fn cancel(&mut self) {
        self.tracker.cancel_all();
        while let Ok(loaded) = self.rx.try_recv() {
            loaded.release();
        }
    }
}

fn run_load(
    media: &dyn MediaBackend,
    source: SourceDescriptor,
    token: RequestToken,
    tx: Sender<LoadedSource>,
) {
    let content = if source.is_video {
        match media.open_video(&source.url) {
            Ok(mut feed) => {
                while !feed.is_ready() {
                    if token.is_cancelled() || feed.has_ended() {
                        debug!(source = %source, "video never became ready");
                        feed.stop();
                        return;
                    }
                    thread::sleep(READY_POLL);
                }
                SlotContent::Video(feed)
            }
            Err(err) => {
                debug!(source = %source, error = %err, "failed to open video");
                return;
            }
        }
    } else {
        match media.load_image(&source.url) {
            Ok(image) => SlotContent::Still(image),
            Err(err) => {
                debug!(source = %source, error = %err, "failed to load image");
                return;
            }
        }
    };

    let loaded = LoadedSource {
        generation: token.generation(),
        source,
        content,
    };
    if token.is_cancelled() {
        loaded.release();
        return;
    }
    if let Err(err) = tx.send(loaded) {
        err.into_inner().release();
    }
}
