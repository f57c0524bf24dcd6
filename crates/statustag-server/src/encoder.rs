//! Bounded worker pool for patch list builds.
//!
//! Encoding is CPU-bound, so builds run on the blocking thread pool behind a
//! semaphore. Heartbeats and pulls for other devices keep flowing while a
//! large GIF is being decoded.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use statustag_core::{AnimatedStrategy, DisplayTarget, PatchList, SourceImage, StreamError};
use statustag_imaging::build_patch_list;
use tokio::sync::Semaphore;
use tracing::{debug, error};

use crate::metrics::{PATCH_LIST_BUILD_SECONDS, PATCH_LIST_FAILURES_TOTAL, PATCH_LISTS_BUILT_TOTAL};

/// Shared handle to the encoder workers.
#[derive(Clone, Debug)]
pub struct EncoderPool {
    permits: Arc<Semaphore>,
    strategy: AnimatedStrategy,
}

impl EncoderPool {
    /// Pool running at most `workers` builds at once.
    pub fn new(workers: usize, strategy: AnimatedStrategy) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            strategy,
        }
    }

    /// Animated strategy applied to every build.
    pub fn strategy(&self) -> AnimatedStrategy {
        self.strategy
    }

    /// Free worker slots.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Build the patch list for `image` on `target`.
    ///
    /// Decode errors come back as [`StreamError::DecodeFailure`].
    pub async fn build(
        &self,
        image: SourceImage,
        target: DisplayTarget,
    ) -> Result<PatchList, StreamError> {
        let identity = image.identity.clone();
        let format = image.format;
        let strategy = self.strategy;

        let _permit = self.permits.clone().acquire_owned().await.map_err(|_| {
            StreamError::DecodeFailure {
                identity: identity.clone(),
                reason: "encoder pool closed".into(),
            }
        })?;

        let started = Instant::now();
        let joined =
            tokio::task::spawn_blocking(move || build_patch_list(&image, &target, strategy)).await;
        histogram!(PATCH_LIST_BUILD_SECONDS).record(started.elapsed().as_secs_f64());

        let result = match joined {
            Ok(built) => built.map_err(|e| e.into_stream_error(&identity)),
            Err(join_error) => {
                error!(identity = %identity, error = %join_error, "encoder worker failed");
                Err(StreamError::DecodeFailure {
                    identity: identity.clone(),
                    reason: format!("encoder worker failed: {join_error}"),
                })
            }
        };

        match &result {
            Ok(list) => {
                counter!(PATCH_LISTS_BUILT_TOTAL, "kind" => format.as_str()).increment(1);
                debug!(
                    identity = %identity,
                    patches = list.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "encoder finished"
                );
            }
            Err(_) => counter!(PATCH_LIST_FAILURES_TOTAL).increment(1),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use assert_matches::assert_matches;
    use image::{ImageFormat as Codec, Rgb, RgbImage};
    use statustag_core::{Patch, PatchKind};

    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([0, 0, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, Codec::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn builds_raster_list_off_thread() {
        let pool = EncoderPool::new(2, AnimatedStrategy::Frames);
        let image = SourceImage::sniffed("A1", png(20, 10));
        let target = DisplayTarget::new("dev1", 10, 5).with_buffer_size(30);

        let list = pool.build(image, target).await.unwrap();
        assert_eq!(list.identity().as_str(), "A1");
        assert_eq!(list.dimensions(), (10, 5));
        assert_eq!(list.count_of(PatchKind::Pixels), list.len());
        let rows: u16 = list
            .iter()
            .map(|p| match p {
                Patch::Pixels(band) => band.rows,
                _ => 0,
            })
            .sum();
        assert_eq!(rows, 5);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn decode_failure_is_reported() {
        let pool = EncoderPool::new(1, AnimatedStrategy::Frames);
        let image = SourceImage::sniffed("bad", b"not an image".to_vec());
        let target = DisplayTarget::new("dev1", 10, 5);

        let err = pool.build(image, target).await.unwrap_err();
        assert_matches!(err, StreamError::DecodeFailure { ref identity, .. } if identity.as_str() == "bad");
        assert!(!err.closes_session());
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn zero_workers_still_admits_one() {
        let pool = EncoderPool::new(0, AnimatedStrategy::Passthrough);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.strategy(), AnimatedStrategy::Passthrough);
    }
}
