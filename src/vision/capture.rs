//! Frames and the queues that carry them
//!
//! The capture source (screen grab, upload, file) is outside the pipeline: it
//! decodes an image, wraps it in a [`Frame`] and pushes it into a
//! [`FrameQueue`]. The scheduler worker is the only consumer.

use image::{DynamicImage, GenericImageView};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::{now_ms, Region};
use crate::Result;

/// A decoded frame and its capture time
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<DynamicImage>,
    timestamp_ms: u64,
}

impl Frame {
    /// Wrap an image, stamped with the current time
    pub fn new(image: DynamicImage) -> Self {
        Self::with_timestamp(image, now_ms())
    }

    pub fn with_timestamp(image: DynamicImage, timestamp_ms: u64) -> Self {
        Self {
            image: Arc::new(image),
            timestamp_ms,
        }
    }

    /// Decode an encoded image (PNG, JPEG, ...) into a frame
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(decode_image(bytes)?))
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Crop to `region`, clamped to the frame. `None` if nothing remains.
    pub fn crop(&self, region: &Region) -> Option<DynamicImage> {
        crop_region(&self.image, region)
    }
}

/// Decode an encoded image
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory(bytes)?)
}

/// Crop `region` out of `img`, clamped to its bounds
pub fn crop_region(img: &DynamicImage, region: &Region) -> Option<DynamicImage> {
    let (w, h) = img.dimensions();
    let r = region.clamped(w, h)?;
    Some(img.crop_imm(r.left, r.top, r.width, r.height))
}

/// Whether two images differ by more than `1 - similarity`.
///
/// The difference is the mean absolute RGB difference normalised to [0, 1].
/// Images of different sizes always differ.
pub fn frames_differ(a: &DynamicImage, b: &DynamicImage, similarity: f64) -> bool {
    if a.dimensions() != b.dimensions() {
        return true;
    }
    let a = a.to_rgb8();
    let b = b.to_rgb8();
    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw().iter())
        .map(|(x, y)| x.abs_diff(*y) as u64)
        .sum();
    let max = a.as_raw().len() as f64 * 255.0;
    if max == 0.0 {
        return false;
    }
    total as f64 / max > 1.0 - similarity
}

struct QueueInner {
    frames: Mutex<VecDeque<Frame>>,
    capacity: usize,
    dropped: AtomicU64,
}

/// Bounded, non-blocking FIFO from the capture source to the scheduler.
///
/// Cloning yields another handle to the same queue. When full, pushing
/// evicts the oldest queued frame.
#[derive(Clone)]
pub struct FrameQueue {
    inner: Arc<QueueInner>,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(QueueInner {
                frames: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Append a frame. Returns `false` if an older frame had to be evicted.
    pub fn push(&self, frame: Frame) -> bool {
        let mut frames = self.inner.frames.lock();
        let mut accepted_cleanly = true;
        while frames.len() >= self.inner.capacity {
            frames.pop_front();
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            accepted_cleanly = false;
        }
        frames.push_back(frame);
        accepted_cleanly
    }

    /// Take every queued frame, oldest first
    pub fn drain(&self) -> Vec<Frame> {
        self.inner.frames.lock().drain(..).collect()
    }

    /// Put unprocessed frames back in front of anything queued since
    pub(crate) fn requeue_front(&self, unprocessed: Vec<Frame>) {
        if unprocessed.is_empty() {
            return;
        }
        let mut frames = self.inner.frames.lock();
        for frame in unprocessed.into_iter().rev() {
            frames.push_front(frame);
        }
        while frames.len() > self.inner.capacity {
            frames.pop_front();
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.frames.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Frames evicted so far
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

/// The last few raw frames, kept for re-analysis and debugging
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    frames: VecDeque<Frame>,
    capacity: usize,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, frame: Frame) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    pub fn latest(&self) -> Option<&Frame> {
        self.frames.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RegionKind;
    use image::RgbImage;

    fn solid(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([value; 3])))
    }

    fn frame(ts: u64) -> Frame {
        Frame::with_timestamp(solid(4, 4, 0), ts)
    }

    #[test]
    fn test_queue_fifo() {
        let queue = FrameQueue::new(8);
        for ts in 1..=3 {
            assert!(queue.push(frame(ts)));
        }
        let drained: Vec<u64> = queue.drain().iter().map(Frame::timestamp_ms).collect();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_evicts_oldest() {
        let queue = FrameQueue::new(2);
        queue.push(frame(1));
        queue.push(frame(2));
        assert!(!queue.push(frame(3)));
        assert_eq!(queue.dropped(), 1);
        let drained: Vec<u64> = queue.drain().iter().map(Frame::timestamp_ms).collect();
        assert_eq!(drained, vec![2, 3]);
    }

    #[test]
    fn test_requeue_front_keeps_order() {
        let queue = FrameQueue::new(8);
        queue.push(frame(3));
        queue.requeue_front(vec![frame(1), frame(2)]);
        let drained: Vec<u64> = queue.drain().iter().map(Frame::timestamp_ms).collect();
        assert_eq!(drained, vec![1, 2, 3]);
    }

    #[test]
    fn test_clone_shares_queue() {
        let queue = FrameQueue::new(4);
        let producer = queue.clone();
        producer.push(frame(1));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_frame_buffer_bounded() {
        let mut buffer = FrameBuffer::new(5);
        for ts in 0..8 {
            buffer.push(frame(ts));
        }
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.latest().unwrap().timestamp_ms(), 7);
        assert_eq!(buffer.iter().next().unwrap().timestamp_ms(), 3);
    }

    #[test]
    fn test_crop_clamps() {
        let img = solid(100, 50, 10);
        let region = Region::new("pot", 40, 90, 30, 30, RegionKind::Numeric);
        let cropped = crop_region(&img, &region).unwrap();
        assert_eq!(cropped.dimensions(), (10, 10));

        let outside = Region::new("pot", 60, 0, 10, 10, RegionKind::Numeric);
        assert!(crop_region(&img, &outside).is_none());
    }

    #[test]
    fn test_frames_differ() {
        let dark = solid(10, 10, 0);
        let nearly_dark = solid(10, 10, 5);
        let bright = solid(10, 10, 200);
        assert!(!frames_differ(&dark, &dark, 0.95));
        assert!(!frames_differ(&dark, &nearly_dark, 0.95));
        assert!(frames_differ(&dark, &bright, 0.95));
        assert!(frames_differ(&dark, &solid(5, 10, 0), 0.95));
    }

    #[test]
    fn test_decode_failure() {
        assert!(Frame::from_bytes(b"not an image").is_err());
    }
}
