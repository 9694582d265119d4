use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::frame::SensorFrame;

/// Approximate encoded size of one frame excluding the device id: 29 keys plus
/// their numeric values and an RFC 3339 timestamp.
const APPROX_FRAME_BYTES: usize = 640;
/// Document root keys, operator name and brackets
const DOCUMENT_OVERHEAD_BYTES: usize = 256;

/// Append-only frame sequence for the active session.
///
/// The tick callback is the only writer. `size` and `estimated_byte_size` read
/// atomic counters so display code never contends with the writer.
#[derive(Clone, Default)]
pub struct SessionBuffer {
    frames: Arc<Mutex<Vec<SensorFrame>>>,
    len: Arc<AtomicUsize>,
    approx_bytes: Arc<AtomicUsize>,
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SensorFrame>> {
        self.frames.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append(&self, frame: SensorFrame) {
        let frame_bytes = APPROX_FRAME_BYTES + frame.device_id.len();
        let mut frames = self.lock();

        if let Some(last) = frames.last() {
            if frame.timestamp < last.timestamp {
                debug!(
                    "frame {} arrived out of order ({} < {})",
                    frames.len(),
                    frame.timestamp,
                    last.timestamp
                );
            }
        }

        frames.push(frame);
        self.len.store(frames.len(), Ordering::Release);
        self.approx_bytes.fetch_add(frame_bytes, Ordering::AcqRel);
    }

    pub fn clear(&self) {
        let mut frames = self.lock();
        frames.clear();
        self.len.store(0, Ordering::Release);
        self.approx_bytes.store(0, Ordering::Release);
    }

    /// Take every buffered frame in append order, leaving the buffer empty.
    ///
    /// Callers stop the ticker first; this is not a synchronization point.
    pub fn snapshot_for_upload(&self) -> Vec<SensorFrame> {
        let mut frames = self.lock();
        self.len.store(0, Ordering::Release);
        self.approx_bytes.store(0, Ordering::Release);
        std::mem::take(&mut *frames)
    }

    pub fn size(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Best-effort estimate of the serialized document size in bytes
    pub fn estimated_byte_size(&self) -> usize {
        match self.approx_bytes.load(Ordering::Acquire) {
            0 => 0,
            bytes => bytes + DOCUMENT_OVERHEAD_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn frame_at(ms: i64) -> SensorFrame {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        SensorFrame::new(t0 + Duration::milliseconds(ms), "device-abc")
    }

    #[test]
    fn test_append_order_is_preserved() {
        let buffer = SessionBuffer::new();
        let stamps = [0, 100, 200, 150, 300];
        for ms in stamps {
            buffer.append(frame_at(ms));
        }

        assert_eq!(buffer.size(), stamps.len());
        let frames = buffer.snapshot_for_upload();
        let got: Vec<_> = frames.iter().map(|f| f.timestamp).collect();
        let want: Vec<_> = stamps.iter().map(|ms| frame_at(*ms).timestamp).collect();
        // the out-of-order stamp is kept where it was appended
        assert_eq!(got, want);
    }

    #[test]
    fn test_snapshot_empties_buffer() {
        let buffer = SessionBuffer::new();
        buffer.append(frame_at(0));
        assert_eq!(buffer.snapshot_for_upload().len(), 1);
        assert!(buffer.is_empty());
        assert_eq!(buffer.estimated_byte_size(), 0);
        assert!(buffer.snapshot_for_upload().is_empty());
    }

    #[test]
    fn test_clear_resets_counters() {
        let buffer = SessionBuffer::new();
        for ms in 0..10 {
            buffer.append(frame_at(ms));
        }
        assert!(buffer.estimated_byte_size() > 10 * APPROX_FRAME_BYTES);

        buffer.clear();
        assert_eq!(buffer.size(), 0);
        assert_eq!(buffer.estimated_byte_size(), 0);
    }

    #[test]
    fn test_estimate_grows_with_frames() {
        let buffer = SessionBuffer::new();
        buffer.append(frame_at(0));
        let one = buffer.estimated_byte_size();
        buffer.append(frame_at(1));
        let two = buffer.estimated_byte_size();
        assert_eq!(two - one, APPROX_FRAME_BYTES + "device-abc".len());
    }
}
