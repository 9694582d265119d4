use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::frame::{GeoFix, LocationSample, MotionSample, SensorFrame, Vector3};

#[derive(Debug, Default)]
struct Latest {
    device_id: String,
    geo: Option<GeoFix>,
    motion: MotionSample,
    motion_updates: u64,
    location_updates: u64,
}

/// Latest-value store for every sensor source.
///
/// Sources push at their own rate; the ticker pulls one fused frame per tick
/// with [`SampleAggregator::snapshot`]. Cloning yields another handle to the
/// same state so provider callbacks can live on other threads.
#[derive(Clone)]
pub struct SampleAggregator {
    latest: Arc<Mutex<Latest>>,
}

impl SampleAggregator {
    pub fn new(device_id: impl Into<String>) -> Self {
        let latest = Latest {
            device_id: device_id.into(),
            ..Latest::default()
        };
        SampleAggregator {
            latest: Arc::new(Mutex::new(latest)),
        }
    }

    pub fn device_id(&self) -> String {
        self.lock().device_id.clone()
    }

    // Held values are plain copies, so a poisoned lock still holds a usable state.
    fn lock(&self) -> MutexGuard<'_, Latest> {
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Overwrite every motion-derived field.
    pub fn update_motion(&self, sample: MotionSample) {
        let mut latest = self.lock();
        latest.motion = sample;
        latest.motion_updates += 1;
    }

    /// Overwrite only the raw accelerometer, for providers that poll it separately.
    pub fn update_accelerometer(&self, value: Vector3) {
        let mut latest = self.lock();
        latest.motion.accelerometer = value;
        latest.motion_updates += 1;
    }

    pub fn update_gyroscope(&self, value: Vector3) {
        let mut latest = self.lock();
        latest.motion.gyroscope = value;
        latest.motion_updates += 1;
    }

    pub fn update_magnetometer(&self, value: Vector3) {
        let mut latest = self.lock();
        latest.motion.magnetometer = value;
        latest.motion_updates += 1;
    }

    pub fn update_location(&self, sample: LocationSample) {
        let mut latest = self.lock();
        latest.geo = Some(sample);
        latest.location_updates += 1;
    }

    /// Fused frame of the current held values stamped with `timestamp`.
    pub fn snapshot(&self, timestamp: DateTime<Utc>) -> SensorFrame {
        let latest = self.lock();
        SensorFrame {
            timestamp,
            device_id: latest.device_id.clone(),
            geo: latest.geo,
            motion: latest.motion,
        }
    }

    pub fn latest(&self) -> SensorFrame {
        self.snapshot(Utc::now())
    }

    /// Forget every held value and stamp future frames with `device_id`.
    /// Called when a new session starts.
    pub fn reset(&self, device_id: &str) {
        *self.lock() = Latest {
            device_id: device_id.to_string(),
            ..Latest::default()
        };
    }

    /// (motion, location) update counts since the last reset
    pub fn update_counts(&self) -> (u64, u64) {
        let latest = self.lock();
        (latest.motion_updates, latest.location_updates)
    }
}
