use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Three-axis reading (accelerometer, gyroscope, gravity, ...)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Device attitude in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Attitude {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }
}

/// Position fix from the location provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Ground speed in m/s
    pub speed: f64,
}

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64, speed: f64) -> Self {
        Self {
            latitude,
            longitude,
            speed,
        }
    }
}

/// One delivery from the motion provider: raw sensors plus fused device motion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub accelerometer: Vector3,
    pub gyroscope: Vector3,
    pub magnetometer: Vector3,
    pub attitude: Attitude,
    pub rotation_rate: Vector3,
    pub gravity: Vector3,
    pub user_acceleration: Vector3,
    pub magnetic_field: Vector3,
}

/// One delivery from the location provider
pub type LocationSample = GeoFix;

/// Fused cross-section of every tracked sensor at one tick.
///
/// Sensor fields hold the last value reported by their source, not a value
/// sampled at `timestamp`. Fields whose source never reported stay zeroed and
/// `geo` stays `None` until the first fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    pub geo: Option<GeoFix>,
    pub motion: MotionSample,
}

impl SensorFrame {
    pub fn new(timestamp: DateTime<Utc>, device_id: impl Into<String>) -> Self {
        Self {
            timestamp,
            device_id: device_id.into(),
            geo: None,
            motion: MotionSample::default(),
        }
    }

    pub fn with_geo(mut self, geo: GeoFix) -> Self {
        self.geo = Some(geo);
        self
    }

    pub fn with_motion(mut self, motion: MotionSample) -> Self {
        self.motion = motion;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_magnitude() {
        assert_eq!(Vector3::new(3.0, 4.0, 0.0).magnitude(), 5.0);
    }

    #[test]
    fn test_new_frame_is_zeroed() {
        let frame = SensorFrame::new(Utc::now(), "device-1");
        assert_eq!(frame.device_id, "device-1");
        assert!(frame.geo.is_none());
        assert_eq!(frame.motion, MotionSample::default());
        assert_eq!(frame.motion.gravity, Vector3::default());
    }
}
