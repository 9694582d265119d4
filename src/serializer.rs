//! Wire format for the collector's `/save` endpoint.
//!
//! Every key is spelled out once on [`SessionDocument`] and [`FrameRecord`];
//! adding a field to the data model without mapping it here fails to compile
//! in [`FrameRecord::from_frame`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::{Attitude, GeoFix, MotionSample, SensorFrame, Vector3};
use crate::session::FrozenSession;

#[derive(Error, Debug)]
pub enum SerializeError {
    #[error("frame {frame}: field `{field}` is not finite ({value})")]
    NonFinite {
        frame: usize,
        field: &'static str,
        value: f64,
    },

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// How a frame without a location fix encodes latitude, longitude and speed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoUnset {
    /// Encode as `0`, what the collector has always received
    #[default]
    Zero,
    /// Encode as `null`
    Null,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SerializerConfig {
    #[serde(default)]
    pub geo_unset: GeoUnset,
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    #[serde(rename = "phone_udid")]
    pub device_id: String,
    pub name: String,
    #[serde(rename = "time")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "smooth", with = "flag_as_int")]
    pub smoothing: bool,
    #[serde(rename = "data")]
    pub frames: Vec<FrameRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub time: DateTime<Utc>,
    pub phone_udid: String,

    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub speed: Option<f64>,

    #[serde(rename = "accelerometerX")]
    pub accelerometer_x: f64,
    #[serde(rename = "accelerometerY")]
    pub accelerometer_y: f64,
    #[serde(rename = "accelerometerZ")]
    pub accelerometer_z: f64,

    #[serde(rename = "gyroscopeX")]
    pub gyroscope_x: f64,
    #[serde(rename = "gyroscopeY")]
    pub gyroscope_y: f64,
    #[serde(rename = "gyroscopeZ")]
    pub gyroscope_z: f64,

    #[serde(rename = "magnetometerX")]
    pub magnetometer_x: f64,
    #[serde(rename = "magnetometerY")]
    pub magnetometer_y: f64,
    #[serde(rename = "magnetometerZ")]
    pub magnetometer_z: f64,

    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,

    #[serde(rename = "rotationX")]
    pub rotation_x: f64,
    #[serde(rename = "rotationY")]
    pub rotation_y: f64,
    #[serde(rename = "rotationZ")]
    pub rotation_z: f64,

    #[serde(rename = "gravityX")]
    pub gravity_x: f64,
    #[serde(rename = "gravityY")]
    pub gravity_y: f64,
    #[serde(rename = "gravityZ")]
    pub gravity_z: f64,

    #[serde(rename = "userAccelerationX")]
    pub user_acceleration_x: f64,
    #[serde(rename = "userAccelerationY")]
    pub user_acceleration_y: f64,
    #[serde(rename = "userAccelerationZ")]
    pub user_acceleration_z: f64,

    #[serde(rename = "magneticFieldX")]
    pub magnetic_field_x: f64,
    #[serde(rename = "magneticFieldY")]
    pub magnetic_field_y: f64,
    #[serde(rename = "magneticFieldZ")]
    pub magnetic_field_z: f64,
}

impl FrameRecord {
    pub fn from_frame(frame: &SensorFrame, geo_unset: GeoUnset) -> Self {
        let unset = match geo_unset {
            GeoUnset::Zero => Some(0.0),
            GeoUnset::Null => None,
        };
        let SensorFrame {
            timestamp,
            device_id,
            geo,
            motion,
        } = frame;
        let (latitude, longitude, speed) = match *geo {
            Some(GeoFix {
                latitude,
                longitude,
                speed,
            }) => (Some(latitude), Some(longitude), Some(speed)),
            None => (unset, unset, unset),
        };

        let MotionSample {
            accelerometer,
            gyroscope,
            magnetometer,
            attitude,
            rotation_rate,
            gravity,
            user_acceleration,
            magnetic_field,
        } = *motion;

        FrameRecord {
            time: *timestamp,
            phone_udid: device_id.clone(),
            longitude,
            latitude,
            speed,
            accelerometer_x: accelerometer.x,
            accelerometer_y: accelerometer.y,
            accelerometer_z: accelerometer.z,
            gyroscope_x: gyroscope.x,
            gyroscope_y: gyroscope.y,
            gyroscope_z: gyroscope.z,
            magnetometer_x: magnetometer.x,
            magnetometer_y: magnetometer.y,
            magnetometer_z: magnetometer.z,
            roll: attitude.roll,
            pitch: attitude.pitch,
            yaw: attitude.yaw,
            rotation_x: rotation_rate.x,
            rotation_y: rotation_rate.y,
            rotation_z: rotation_rate.z,
            gravity_x: gravity.x,
            gravity_y: gravity.y,
            gravity_z: gravity.z,
            user_acceleration_x: user_acceleration.x,
            user_acceleration_y: user_acceleration.y,
            user_acceleration_z: user_acceleration.z,
            magnetic_field_x: magnetic_field.x,
            magnetic_field_y: magnetic_field.y,
            magnetic_field_z: magnetic_field.z,
        }
    }

    /// Back to the in-memory model, reading geo with the policy the record
    /// was written under.
    ///
    /// Under [`GeoUnset::Zero`] a record with latitude, longitude and speed
    /// all zero decodes as "no fix": the encoding cannot tell a missing fix
    /// from a stationary fix at (0, 0). Otherwise a record with any geo key
    /// present has a fix and missing keys default to zero.
    pub fn to_frame(&self, geo_unset: GeoUnset) -> SensorFrame {
        let geo = match (self.latitude, self.longitude, self.speed) {
            (None, None, None) => None,
            (Some(lat), Some(lon), Some(speed))
                if geo_unset == GeoUnset::Zero && lat == 0.0 && lon == 0.0 && speed == 0.0 =>
            {
                None
            }
            (lat, lon, speed) => Some(GeoFix::new(
                lat.unwrap_or_default(),
                lon.unwrap_or_default(),
                speed.unwrap_or_default(),
            )),
        };

        SensorFrame {
            timestamp: self.time,
            device_id: self.phone_udid.clone(),
            geo,
            motion: MotionSample {
                accelerometer: Vector3::new(
                    self.accelerometer_x,
                    self.accelerometer_y,
                    self.accelerometer_z,
                ),
                gyroscope: Vector3::new(self.gyroscope_x, self.gyroscope_y, self.gyroscope_z),
                magnetometer: Vector3::new(
                    self.magnetometer_x,
                    self.magnetometer_y,
                    self.magnetometer_z,
                ),
                attitude: Attitude::new(self.roll, self.pitch, self.yaw),
                rotation_rate: Vector3::new(self.rotation_x, self.rotation_y, self.rotation_z),
                gravity: Vector3::new(self.gravity_x, self.gravity_y, self.gravity_z),
                user_acceleration: Vector3::new(
                    self.user_acceleration_x,
                    self.user_acceleration_y,
                    self.user_acceleration_z,
                ),
                magnetic_field: Vector3::new(
                    self.magnetic_field_x,
                    self.magnetic_field_y,
                    self.magnetic_field_z,
                ),
            },
        }
    }

    fn numeric_fields(&self) -> [(&'static str, Option<f64>); 27] {
        [
            ("longitude", self.longitude),
            ("latitude", self.latitude),
            ("speed", self.speed),
            ("accelerometerX", Some(self.accelerometer_x)),
            ("accelerometerY", Some(self.accelerometer_y)),
            ("accelerometerZ", Some(self.accelerometer_z)),
            ("gyroscopeX", Some(self.gyroscope_x)),
            ("gyroscopeY", Some(self.gyroscope_y)),
            ("gyroscopeZ", Some(self.gyroscope_z)),
            ("magnetometerX", Some(self.magnetometer_x)),
            ("magnetometerY", Some(self.magnetometer_y)),
            ("magnetometerZ", Some(self.magnetometer_z)),
            ("roll", Some(self.roll)),
            ("pitch", Some(self.pitch)),
            ("yaw", Some(self.yaw)),
            ("rotationX", Some(self.rotation_x)),
            ("rotationY", Some(self.rotation_y)),
            ("rotationZ", Some(self.rotation_z)),
            ("gravityX", Some(self.gravity_x)),
            ("gravityY", Some(self.gravity_y)),
            ("gravityZ", Some(self.gravity_z)),
            ("userAccelerationX", Some(self.user_acceleration_x)),
            ("userAccelerationY", Some(self.user_acceleration_y)),
            ("userAccelerationZ", Some(self.user_acceleration_z)),
            ("magneticFieldX", Some(self.magnetic_field_x)),
            ("magneticFieldY", Some(self.magnetic_field_y)),
            ("magneticFieldZ", Some(self.magnetic_field_z)),
        ]
    }

    // serde_json would quietly write NaN and infinities as `null`.
    fn check_finite(&self, index: usize) -> Result<(), SerializeError> {
        for (field, value) in self.numeric_fields() {
            if let Some(value) = value.filter(|v| !v.is_finite()) {
                return Err(SerializeError::NonFinite {
                    frame: index,
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

impl SessionDocument {
    pub fn frames(&self, geo_unset: GeoUnset) -> Vec<SensorFrame> {
        self.frames
            .iter()
            .map(|record| record.to_frame(geo_unset))
            .collect()
    }
}

/// Build the upload document, rejecting any non-finite reading.
pub fn to_document(
    session: &FrozenSession,
    geo_unset: GeoUnset,
) -> Result<SessionDocument, SerializeError> {
    let frames = session
        .frames
        .iter()
        .enumerate()
        .map(|(index, frame)| {
            let record = FrameRecord::from_frame(frame, geo_unset);
            record.check_finite(index)?;
            Ok(record)
        })
        .collect::<Result<Vec<_>, SerializeError>>()?;

    let meta = &session.metadata;
    Ok(SessionDocument {
        device_id: meta.device_id.clone(),
        name: meta.name.clone(),
        started_at: meta.started_at,
        smoothing: meta.smoothing,
        frames,
    })
}

pub fn to_json(session: &FrozenSession, cfg: &SerializerConfig) -> Result<Vec<u8>, SerializeError> {
    let document = to_document(session, cfg.geo_unset)?;
    let bytes = if cfg.pretty {
        serde_json::to_vec_pretty(&document)?
    } else {
        serde_json::to_vec(&document)?
    };
    Ok(bytes)
}

pub fn from_json(bytes: &[u8]) -> Result<SessionDocument, SerializeError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// The collector stores the smoothing switch as an integer.
mod flag_as_int {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*flag))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(u8::deserialize(deserializer)? != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::session::SessionMetadata;
    use chrono::TimeZone;
    use rand::{Rng, SeedableRng};

    fn metadata() -> SessionMetadata {
        let mut meta = SessionMetadata::new(&Identity::new("ABC-123", "tester"), true);
        meta.started_at = Utc.with_ymd_and_hms(2017, 1, 23, 8, 30, 0).unwrap();
        meta
    }

    fn random_vector(rng: &mut impl Rng) -> Vector3 {
        Vector3::new(
            rng.gen_range(-20.0..20.0),
            rng.gen_range(-20.0..20.0),
            rng.gen_range(-20.0..20.0),
        )
    }

    fn synthetic_frames(n: usize) -> Vec<SensorFrame> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let t0 = metadata().started_at;
        (0..n)
            .map(|i| {
                let frame = SensorFrame::new(
                    t0 + chrono::Duration::microseconds(100_123 * i as i64),
                    "ABC-123",
                )
                .with_motion(MotionSample {
                    accelerometer: random_vector(&mut rng),
                    gyroscope: random_vector(&mut rng),
                    magnetometer: random_vector(&mut rng),
                    attitude: Attitude::new(rng.gen(), rng.gen(), rng.gen()),
                    rotation_rate: random_vector(&mut rng),
                    gravity: random_vector(&mut rng),
                    user_acceleration: random_vector(&mut rng),
                    magnetic_field: random_vector(&mut rng),
                });
                if i % 3 == 0 {
                    frame
                } else {
                    frame.with_geo(GeoFix::new(
                        rng.gen_range(-90.0..90.0),
                        rng.gen_range(-180.0..180.0),
                        rng.gen_range(0.0..40.0),
                    ))
                }
            })
            .collect()
    }

    #[test]
    fn test_empty_session_is_valid_document() {
        let session = FrozenSession::new(metadata(), Vec::new());
        let bytes = to_json(&session, &SerializerConfig::default()).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["phone_udid"], "ABC-123");
        assert_eq!(value["name"], "tester");
        assert_eq!(value["smooth"], 1);
        assert_eq!(value["data"], serde_json::json!([]));
    }

    #[test]
    fn test_frame_keys_and_number_types() {
        let frame = SensorFrame::new(metadata().started_at, "ABC-123").with_motion(MotionSample {
            accelerometer: Vector3::new(0.5, -0.25, 1.0),
            ..MotionSample::default()
        });
        let session = FrozenSession::new(metadata(), vec![frame]);
        let bytes = to_json(&session, &SerializerConfig::default()).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let record = value["data"][0].as_object().unwrap();
        assert_eq!(record.len(), 29);
        assert_eq!(record["accelerometerY"], serde_json::json!(-0.25));
        assert!(record["magneticFieldZ"].is_number());
        assert!(record["time"].is_string());
        // no fix yet: zero, matching what the collector already receives
        assert_eq!(record["latitude"], serde_json::json!(0.0));
        assert_eq!(record["speed"], serde_json::json!(0.0));
    }

    #[test]
    fn test_null_policy_marks_missing_fix() {
        let frame = SensorFrame::new(metadata().started_at, "ABC-123");
        let session = FrozenSession::new(metadata(), vec![frame.clone()]);
        let cfg = SerializerConfig {
            geo_unset: GeoUnset::Null,
            pretty: false,
        };

        let bytes = to_json(&session, &cfg).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value["data"][0]["longitude"].is_null());

        let back = from_json(&bytes).unwrap().frames(GeoUnset::Null);
        assert_eq!(back, vec![frame]);
    }

    #[test]
    fn test_round_trip_is_exact() {
        let frames = synthetic_frames(250);
        let session = FrozenSession::new(metadata(), frames.clone());

        for pretty in [false, true] {
            let cfg = SerializerConfig {
                geo_unset: GeoUnset::Null,
                pretty,
            };
            let bytes = to_json(&session, &cfg).unwrap();
            let document = from_json(&bytes).unwrap();

            assert_eq!(document.device_id, "ABC-123");
            assert_eq!(document.started_at, session.metadata.started_at);
            assert!(document.smoothing);
            assert_eq!(document.frames(GeoUnset::Null), frames);
        }
    }

    #[test]
    fn test_round_trip_under_default_policy() {
        let frames = synthetic_frames(30);
        let session = FrozenSession::new(metadata(), frames.clone());
        let cfg = SerializerConfig::default();

        let bytes = to_json(&session, &cfg).unwrap();
        let back = from_json(&bytes).unwrap().frames(cfg.geo_unset);

        // every third frame has no fix and is written as zeros
        assert!(frames.iter().any(|f| f.geo.is_none()));
        assert_eq!(back, frames);
    }

    #[test]
    fn test_zero_policy_cannot_keep_fix_at_origin() {
        let frame = SensorFrame::new(metadata().started_at, "ABC-123")
            .with_geo(GeoFix::new(0.0, 0.0, 0.0));
        let session = FrozenSession::new(metadata(), vec![frame.clone()]);

        let bytes = to_json(&session, &SerializerConfig::default()).unwrap();
        let back = from_json(&bytes).unwrap().frames(GeoUnset::Zero);
        assert_eq!(back[0].geo, None);
        assert_eq!(back[0].geo.unwrap_or_default(), frame.geo.unwrap_or_default());
        assert_eq!(back[0].motion, frame.motion);

        let null = SerializerConfig {
            geo_unset: GeoUnset::Null,
            pretty: false,
        };
        let bytes = to_json(&session, &null).unwrap();
        assert_eq!(from_json(&bytes).unwrap().frames(GeoUnset::Null), vec![frame]);
    }

    #[test]
    fn test_non_finite_value_names_field() {
        let mut frames = synthetic_frames(4);
        frames[2].motion.gravity.y = f64::NAN;
        let session = FrozenSession::new(metadata(), frames);

        match to_json(&session, &SerializerConfig::default()) {
            Err(SerializeError::NonFinite { frame, field, .. }) => {
                assert_eq!(frame, 2);
                assert_eq!(field, "gravityY");
            }
            other => panic!("expected NonFinite, got {other:?}"),
        }
    }

    #[test]
    fn test_infinite_speed_is_rejected() {
        let frame = SensorFrame::new(metadata().started_at, "ABC-123")
            .with_geo(GeoFix::new(1.0, 2.0, f64::INFINITY));
        let session = FrozenSession::new(metadata(), vec![frame]);
        assert!(matches!(
            to_document(&session, GeoUnset::Zero),
            Err(SerializeError::NonFinite { field: "speed", .. })
        ));
    }
}
