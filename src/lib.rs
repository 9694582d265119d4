//! Sensor sampling and batch upload pipeline.
//!
//! Independent motion and location sources push into a [`SampleAggregator`];
//! a fixed-period [`Ticker`] fuses the latest values into one [`SensorFrame`]
//! per tick and appends it to the session's [`SessionBuffer`]. When the
//! [`Recorder`] stops, the session is serialized to JSON and POSTed once to
//! the collector.

pub mod aggregator;
pub mod buffer;
pub mod config;
pub mod error;
pub mod frame;
pub mod identity;
pub mod recorder;
pub mod serializer;
pub mod session;
pub mod simulator;
pub mod ticker;
pub mod uploader;

pub use aggregator::SampleAggregator;
pub use buffer::SessionBuffer;
pub use config::AppConfig;
pub use error::{RecorderError, Result};
pub use frame::{Attitude, GeoFix, LocationSample, MotionSample, SensorFrame, Vector3};
pub use identity::Identity;
pub use recorder::{Recorder, UploadStatus};
pub use serializer::{GeoUnset, SerializeError, SerializerConfig, SessionDocument};
pub use session::{FrozenSession, SessionMetadata, SessionState};
pub use ticker::Ticker;
pub use uploader::{UploadOutcome, Uploader};
