use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::aggregator::SampleAggregator;
use crate::config::SimulatorConfig;
use crate::error::{RecorderError, Result};
use crate::frame::{Attitude, GeoFix, MotionSample, Vector3};

const STANDARD_GRAVITY_G: f64 = 1.0;
// ~1.1e-5 degrees of latitude per metre
const DEGREES_PER_METRE: f64 = 1.0 / 111_320.0;

/// Synthetic motion and location providers for running without device sensors.
///
/// Simulates a car driving north at a slowly varying speed with noisy
/// accelerometer readings. Both feeds run until `cancel_token` fires.
/// Rates that do not map to a schedulable period are rejected.
pub fn spawn_sources(
    aggregator: SampleAggregator,
    cfg: &SimulatorConfig,
    cancel_token: CancellationToken,
) -> Result<JoinHandle<()>> {
    let motion_period = cfg
        .motion_period()
        .map_err(|e| RecorderError::Config(e.to_string()))?;
    let location_period = cfg
        .location_period()
        .map_err(|e| RecorderError::Config(e.to_string()))?;

    Ok(tokio::spawn(async move {
        tracing::info!(
            "starting simulated sensors (motion every {:?}, location every {:?})",
            motion_period,
            location_period
        );

        let mut motion_ticker = tokio::time::interval(motion_period);
        motion_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut location_ticker = tokio::time::interval(location_period);
        location_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut rng = rand::rngs::StdRng::from_entropy();
        let mut drive = SimulatedDrive::new(59.3293, 18.0686);
        let mut motion_count = 0u64;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = motion_ticker.tick() => {
                    aggregator.update_motion(drive.motion(&mut rng));
                    motion_count += 1;
                    if motion_count % 100 == 0 {
                        tracing::debug!("simulator: {} motion samples", motion_count);
                    }
                }
                _ = location_ticker.tick() => {
                    let fix = drive.advance(location_period.as_secs_f64(), &mut rng);
                    aggregator.update_location(fix);
                }
            }
        }

        tracing::info!("simulated sensors stopped after {} motion samples", motion_count);
    }))
}

struct SimulatedDrive {
    latitude: f64,
    longitude: f64,
    speed: f64,
    heading: f64,
}

impl SimulatedDrive {
    fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            speed: 0.0,
            heading: 0.0,
        }
    }

    fn advance(&mut self, dt: f64, rng: &mut impl Rng) -> GeoFix {
        self.speed = (self.speed + rng.gen_range(-0.5..1.0)).clamp(0.0, 30.0);
        self.heading += rng.gen_range(-0.05..0.05);

        let distance = self.speed * dt;
        self.latitude += distance * self.heading.cos() * DEGREES_PER_METRE;
        self.longitude += distance * self.heading.sin() * DEGREES_PER_METRE
            / self.latitude.to_radians().cos();

        GeoFix::new(self.latitude, self.longitude, self.speed)
    }

    fn motion(&self, rng: &mut impl Rng) -> MotionSample {
        let mut noise = || rng.gen_range(-0.02..0.02);
        let user_acceleration = Vector3::new(noise(), noise(), noise());
        let gravity = Vector3::new(0.0, 0.0, -STANDARD_GRAVITY_G);
        let rotation_rate = Vector3::new(noise(), noise(), noise());

        MotionSample {
            accelerometer: Vector3::new(
                gravity.x + user_acceleration.x,
                gravity.y + user_acceleration.y,
                gravity.z + user_acceleration.z,
            ),
            gyroscope: rotation_rate,
            magnetometer: Vector3::new(18.0 + noise(), -4.0 + noise(), -48.0 + noise()),
            attitude: Attitude::new(noise(), noise(), self.heading),
            rotation_rate,
            gravity,
            user_acceleration,
            magnetic_field: Vector3::new(15.0 + noise(), -2.0 + noise(), -45.0 + noise()),
        }
    }
}
