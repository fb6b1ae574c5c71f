//! The GPS Oracle - ground truth and noisy fixes for live-mode runs.
//!
//! The oracle knows where the player really is (a replayed trajectory)
//! and plays the part of the phone's GPS: every step it perturbs the true
//! position with seeded Gaussian noise and pushes the result into the
//! live feed, occasionally dropping a fix the way a real receiver does.
//!
//! Same seed + same trajectory = same fixes.

use ghostlap_core::{ReplaySource, TrajectoryStore};
use ghostlap_env::{EnvError, Fix, LiveFeedSender, PositionSource};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::sync::Arc;
use std::time::Duration;

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Noise model for simulated fixes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsNoise {
    /// Horizontal position noise standard deviation (meters)
    pub position_std_m: f64,

    /// Heading noise standard deviation (degrees)
    pub heading_std_deg: f64,

    /// Probability that a step publishes nothing
    pub dropout_rate: f64,
}

impl Default for GpsNoise {
    fn default() -> Self {
        Self {
            position_std_m: 2.0,
            heading_std_deg: 3.0,
            dropout_rate: 0.0,
        }
    }
}

impl GpsNoise {
    /// Perfect receiver: no noise, no dropouts.
    pub fn none() -> Self {
        Self {
            position_std_m: 0.0,
            heading_std_deg: 0.0,
            dropout_rate: 0.0,
        }
    }
}

/// Simulated GPS receiver feeding a [`LiveFeedSender`].
pub struct GpsOracle {
    /// Ground truth for the player
    truth: ReplaySource,

    /// Where fixes are published
    sender: LiveFeedSender,

    /// RNG for noise and dropouts
    rng: ChaCha8Rng,

    noise: GpsNoise,

    /// Truth playback rate relative to race time (1.0 = recorded pace)
    pace: f64,

    published: u64,
    dropped: u64,
}

impl GpsOracle {
    /// Creates an oracle replaying `truth` into `sender`.
    pub fn new(truth: Arc<TrajectoryStore>, sender: LiveFeedSender, seed: u64) -> Self {
        Self {
            truth: ReplaySource::new(truth).with_label("gps-truth"),
            sender,
            rng: ChaCha8Rng::seed_from_u64(seed),
            noise: GpsNoise::default(),
            pace: 1.0,
            published: 0,
            dropped: 0,
        }
    }

    /// Sets the noise model.
    pub fn with_noise(mut self, noise: GpsNoise) -> Self {
        self.noise = noise;
        self
    }

    /// Sets the truth playback rate. Non-positive or non-finite values
    /// fall back to 1.0.
    pub fn with_pace(mut self, pace: f64) -> Self {
        self.pace = if pace.is_finite() && pace > 0.0 { pace } else { 1.0 };
        self
    }

    pub fn noise(&self) -> GpsNoise {
        self.noise
    }

    /// Number of fixes published so far.
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Number of steps that were dropped.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// True position at `race_time`, without noise.
    ///
    /// The fix is stamped with race time and its speed is scaled by the
    /// pace, since the player covers the recorded distance `pace` times
    /// faster.
    pub fn ground_truth(&mut self, race_time: Duration) -> Option<Fix> {
        let truth = self.truth.current_position(self.truth_time(race_time))?;
        let race_ms = i64::try_from(race_time.as_millis()).unwrap_or(i64::MAX);
        let fix = Fix::new(race_ms, truth.lat, truth.lon, truth.heading_deg);
        Some(match truth.speed_mps {
            Some(speed) => fix.with_speed(speed * self.pace),
            None => fix,
        })
    }

    /// Recording time reached at `race_time`. Saturates at the end of the
    /// recording when the scaled time does not fit a `Duration`.
    fn truth_time(&self, race_time: Duration) -> Duration {
        Duration::try_from_secs_f64(race_time.as_secs_f64() * self.pace).unwrap_or_else(|_| {
            let end_ms = self.truth.store().duration_ms().max(0);
            Duration::from_millis(end_ms as u64)
        })
    }

    /// Advances the receiver to `race_time`.
    ///
    /// Returns the published fix, `Ok(None)` if the step was dropped or
    /// there is no truth to report, or an error if the feed is closed.
    pub fn step(&mut self, race_time: Duration) -> Result<Option<Fix>, EnvError> {
        let Some(truth) = self.ground_truth(race_time) else {
            return Ok(None);
        };

        if self.noise.dropout_rate > 0.0 && self.rng.gen::<f64>() < self.noise.dropout_rate {
            self.dropped += 1;
            return Ok(None);
        }

        let fix = self.perturb(truth);
        self.sender.publish(fix)?;
        self.published += 1;
        Ok(Some(fix))
    }

    fn perturb(&mut self, truth: Fix) -> Fix {
        let north_m = self.gaussian(self.noise.position_std_m);
        let east_m = self.gaussian(self.noise.position_std_m);
        let heading_noise = self.gaussian(self.noise.heading_std_deg);

        let lat = truth.lat + north_m / METERS_PER_DEGREE;
        let lon_scale = METERS_PER_DEGREE * truth.lat.to_radians().cos().max(1e-6);
        let lon = truth.lon + east_m / lon_scale;
        let heading = (truth.heading_deg + heading_noise).rem_euclid(360.0);

        let fix = Fix::new(truth.time_ms, lat, lon, heading);
        match truth.speed_mps {
            Some(speed) => fix.with_speed(speed),
            None => fix,
        }
    }

    fn gaussian(&mut self, std_dev: f64) -> f64 {
        if !std_dev.is_finite() || std_dev <= 0.0 {
            return 0.0;
        }
        match Normal::new(0.0, std_dev) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(_) => 0.0,
        }
    }
}
