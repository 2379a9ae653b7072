//! Propagation models attached to the shared medium.
//!
//! The medium combines a loss model (transmit power to received power over
//! a link distance) with a delay model (link distance to propagation time).
//! Both are trait objects so any correctly shaped model can be plugged in;
//! the defaults are a log-distance path loss and constant-speed delay.

use rand::thread_rng;
use rand_distr::{Distribution, Normal};

use crate::sim::SimTime;

/// Received power at a distance for a given transmit power.
pub trait PropagationLoss {
    fn rx_power_dbm(&self, tx_power_dbm: f64, distance: f64) -> f64;
}

/// Propagation time over a link distance (meters).
pub trait PropagationDelay {
    fn delay(&self, distance: f64) -> SimTime;
}

/// Log-distance path loss: `PL(d) = PL(d0) + 10 * n * log10(d / d0)` with
/// `d0 = 1 m`, plus optional log-normal shadowing sampled per call.
///
/// Distances below the reference distance clamp to the reference loss.
pub struct LogDistanceLoss {
    exponent: f64,
    reference_loss_db: f64,
    shadowing_sigma: f64,
}

impl LogDistanceLoss {
    pub fn new(exponent: f64, reference_loss_db: f64) -> LogDistanceLoss {
        LogDistanceLoss {
            exponent,
            reference_loss_db,
            shadowing_sigma: 0.0,
        }
    }

    /// Enable log-normal shadowing with the given sigma (dB). Sampled
    /// independently for every link evaluation, so results become
    /// stochastic.
    pub fn with_shadowing(mut self, sigma: f64) -> LogDistanceLoss {
        self.shadowing_sigma = sigma;
        self
    }

    fn path_loss_db(&self, distance: f64) -> f64 {
        let mut loss = if distance < 1.0 {
            self.reference_loss_db
        } else {
            self.reference_loss_db + 10.0 * self.exponent * distance.log10()
        };
        if self.shadowing_sigma > 0.0 {
            let normal =
                Normal::new(0.0, self.shadowing_sigma).expect("invalid shadowing sigma");
            let shadowing: f64 = normal.sample(&mut thread_rng());
            loss += shadowing;
        }
        loss
    }
}

impl Default for LogDistanceLoss {
    // Exponent 3.0 and 46.68 dB reference loss at 1 m, a plain indoor
    // 2.4 GHz profile.
    fn default() -> LogDistanceLoss {
        LogDistanceLoss::new(3.0, 46.68)
    }
}

impl PropagationLoss for LogDistanceLoss {
    fn rx_power_dbm(&self, tx_power_dbm: f64, distance: f64) -> f64 {
        tx_power_dbm - self.path_loss_db(distance)
    }
}

/// Signals travel at a fixed speed (meters per second).
pub struct ConstantSpeedDelay {
    speed: f64,
}

impl ConstantSpeedDelay {
    pub fn new(speed: f64) -> ConstantSpeedDelay {
        ConstantSpeedDelay { speed }
    }
}

impl Default for ConstantSpeedDelay {
    fn default() -> ConstantSpeedDelay {
        ConstantSpeedDelay::new(299_792_458.0)
    }
}

impl PropagationDelay for ConstantSpeedDelay {
    fn delay(&self, distance: f64) -> SimTime {
        SimTime::from_secs_f64(distance / self.speed)
    }
}

pub fn dbm_to_mw(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0)
}

pub fn mw_to_dbm(mw: f64) -> f64 {
    10.0 * mw.log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_increases_with_distance() {
        let model = LogDistanceLoss::default();
        let near = model.rx_power_dbm(0.0, 10.0);
        let mid = model.rx_power_dbm(0.0, 50.0);
        let far = model.rx_power_dbm(0.0, 200.0);
        assert!(near > mid && mid > far);
    }

    #[test]
    fn rx_power_tracks_tx_power() {
        let model = LogDistanceLoss::default();
        let low = model.rx_power_dbm(0.0, 30.0);
        let high = model.rx_power_dbm(10.0, 30.0);
        assert!((high - low - 10.0).abs() < 1e-9);
    }

    #[test]
    fn sub_reference_distances_clamp_to_reference_loss() {
        let model = LogDistanceLoss::new(3.0, 40.0);
        assert_eq!(model.rx_power_dbm(0.0, 0.0), -40.0);
        assert_eq!(model.rx_power_dbm(0.0, 0.5), -40.0);
    }

    #[test]
    fn zero_sigma_is_deterministic() {
        let model = LogDistanceLoss::default();
        assert_eq!(model.rx_power_dbm(0.0, 75.0), model.rx_power_dbm(0.0, 75.0));
    }

    #[test]
    fn shadowing_makes_samples_stochastic() {
        let model = LogDistanceLoss::default().with_shadowing(8.0);
        let samples: Vec<f64> = (0..10).map(|_| model.rx_power_dbm(0.0, 100.0)).collect();
        let first = samples[0];
        assert!(samples.iter().any(|s| (s - first).abs() > 1e-6));
    }

    #[test]
    fn constant_speed_delay_is_linear() {
        let model = ConstantSpeedDelay::default();
        let one_light_second = model.delay(299_792_458.0);
        assert!((one_light_second.as_secs_f64() - 1.0).abs() < 1e-6);
        assert_eq!(model.delay(0.0), SimTime::ZERO);
    }

    #[test]
    fn dbm_mw_conversion_round_trips() {
        for v in [-100.0, -50.0, 0.0, 10.0] {
            let back = mw_to_dbm(dbm_to_mw(v));
            assert!((v - back).abs() < 1e-9);
        }
    }
}
