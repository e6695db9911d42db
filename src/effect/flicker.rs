use super::{ParamError, Step, Strategy, StrategyFault};
use crate::base::color::{gamma_correct, hsv_to_rgb, rgb_to_hsv, Color, Hsv};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_derive::{Deserialize, Serialize};
use std::time::Duration;

// Uniform noise amplitude relative to the brightness band. Large enough to
// keep the flame alive between re-targets, small enough not to strobe.
const NOISE_SCALE: f32 = 0.12;
// Re-target once the walk has effectively arrived.
const RETARGET_EPSILON: f32 = 0.02;

/// Tuning for the stochastic flame effects.
///
/// Brightness follows a mean-reverting random walk towards a moving target,
/// clamped to `min_brightness..=max_brightness` every tick. Sparks briefly
/// push it towards the upper bound; hue jitters around the base color.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlickerParams {
    pub base_color: Color,
    /// Total run time; 0 means run until stopped.
    pub duration_ms: u64,
    pub update_hz: u32,
    pub min_brightness: f32,
    pub max_brightness: f32,
    /// Hue variation around the base color, as a fraction of a turn.
    pub hue_jitter: f32,
    /// Saturation override; `None` keeps the base color's saturation.
    pub saturation: Option<f32>,
    /// Chance per tick of a brief spark.
    pub spark_chance: f32,
    pub spark_gain: f32,
    /// Smoothing time constant of the mean reversion.
    pub tau_ms: u32,
    pub gamma: f32,
    pub seed: Option<u64>,
}

impl FlickerParams {
    pub fn campfire() -> FlickerParams {
        FlickerParams {
            base_color: Color::new(0xFF, 0x93, 0x29),
            duration_ms: 0,
            update_hz: 60,
            min_brightness: 0.15,
            max_brightness: 1.0,
            hue_jitter: 0.02,
            saturation: None,
            spark_chance: 0.02,
            spark_gain: 1.35,
            tau_ms: 120,
            gamma: 2.2,
            seed: None,
        }
    }

    pub fn candle() -> FlickerParams {
        FlickerParams {
            update_hz: 40,
            min_brightness: 0.35,
            max_brightness: 0.85,
            hue_jitter: 0.008,
            spark_chance: 0.005,
            spark_gain: 1.10,
            tau_ms: 300,
            ..FlickerParams::campfire()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ParamError> {
        if !(1..=240).contains(&self.update_hz) {
            return Err(ParamError("Update rate must be 1..=240 Hz".to_string()));
        }
        if !(0.0..=1.0).contains(&self.min_brightness)
            || !(0.0..=1.0).contains(&self.max_brightness)
            || self.min_brightness >= self.max_brightness
        {
            return Err(ParamError(
                "Brightness bounds must satisfy 0 <= min < max <= 1".to_string(),
            ));
        }
        if !(0.0..=0.5).contains(&self.hue_jitter) {
            return Err(ParamError("Hue jitter must be 0..=0.5".to_string()));
        }
        if let Some(sat) = self.saturation {
            if !(0.0..=1.0).contains(&sat) {
                return Err(ParamError("Saturation must be 0..=1".to_string()));
            }
        }
        if !(0.0..=1.0).contains(&self.spark_chance) {
            return Err(ParamError("Spark chance must be 0..=1".to_string()));
        }
        if !(1.0..=4.0).contains(&self.spark_gain) {
            return Err(ParamError("Spark gain must be 1..=4".to_string()));
        }
        if self.tau_ms == 0 {
            return Err(ParamError("Smoothing time constant must be positive".to_string()));
        }
        if !(0.2..=8.0).contains(&self.gamma) {
            return Err(ParamError("Gamma must be 0.2..=8".to_string()));
        }
        Ok(())
    }
}

impl Default for FlickerParams {
    fn default() -> Self {
        FlickerParams::campfire()
    }
}

pub(crate) struct Flicker {
    duration_ms: u64,
    period: Duration,
    reversion: f32,
    min: f32,
    max: f32,
    base_hue: f32,
    hue_jitter: f32,
    sat: f32,
    spark_chance: f32,
    spark_gain: f32,
    gamma: f32,
    level: f32,
    target: f32,
    rng: StdRng,
}

impl Flicker {
    pub(crate) fn new(params: &FlickerParams) -> Flicker {
        let base = rgb_to_hsv(params.base_color);
        let dt_ms = 1000.0 / params.update_hz as f32;
        let mid = (params.min_brightness + params.max_brightness) / 2.0;
        Flicker {
            duration_ms: params.duration_ms,
            period: Duration::from_millis((1000 / params.update_hz).max(1) as u64),
            reversion: (dt_ms / params.tau_ms as f32).min(1.0),
            min: params.min_brightness,
            max: params.max_brightness,
            base_hue: base.hue,
            hue_jitter: params.hue_jitter,
            sat: params.saturation.unwrap_or(base.sat),
            spark_chance: params.spark_chance,
            spark_gain: params.spark_gain,
            gamma: params.gamma,
            level: mid,
            target: mid,
            rng: match params.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
        }
    }
}

impl Strategy for Flicker {
    fn step(&mut self, elapsed: Duration) -> Result<Step, StrategyFault> {
        let done = self.duration_ms > 0 && elapsed.as_millis() as u64 >= self.duration_ms;

        if (self.level - self.target).abs() < RETARGET_EPSILON {
            self.target = self.rng.gen_range(self.min..=self.max);
        }
        let noise = (self.rng.gen::<f32>() - 0.5) * (self.max - self.min) * NOISE_SCALE;
        self.level += (self.target - self.level) * self.reversion + noise;
        if self.rng.gen::<f32>() < self.spark_chance {
            self.level *= self.spark_gain;
        }
        self.level = self.level.clamp(self.min, self.max);

        let hue = self.base_hue + (self.rng.gen::<f32>() - 0.5) * 2.0 * self.hue_jitter;
        let val = gamma_correct(self.level, self.gamma);
        Ok(Step {
            color: hsv_to_rgb(Hsv {
                hue,
                sat: self.sat,
                val,
            }),
            done,
        })
    }

    fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tick(f: &mut Flicker, n: u64) -> Step {
        f.step(Duration::from_millis(n * 16)).unwrap()
    }

    #[test]
    fn brightness_stays_bounded_for_many_ticks() {
        for seed in [0u64, 1, 42, 0xDEAD_BEEF] {
            let mut params = FlickerParams::campfire();
            params.seed = Some(seed);
            let mut flicker = Flicker::new(&params);
            for n in 0..10_000 {
                tick(&mut flicker, n);
                assert!(
                    (flicker.min..=flicker.max).contains(&flicker.level),
                    "seed {} tick {} level {}",
                    seed,
                    n,
                    flicker.level
                );
            }
        }
    }

    #[test]
    fn candle_is_gentler_than_campfire() {
        let campfire = FlickerParams::campfire();
        let candle = FlickerParams::candle();
        assert!(candle.spark_chance < campfire.spark_chance);
        assert!(candle.hue_jitter < campfire.hue_jitter);
        assert!(candle.tau_ms > campfire.tau_ms);
        assert!(candle.max_brightness < campfire.max_brightness);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let mut params = FlickerParams::candle();
        params.seed = Some(99);
        let mut a = Flicker::new(&params);
        let mut b = Flicker::new(&params);
        for n in 0..500 {
            assert_eq!(tick(&mut a, n).color, tick(&mut b, n).color);
        }
    }

    #[test]
    fn bounded_run_reports_done() {
        let mut params = FlickerParams::candle();
        params.duration_ms = 1000;
        params.seed = Some(5);
        let mut flicker = Flicker::new(&params);
        assert!(!flicker.step(Duration::from_millis(999)).unwrap().done);
        assert!(flicker.step(Duration::from_millis(1000)).unwrap().done);
    }

    #[test]
    fn zero_duration_never_finishes() {
        let mut params = FlickerParams::campfire();
        params.seed = Some(11);
        let mut flicker = Flicker::new(&params);
        for n in 0..5000 {
            assert!(!tick(&mut flicker, n).done);
        }
    }

    #[test]
    fn output_value_respects_gamma_band() {
        let mut params = FlickerParams::campfire();
        params.seed = Some(17);
        params.saturation = Some(1.0);
        let mut flicker = Flicker::new(&params);
        let lo = gamma_correct(params.min_brightness, params.gamma);
        let hi = gamma_correct(params.max_brightness, params.gamma);
        for n in 0..2000 {
            let step = tick(&mut flicker, n);
            let hsv = rgb_to_hsv(step.color);
            assert!(
                hsv.val >= lo - 0.01 && hsv.val <= hi + 0.01,
                "tick {} val {}",
                n,
                hsv.val
            );
        }
    }
}
