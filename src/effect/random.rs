use super::{ParamError, Step, Strategy, StrategyFault};
use crate::base::color::Color;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_derive::{Deserialize, Serialize};
use std::time::Duration;

// Lower bound per channel keeps the picks bright enough to read as color
// on a strip instead of muddy near-black mixes.
const MIN_CHANNEL: u8 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomParams {
    pub interval_ms: u64,
    /// Fixed PRNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for RandomParams {
    fn default() -> Self {
        RandomParams {
            interval_ms: 2000,
            seed: None,
        }
    }
}

impl RandomParams {
    pub(crate) fn validate(&self) -> Result<(), ParamError> {
        if self.interval_ms == 0 {
            return Err(ParamError(
                "Random color interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Picks a fresh bright color every interval and holds it in between.
pub(crate) struct RandomColors {
    interval_ms: u64,
    rng: StdRng,
    current: Color,
    picks: u64,
}

impl RandomColors {
    pub(crate) fn new(params: &RandomParams) -> RandomColors {
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        RandomColors {
            interval_ms: params.interval_ms,
            rng,
            current: Color::new(0, 0, 0),
            picks: 0,
        }
    }

    fn pick(&mut self) -> Color {
        Color::new(
            self.rng.gen_range(MIN_CHANNEL..=255),
            self.rng.gen_range(MIN_CHANNEL..=255),
            self.rng.gen_range(MIN_CHANNEL..=255),
        )
    }
}

impl Strategy for RandomColors {
    fn step(&mut self, elapsed: Duration) -> Result<Step, StrategyFault> {
        let due = elapsed.as_millis() as u64 / self.interval_ms + 1;
        while self.picks < due {
            self.current = self.pick();
            self.picks += 1;
        }
        Ok(Step {
            color: self.current,
            done: false,
        })
    }

    fn period(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn color_at(r: &mut RandomColors, ms: u64) -> Color {
        r.step(Duration::from_millis(ms)).unwrap().color
    }

    #[test]
    fn holds_between_intervals() {
        let mut r = RandomColors::new(&RandomParams {
            interval_ms: 1000,
            seed: Some(7),
        });
        let first = color_at(&mut r, 0);
        assert_eq!(color_at(&mut r, 500), first);
        assert_eq!(color_at(&mut r, 999), first);
        let second = color_at(&mut r, 1000);
        assert_ne!(second, first);
        assert_eq!(color_at(&mut r, 1999), second);
    }

    #[test]
    fn seeded_runs_replay_the_same_sequence() {
        let params = RandomParams {
            interval_ms: 100,
            seed: Some(42),
        };
        let mut a = RandomColors::new(&params);
        let mut b = RandomColors::new(&params);
        for ms in (0..2000).step_by(100) {
            assert_eq!(color_at(&mut a, ms), color_at(&mut b, ms));
        }
    }

    #[test]
    fn picks_stay_bright() {
        let mut r = RandomColors::new(&RandomParams {
            interval_ms: 10,
            seed: Some(3),
        });
        for ms in (0..5000).step_by(10) {
            let c = color_at(&mut r, ms);
            assert!(c.red >= MIN_CHANNEL && c.green >= MIN_CHANNEL && c.blue >= MIN_CHANNEL);
        }
    }
}
