use super::{ParamError, Step, Strategy, StrategyFault, SMOOTH_TICK};
use crate::base::color::{self, Color};
use serde_derive::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreathingParams {
    pub color: Color,
    /// Length of one inhale/exhale cycle.
    pub duration_ms: u64,
    /// Stop after this many cycles; `None` repeats until stopped.
    pub cycles: Option<u32>,
}

impl Default for BreathingParams {
    fn default() -> Self {
        BreathingParams {
            color: color::RED,
            duration_ms: 2000,
            cycles: None,
        }
    }
}

impl BreathingParams {
    pub(crate) fn validate(&self) -> Result<(), ParamError> {
        if self.duration_ms == 0 {
            return Err(ParamError(
                "Breathing cycle duration must be positive".to_string(),
            ));
        }
        if self.cycles == Some(0) {
            return Err(ParamError(
                "Breathing cycle count must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sinusoidal brightness envelope at a fixed hue.
pub(crate) struct Breathing {
    color: Color,
    period_ms: u64,
    cycles: Option<u32>,
}

impl Breathing {
    pub(crate) fn new(params: &BreathingParams) -> Breathing {
        Breathing {
            color: params.color,
            period_ms: params.duration_ms,
            cycles: params.cycles,
        }
    }
}

impl Strategy for Breathing {
    fn step(&mut self, elapsed: Duration) -> Result<Step, StrategyFault> {
        let ms = elapsed.as_millis() as u64;
        if let Some(cycles) = self.cycles {
            if ms >= u64::from(cycles) * self.period_ms {
                // The envelope is back at zero here, so the strip goes dark.
                return Ok(Step {
                    color: color::BLACK,
                    done: true,
                });
            }
        }
        let pos = (ms % self.period_ms) as f32 / self.period_ms as f32;
        let envelope = 0.5 - 0.5 * (TAU * pos).cos();
        Ok(Step {
            color: color::BLACK.blend(self.color, envelope),
            done: false,
        })
    }

    fn period(&self) -> Duration {
        SMOOTH_TICK
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn step_at(b: &mut Breathing, ms: u64) -> Step {
        b.step(Duration::from_millis(ms)).unwrap()
    }

    #[test]
    fn envelope_runs_dark_to_full_and_back() {
        let mut b = Breathing::new(&BreathingParams::default());
        assert_eq!(step_at(&mut b, 0).color, color::BLACK);
        assert_eq!(step_at(&mut b, 1000).color, color::RED);
        let dark_again = step_at(&mut b, 2000).color;
        assert_eq!(dark_again, color::BLACK);
    }

    #[test]
    fn repeats_across_cycles() {
        let mut b = Breathing::new(&BreathingParams::default());
        let first = step_at(&mut b, 500).color;
        let second = step_at(&mut b, 2500).color;
        assert_eq!(first, second);
        assert!(!step_at(&mut b, 60_000).done);
    }

    #[test]
    fn one_shot_terminates_dark() {
        let mut b = Breathing::new(&BreathingParams {
            cycles: Some(2),
            ..BreathingParams::default()
        });
        assert!(!step_at(&mut b, 3999).done);
        let last = step_at(&mut b, 4000);
        assert!(last.done);
        assert_eq!(last.color, color::BLACK);
    }
}
