use super::{ParamError, Step, Strategy, StrategyFault, SMOOTH_TICK};
use crate::base::color::{self, Color};
use serde_derive::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeParams {
    pub from: Color,
    pub to: Color,
    pub duration_ms: u64,
}

impl Default for FadeParams {
    fn default() -> Self {
        FadeParams {
            from: color::BLACK,
            to: color::WHITE,
            duration_ms: 5000,
        }
    }
}

impl FadeParams {
    pub(crate) fn validate(&self) -> Result<(), ParamError> {
        if self.duration_ms == 0 {
            return Err(ParamError("Fade duration must be positive".to_string()));
        }
        Ok(())
    }
}

/// Linear interpolation between two colors, holding the end color on the
/// final tick.
pub(crate) struct Fade {
    from: Color,
    to: Color,
    duration_ms: u64,
}

impl Fade {
    pub(crate) fn new(params: &FadeParams) -> Fade {
        Fade {
            from: params.from,
            to: params.to,
            duration_ms: params.duration_ms,
        }
    }
}

impl Strategy for Fade {
    fn step(&mut self, elapsed: Duration) -> Result<Step, StrategyFault> {
        let ms = elapsed.as_millis() as u64;
        if ms >= self.duration_ms {
            return Ok(Step {
                color: self.to,
                done: true,
            });
        }
        let t = ms as f32 / self.duration_ms as f32;
        Ok(Step {
            color: self.from.blend(self.to, t),
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

    fn step_at(fade: &mut Fade, ms: u64) -> Step {
        fade.step(Duration::from_millis(ms)).unwrap()
    }

    #[test]
    fn midpoint_is_half_gray() {
        let mut fade = Fade::new(&FadeParams::default());
        let step = step_at(&mut fade, 2500);
        assert!(!step.done);
        for ch in [step.color.red, step.color.green, step.color.blue] {
            assert!((127..=129).contains(&ch), "channel {} off midpoint", ch);
        }
    }

    #[test]
    fn end_is_exact_and_done() {
        let mut fade = Fade::new(&FadeParams::default());
        let step = step_at(&mut fade, 5000);
        assert_eq!(step.color, color::WHITE);
        assert!(step.done);
        // Holds past the bound as well
        let step = step_at(&mut fade, 9000);
        assert_eq!(step.color, color::WHITE);
        assert!(step.done);
    }

    #[test]
    fn starts_at_the_from_color() {
        let mut fade = Fade::new(&FadeParams {
            from: color::RED,
            to: color::BLUE,
            duration_ms: 1000,
        });
        assert_eq!(step_at(&mut fade, 0).color, color::RED);
    }
}
