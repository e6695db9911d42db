use super::{ParamError, Step, Strategy, StrategyFault, SMOOTH_TICK};
use crate::base::color::{self, Color};
use serde_derive::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileParams {
    /// Length of the fade into the profile color.
    pub duration_ms: u64,
}

impl Default for ProfileParams {
    fn default() -> Self {
        ProfileParams { duration_ms: 10_000 }
    }
}

impl ProfileParams {
    pub(crate) fn validate(&self) -> Result<(), ParamError> {
        if self.duration_ms == 0 {
            return Err(ParamError(
                "Profile fade duration must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fades from dark into the time-of-day profile color, then holds it until
/// stopped or replaced.
pub(crate) struct ProfileFade {
    to: Color,
    duration_ms: u64,
}

impl ProfileFade {
    pub(crate) fn new(to: Color, duration_ms: u64) -> ProfileFade {
        ProfileFade { to, duration_ms }
    }
}

impl Strategy for ProfileFade {
    fn step(&mut self, elapsed: Duration) -> Result<Step, StrategyFault> {
        let ms = elapsed.as_millis() as u64;
        let color = if ms >= self.duration_ms {
            self.to
        } else {
            color::BLACK.blend(self.to, ms as f32 / self.duration_ms as f32)
        };
        Ok(Step { color, done: false })
    }

    fn period(&self) -> Duration {
        SMOOTH_TICK
    }
}
