use super::{ParamError, Step, Strategy, StrategyFault, COARSE_TICK_MS};
use crate::base::color::{self, Color};
use serde_derive::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleParams {
    pub colors: Vec<Color>,
    /// Dwell time per list entry.
    pub duration_ms: u64,
}

impl Default for CycleParams {
    fn default() -> Self {
        CycleParams {
            colors: vec![color::RED, color::GREEN, color::BLUE],
            duration_ms: 2000,
        }
    }
}

impl CycleParams {
    pub(crate) fn validate(&self) -> Result<(), ParamError> {
        if self.colors.is_empty() {
            return Err(ParamError("Cycle needs at least one color".to_string()));
        }
        if self.duration_ms == 0 {
            return Err(ParamError("Cycle dwell time must be positive".to_string()));
        }
        Ok(())
    }
}

/// Steps through an ordered color list, wrapping indefinitely.
pub(crate) struct Cycle {
    colors: Vec<Color>,
    dwell_ms: u64,
}

impl Cycle {
    pub(crate) fn new(params: &CycleParams) -> Cycle {
        Cycle {
            colors: params.colors.clone(),
            dwell_ms: params.duration_ms,
        }
    }
}

impl Strategy for Cycle {
    fn step(&mut self, elapsed: Duration) -> Result<Step, StrategyFault> {
        let ms = elapsed.as_millis() as u64;
        let index = ((ms / self.dwell_ms) as usize) % self.colors.len();
        Ok(Step {
            color: self.colors[index],
            done: false,
        })
    }

    fn period(&self) -> Duration {
        Duration::from_millis(self.dwell_ms.min(COARSE_TICK_MS))
    }
}
