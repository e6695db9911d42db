//! Effect strategies and their parameter sets.
//!
//! Every effect is a pure function of elapsed time plus whatever internal
//! state it carries (interpolation bookkeeping, a seedable PRNG for the
//! stochastic ones). Strategies never touch hardware; the runner asks for a
//! color each tick and writes it out.

mod breathing;
mod cycle;
mod fade;
mod flicker;
mod profile;
mod random;

pub use breathing::BreathingParams;
pub use cycle::CycleParams;
pub use fade::FadeParams;
pub use flicker::FlickerParams;
pub use profile::ProfileParams;
pub use random::RandomParams;

use crate::base::color::Color;
use crate::profiles::ProfileSchedule;
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// Smooth fades update fast enough that steps are below perception; stepped
// effects only need to wake often enough to hit their switch points.
pub(crate) const SMOOTH_TICK: Duration = Duration::from_millis(20);
pub(crate) const COARSE_TICK_MS: u64 = 50;

/// One tick's output: the color to display and whether the effect is over.
pub struct Step {
    pub color: Color,
    pub done: bool,
}

/// A computation error inside a running strategy. Fatal to that run only.
#[derive(Debug)]
pub struct StrategyFault(pub String);

impl std::error::Error for StrategyFault {}

impl fmt::Display for StrategyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Effect computation failed: {}", self.0)
    }
}

pub trait Strategy: Send {
    /// Color for the given elapsed time since effect start.
    fn step(&mut self, elapsed: Duration) -> Result<Step, StrategyFault>;

    /// Requested update period of this effect.
    fn period(&self) -> Duration;
}

/// A rejected effect parameter. Raised before any state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamError(pub String);

impl std::error::Error for ParamError {}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The closed set of startable effects with their parameters.
///
/// Parameters are fixed once the effect is started; changing them means
/// stopping and starting a new effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum EffectSpec {
    Breathing(BreathingParams),
    Fade(FadeParams),
    Cycle(CycleParams),
    Random(RandomParams),
    Profile(ProfileParams),
    Campfire(FlickerParams),
    Candle(FlickerParams),
}

impl EffectSpec {
    pub fn name(&self) -> &'static str {
        match self {
            EffectSpec::Breathing(_) => "breathing",
            EffectSpec::Fade(_) => "fade",
            EffectSpec::Cycle(_) => "cycle",
            EffectSpec::Random(_) => "random",
            EffectSpec::Profile(_) => "profile",
            EffectSpec::Campfire(_) => "campfire",
            EffectSpec::Candle(_) => "candle",
        }
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        match self {
            EffectSpec::Breathing(p) => p.validate(),
            EffectSpec::Fade(p) => p.validate(),
            EffectSpec::Cycle(p) => p.validate(),
            EffectSpec::Random(p) => p.validate(),
            EffectSpec::Profile(p) => p.validate(),
            EffectSpec::Campfire(p) | EffectSpec::Candle(p) => p.validate(),
        }
    }

    /// Validate and build the strategy for this spec. The profile schedule is
    /// consulted here, at start time, for the profile effect's target color.
    pub fn build(&self, profiles: &ProfileSchedule) -> Result<Box<dyn Strategy>, ParamError> {
        self.validate()?;
        Ok(match self {
            EffectSpec::Breathing(p) => Box::new(breathing::Breathing::new(p)),
            EffectSpec::Fade(p) => Box::new(fade::Fade::new(p)),
            EffectSpec::Cycle(p) => Box::new(cycle::Cycle::new(p)),
            EffectSpec::Random(p) => Box::new(random::RandomColors::new(p)),
            EffectSpec::Profile(p) => Box::new(profile::ProfileFade::new(
                profiles.active_color_now(),
                p.duration_ms,
            )),
            EffectSpec::Campfire(p) | EffectSpec::Candle(p) => {
                Box::new(flicker::Flicker::new(p))
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::base::color;

    #[test]
    fn validation_rejects_degenerate_specs() {
        assert!(EffectSpec::Fade(FadeParams {
            duration_ms: 0,
            ..FadeParams::default()
        })
        .validate()
        .is_err());
        assert!(EffectSpec::Cycle(CycleParams {
            colors: vec![],
            duration_ms: 500,
        })
        .validate()
        .is_err());
        assert!(EffectSpec::Breathing(BreathingParams {
            cycles: Some(0),
            ..BreathingParams::default()
        })
        .validate()
        .is_err());
        assert!(EffectSpec::Random(RandomParams {
            interval_ms: 0,
            seed: None,
        })
        .validate()
        .is_err());
        let mut flicker = FlickerParams::campfire();
        flicker.min_brightness = 0.9;
        flicker.max_brightness = 0.2;
        assert!(EffectSpec::Campfire(flicker).validate().is_err());
    }

    #[test]
    fn default_specs_are_valid() {
        let specs = [
            EffectSpec::Breathing(BreathingParams::default()),
            EffectSpec::Fade(FadeParams::default()),
            EffectSpec::Cycle(CycleParams::default()),
            EffectSpec::Random(RandomParams::default()),
            EffectSpec::Profile(ProfileParams::default()),
            EffectSpec::Campfire(FlickerParams::campfire()),
            EffectSpec::Candle(FlickerParams::candle()),
        ];
        for spec in &specs {
            assert!(spec.validate().is_ok(), "{} should be valid", spec.name());
        }
    }

    #[test]
    fn specs_round_trip_through_json() {
        let spec = EffectSpec::Cycle(CycleParams {
            colors: vec![color::RED, color::GREEN],
            duration_ms: 700,
        });
        let json = serde_json::to_string(&spec).unwrap();
        let back: EffectSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name(), "cycle");
        match back {
            EffectSpec::Cycle(p) => {
                assert_eq!(p.colors, vec![color::RED, color::GREEN]);
                assert_eq!(p.duration_ms, 700);
            }
            other => panic!("Unexpected spec {:?}", other),
        }
    }
}
