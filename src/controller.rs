//! Facade binding the color model, effect runner and PWM port.
//!
//! The most recent explicit command always wins: static commands issued
//! while an effect runs stop the effect first, so the port only ever has one
//! writer.

use crate::base::brightness::Brightness;
use crate::base::color::{self, Color};
use crate::drivers::driver::{PwmDriver, PwmError};
use crate::effect::{EffectSpec, ParamError};
use crate::profiles::ProfileSchedule;
use crate::runner::{EffectRunner, RunnerError, RunnerStatus, SyncDriver};
use log::info;
use serde_derive::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex as BlockingMutex};
use tokio::sync::Mutex;

#[derive(Debug)]
pub enum CommandError {
    Validation(String),
    Busy,
    Hardware(String),
    Fault(String),
}

impl std::error::Error for CommandError {}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Validation(msg) => write!(f, "Invalid request: {}", msg),
            CommandError::Busy => write!(f, "Controller busy, try again"),
            CommandError::Hardware(msg) => write!(f, "Hardware error: {}", msg),
            CommandError::Fault(msg) => write!(f, "Internal fault: {}", msg),
        }
    }
}

impl From<RunnerError> for CommandError {
    fn from(e: RunnerError) -> CommandError {
        match e {
            RunnerError::Busy => CommandError::Busy,
        }
    }
}

impl From<ParamError> for CommandError {
    fn from(e: ParamError) -> CommandError {
        CommandError::Validation(e.0)
    }
}

impl From<PwmError> for CommandError {
    fn from(e: PwmError) -> CommandError {
        CommandError::Hardware(e.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EffectStatus {
    pub name: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub on: bool,
    /// The logical color, unscaled by brightness.
    pub color: Color,
    pub brightness: u8,
    /// The value last written to the port, scaled and effect-driven.
    pub displayed: Option<Color>,
    pub effect: Option<EffectStatus>,
    pub error: Option<String>,
}

struct StaticState {
    color: Color,
    on: bool,
}

pub struct Controller {
    runner: EffectRunner,
    driver: SyncDriver,
    profiles: ProfileSchedule,
    brightness: Arc<AtomicU8>,
    state: BlockingMutex<StaticState>,
}

impl Controller {
    pub fn new(driver: Box<dyn PwmDriver>, profiles: ProfileSchedule) -> Controller {
        let driver: SyncDriver = Arc::new(Mutex::new(driver));
        let brightness = Arc::new(AtomicU8::new(100));
        Controller {
            runner: EffectRunner::new(driver.clone(), brightness.clone()),
            driver,
            profiles,
            brightness,
            state: BlockingMutex::new(StaticState {
                color: color::BLACK,
                on: false,
            }),
        }
    }

    pub async fn switch_on(&self) -> Result<(), CommandError> {
        info!("Switching on");
        self.write_static(color::WHITE, true).await
    }

    pub async fn switch_off(&self) -> Result<(), CommandError> {
        info!("Switching off");
        self.write_static(color::BLACK, false).await
    }

    pub async fn set_color(&self, color: Color) -> Result<(), CommandError> {
        info!("Setting color {}", color);
        self.write_static(color, !color.is_black()).await
    }

    /// Rescale the physical output while keeping the logical color. Stops a
    /// running effect like every other static command.
    pub async fn set_brightness(&self, brightness: Brightness) -> Result<(), CommandError> {
        info!("Setting brightness {}%", brightness.percent());
        self.runner.stop().await?;
        self.brightness.store(brightness.percent(), Ordering::Relaxed);
        let (current, on) = {
            let state = self.state.lock().unwrap();
            (state.color, state.on)
        };
        if on {
            self.apply_scaled(current).await?;
        }
        Ok(())
    }

    pub async fn start_effect(&self, spec: EffectSpec) -> Result<(), CommandError> {
        let strategy = spec.build(&self.profiles)?;
        info!("Starting effect '{}'", spec.name());
        self.runner.start(spec.name(), strategy).await?;
        Ok(())
    }

    pub async fn stop_effect(&self) -> Result<(), CommandError> {
        self.runner.stop().await?;
        Ok(())
    }

    pub fn status(&self) -> ControllerStatus {
        let (color, on) = {
            let state = self.state.lock().unwrap();
            (state.color, state.on)
        };
        let effect = match self.runner.status() {
            RunnerStatus::Idle => None,
            RunnerStatus::Running { effect, elapsed } => Some(EffectStatus {
                name: effect.to_string(),
                elapsed_ms: elapsed.as_millis() as u64,
            }),
            RunnerStatus::Stopping => Some(EffectStatus {
                name: "stopping".to_string(),
                elapsed_ms: 0,
            }),
        };
        ControllerStatus {
            on: on || effect.is_some(),
            color,
            brightness: self.brightness.load(Ordering::Relaxed),
            displayed: self.runner.displayed(),
            effect,
            error: self.runner.last_fault().map(|fault| fault.to_string()),
        }
    }

    /// The value currently on the port, as far as this process has written.
    pub fn displayed(&self) -> Option<Color> {
        self.runner.displayed()
    }

    async fn write_static(&self, color: Color, on: bool) -> Result<(), CommandError> {
        self.runner.stop().await?;
        {
            let mut state = self.state.lock().unwrap();
            state.color = color;
            state.on = on;
        }
        self.apply_scaled(color).await
    }

    async fn apply_scaled(&self, color: Color) -> Result<(), CommandError> {
        let out = crate::base::brightness::scale(color, self.brightness.load(Ordering::Relaxed));
        self.driver.lock().await.apply(out).await?;
        self.runner.record_display(out);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::drivers::dummy::dummy::{DummyDriver, DummyHandle};
    use crate::effect::{BreathingParams, CycleParams};
    use std::time::Duration;

    fn controller_with_dummy() -> (Controller, DummyHandle) {
        let (driver, handle) = DummyDriver::with_handle();
        (
            Controller::new(Box::new(driver), ProfileSchedule::default()),
            handle,
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(80)).await;
    }

    #[tokio::test]
    async fn on_is_static_white_off_is_black() {
        let (controller, handle) = controller_with_dummy();
        controller.switch_on().await.unwrap();
        assert_eq!(handle.applied(), Some(color::WHITE));
        assert!(controller.status().on);
        controller.switch_off().await.unwrap();
        assert_eq!(handle.applied(), Some(color::BLACK));
        assert!(!controller.status().on);
    }

    #[tokio::test]
    async fn off_during_effect_stops_the_loop_and_blacks_out() {
        let (controller, handle) = controller_with_dummy();
        controller
            .start_effect(EffectSpec::Breathing(BreathingParams::default()))
            .await
            .unwrap();
        settle().await;
        controller.switch_off().await.unwrap();
        let frozen = handle.writes().len();
        settle().await;
        assert_eq!(handle.writes().len(), frozen);
        assert_eq!(handle.applied(), Some(color::BLACK));
        assert!(controller.status().effect.is_none());
    }

    #[tokio::test]
    async fn brightness_scales_output_but_not_logical_color() {
        let (controller, handle) = controller_with_dummy();
        controller.set_color(color::WHITE).await.unwrap();
        controller
            .set_brightness(Brightness::new(50).unwrap())
            .await
            .unwrap();
        assert_eq!(handle.applied(), Some(Color::new(128, 128, 128)));
        let status = controller.status();
        assert_eq!(status.color, color::WHITE);
        assert_eq!(status.brightness, 50);
        assert_eq!(status.displayed, Some(Color::new(128, 128, 128)));
    }

    #[tokio::test]
    async fn set_color_replaces_a_running_effect() {
        let (controller, handle) = controller_with_dummy();
        controller
            .start_effect(EffectSpec::Cycle(CycleParams::default()))
            .await
            .unwrap();
        settle().await;
        controller.set_color(color::PINK).await.unwrap();
        let frozen = handle.writes().len();
        settle().await;
        assert_eq!(handle.writes().len(), frozen);
        assert_eq!(handle.applied(), Some(color::PINK));
        let status = controller.status();
        assert!(status.effect.is_none());
        assert_eq!(status.color, color::PINK);
    }

    #[tokio::test]
    async fn invalid_effect_is_rejected_before_any_state_change() {
        let (controller, handle) = controller_with_dummy();
        let err = controller
            .start_effect(EffectSpec::Cycle(CycleParams {
                colors: vec![],
                duration_ms: 100,
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));
        assert!(handle.writes().is_empty());
        assert!(controller.status().effect.is_none());
    }

    #[tokio::test]
    async fn status_reports_running_effect_name_and_elapsed() {
        let (controller, _handle) = controller_with_dummy();
        controller
            .start_effect(EffectSpec::Breathing(BreathingParams::default()))
            .await
            .unwrap();
        settle().await;
        let status = controller.status();
        let effect = status.effect.expect("effect should be running");
        assert_eq!(effect.name, "breathing");
        assert!(effect.elapsed_ms >= 50);
        assert!(status.on);
        controller.stop_effect().await.unwrap();
    }
}
