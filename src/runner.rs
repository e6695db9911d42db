//! The effect execution slot.
//!
//! At most one effect loop runs at any instant. Start and stop requests from
//! concurrent callers are serialized through a transition lock; the loop
//! itself is a spawned task that owns the tick cadence and is cancelled
//! cooperatively, so the PWM port is never abandoned mid-transition.

use crate::base::brightness;
use crate::base::color::{self, Color};
use crate::drivers::driver::PwmDriver;
use crate::effect::Strategy;
use log::{debug, error};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex as BlockingMutex};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub type SyncDriver = Arc<Mutex<Box<dyn PwmDriver>>>;

/// Longest a caller waits to enter a start/stop transition before the
/// request fails as busy instead of hanging. The loop observes cancellation
/// at its next select point, so a healthy transition completes well within
/// two tick periods.
pub const TRANSITION_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub enum RunnerError {
    Busy,
}

impl std::error::Error for RunnerError {}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Busy => write!(f, "An effect transition is already in progress"),
        }
    }
}

/// Why the last run ended early. Cleared when the next effect starts.
#[derive(Debug, Clone)]
pub enum RunFault {
    Hardware(String),
    Strategy(String),
}

impl fmt::Display for RunFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunFault::Hardware(msg) => write!(f, "Hardware error: {}", msg),
            RunFault::Strategy(msg) => write!(f, "Effect fault: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerStatus {
    Idle,
    Running {
        effect: &'static str,
        elapsed: Duration,
    },
    Stopping,
}

enum LoopState {
    Idle,
    Running {
        effect: &'static str,
        started: Instant,
    },
    Stopping,
}

struct Shared {
    state: LoopState,
    displayed: Option<Color>,
    fault: Option<RunFault>,
}

struct ActiveLoop {
    cancel: watch::Sender<bool>,
    join: JoinHandle<()>,
}

pub struct EffectRunner {
    driver: SyncDriver,
    brightness: Arc<AtomicU8>,
    shared: Arc<BlockingMutex<Shared>>,
    active: Mutex<Option<ActiveLoop>>,
}

impl EffectRunner {
    pub fn new(driver: SyncDriver, brightness: Arc<AtomicU8>) -> EffectRunner {
        EffectRunner {
            driver,
            brightness,
            shared: Arc::new(BlockingMutex::new(Shared {
                state: LoopState::Idle,
                displayed: None,
                fault: None,
            })),
            active: Mutex::new(None),
        }
    }

    /// Launch an effect. Any running effect is cancelled and awaited first,
    /// so exactly one loop is alive afterwards no matter how many starts
    /// race.
    pub async fn start(
        &self,
        effect: &'static str,
        strategy: Box<dyn Strategy>,
    ) -> Result<(), RunnerError> {
        let mut active = self.transition().await?;
        self.halt(&mut active).await;
        let started = Instant::now();
        {
            let mut shared = self.shared.lock().unwrap();
            shared.fault = None;
            shared.state = LoopState::Running { effect, started };
        }
        let (cancel, cancel_rx) = watch::channel(false);
        let join = tokio::spawn(effect_loop(
            self.driver.clone(),
            self.brightness.clone(),
            self.shared.clone(),
            strategy,
            started,
            cancel_rx,
        ));
        *active = Some(ActiveLoop { cancel, join });
        debug!("Started effect '{}'", effect);
        Ok(())
    }

    /// Stop the running effect, if any. Idempotent; the port keeps the last
    /// intentionally written value (blackout is the caller's decision).
    pub async fn stop(&self) -> Result<(), RunnerError> {
        let mut active = self.transition().await?;
        self.halt(&mut active).await;
        Ok(())
    }

    /// Snapshot of the runner state. Never blocks on the tick loop.
    pub fn status(&self) -> RunnerStatus {
        match self.shared.lock().unwrap().state {
            LoopState::Idle => RunnerStatus::Idle,
            LoopState::Running { effect, started } => RunnerStatus::Running {
                effect,
                elapsed: started.elapsed(),
            },
            LoopState::Stopping => RunnerStatus::Stopping,
        }
    }

    /// The last value written to the port, by the loop or a static write.
    pub fn displayed(&self) -> Option<Color> {
        self.shared.lock().unwrap().displayed
    }

    /// The fault that ended the last run early, if any.
    pub fn last_fault(&self) -> Option<RunFault> {
        self.shared.lock().unwrap().fault.clone()
    }

    pub(crate) fn record_display(&self, color: Color) {
        self.shared.lock().unwrap().displayed = Some(color);
    }

    async fn transition(&self) -> Result<MutexGuard<'_, Option<ActiveLoop>>, RunnerError> {
        tokio::time::timeout(TRANSITION_TIMEOUT, self.active.lock())
            .await
            .map_err(|_| RunnerError::Busy)
    }

    async fn halt(&self, active: &mut Option<ActiveLoop>) {
        let Some(prev) = active.take() else {
            return;
        };
        self.shared.lock().unwrap().state = LoopState::Stopping;
        let _ = prev.cancel.send(true);
        if let Err(e) = prev.join.await {
            // A panicked strategy is handled like any other fault: force the
            // port dark and report it.
            error!("Effect task died: {}", e);
            if let Err(e) = self.driver.lock().await.release().await {
                error!("Failed to release PWM port: {}", e);
            }
            let mut shared = self.shared.lock().unwrap();
            shared.displayed = Some(color::BLACK);
            shared.fault = Some(RunFault::Strategy(e.to_string()));
        }
        self.shared.lock().unwrap().state = LoopState::Idle;
    }
}

enum Outcome {
    Cancelled,
    Done,
    Fault(RunFault),
}

async fn effect_loop(
    driver: SyncDriver,
    brightness: Arc<AtomicU8>,
    shared: Arc<BlockingMutex<Shared>>,
    mut strategy: Box<dyn Strategy>,
    started: Instant,
    mut cancel: watch::Receiver<bool>,
) {
    let mut ticks = tokio::time::interval(strategy.period());
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let outcome = loop {
        tokio::select! {
            _ = cancel.changed() => break Outcome::Cancelled,
            _ = ticks.tick() => {
                let step = match strategy.step(started.elapsed()) {
                    Ok(step) => step,
                    Err(e) => break Outcome::Fault(RunFault::Strategy(e.to_string())),
                };
                let out = brightness::scale(step.color, brightness.load(Ordering::Relaxed));
                let res = driver.lock().await.apply(out).await;
                if let Err(e) = res {
                    break Outcome::Fault(RunFault::Hardware(e.to_string()));
                }
                shared.lock().unwrap().displayed = Some(out);
                if step.done {
                    break Outcome::Done;
                }
            }
        }
    };
    match outcome {
        Outcome::Cancelled => debug!("Effect loop cancelled"),
        Outcome::Done => {
            debug!("Effect finished");
            shared.lock().unwrap().state = LoopState::Idle;
        }
        Outcome::Fault(fault) => {
            error!("Effect run failed: {}", fault);
            if let Err(e) = driver.lock().await.release().await {
                error!("Failed to release PWM port: {}", e);
            }
            let mut shared = shared.lock().unwrap();
            shared.displayed = Some(color::BLACK);
            shared.fault = Some(fault);
            shared.state = LoopState::Idle;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::drivers::dummy::dummy::{DummyDriver, DummyHandle};
    use crate::effect::{FadeParams, EffectSpec, Step, StrategyFault};
    use crate::profiles::ProfileSchedule;

    struct Steady {
        color: Color,
        period: Duration,
    }

    fn steady(color: Color) -> Box<Steady> {
        Box::new(Steady {
            color,
            period: Duration::from_millis(10),
        })
    }

    impl Strategy for Steady {
        fn step(&mut self, _elapsed: Duration) -> Result<Step, StrategyFault> {
            Ok(Step {
                color: self.color,
                done: false,
            })
        }
        fn period(&self) -> Duration {
            self.period
        }
    }

    struct Failing;

    impl Strategy for Failing {
        fn step(&mut self, _elapsed: Duration) -> Result<Step, StrategyFault> {
            Err(StrategyFault("bad interpolation input".to_string()))
        }
        fn period(&self) -> Duration {
            Duration::from_millis(10)
        }
    }

    fn runner_with_dummy() -> (EffectRunner, DummyHandle) {
        let (driver, handle) = DummyDriver::with_handle();
        let driver: SyncDriver = Arc::new(Mutex::new(Box::new(driver)));
        let brightness = Arc::new(AtomicU8::new(100));
        (EffectRunner::new(driver, brightness), handle)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(80)).await;
    }

    #[tokio::test]
    async fn stop_when_idle_is_a_noop() {
        let (runner, handle) = runner_with_dummy();
        runner.stop().await.unwrap();
        assert_eq!(runner.status(), RunnerStatus::Idle);
        assert!(handle.writes().is_empty());
    }

    #[tokio::test]
    async fn no_writes_after_stop_returns() {
        let (runner, handle) = runner_with_dummy();
        runner
            .start("steady", steady(color::RED))
            .await
            .unwrap();
        settle().await;
        runner.stop().await.unwrap();
        let frozen = handle.writes().len();
        assert!(frozen > 0);
        settle().await;
        assert_eq!(handle.writes().len(), frozen);
        assert_eq!(runner.status(), RunnerStatus::Idle);
        // The port keeps the last intentional write, not a blackout.
        assert_eq!(handle.applied(), Some(color::RED));
    }

    #[tokio::test]
    async fn replacement_leaves_exactly_one_loop() {
        let (runner, handle) = runner_with_dummy();
        runner
            .start("red", steady(color::RED))
            .await
            .unwrap();
        settle().await;
        runner
            .start("green", steady(color::GREEN))
            .await
            .unwrap();
        let after_swap = handle.writes().len();
        settle().await;
        let writes = handle.writes();
        assert!(writes.len() > after_swap, "New loop never ticked");
        // No leaked ticks: every write after the swap is the new strategy's.
        for color in &writes[after_swap..] {
            assert_eq!(*color, color::GREEN);
        }
        match runner.status() {
            RunnerStatus::Running { effect, .. } => assert_eq!(effect, "green"),
            other => panic!("Expected running status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn finite_effect_self_terminates() {
        let (runner, handle) = runner_with_dummy();
        let spec = EffectSpec::Fade(FadeParams {
            from: color::BLACK,
            to: color::WHITE,
            duration_ms: 100,
        });
        let strategy = spec.build(&ProfileSchedule::default()).unwrap();
        runner.start("fade", strategy).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(runner.status(), RunnerStatus::Idle);
        assert_eq!(handle.applied(), Some(color::WHITE));
        assert!(runner.last_fault().is_none());
    }

    #[tokio::test]
    async fn strategy_fault_releases_the_port() {
        let (runner, handle) = runner_with_dummy();
        runner.start("failing", Box::new(Failing)).await.unwrap();
        settle().await;
        assert_eq!(runner.status(), RunnerStatus::Idle);
        assert!(handle.released());
        assert_eq!(handle.applied(), Some(color::BLACK));
        assert!(matches!(runner.last_fault(), Some(RunFault::Strategy(_))));
        // The fault is cleared by the next start
        runner
            .start("steady", steady(color::BLUE))
            .await
            .unwrap();
        assert!(runner.last_fault().is_none());
        runner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn brightness_scales_loop_output() {
        let (driver, handle) = DummyDriver::with_handle();
        let driver: SyncDriver = Arc::new(Mutex::new(Box::new(driver)));
        let brightness = Arc::new(AtomicU8::new(50));
        let runner = EffectRunner::new(driver, brightness);
        runner
            .start("steady", steady(color::WHITE))
            .await
            .unwrap();
        settle().await;
        runner.stop().await.unwrap();
        assert_eq!(handle.applied(), Some(Color::new(128, 128, 128)));
    }

    #[tokio::test]
    async fn stop_latency_stays_within_two_periods() {
        let (runner, _handle) = runner_with_dummy();
        let period = Duration::from_millis(200);
        runner
            .start(
                "steady",
                Box::new(Steady {
                    color: color::RED,
                    period,
                }),
            )
            .await
            .unwrap();
        settle().await;
        // Cancellation must not wait out the tick sleep.
        let begin = Instant::now();
        runner.stop().await.unwrap();
        assert!(begin.elapsed() < 2 * period);
    }
}
