use crate::base::color::Color;
use crate::drivers::driver::{DriverInfo, OpenError, PwmDriver, PwmError};
use crate::error::DynFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct DummyState {
    applied: Option<Color>,
    writes: Vec<Color>,
    released: bool,
}

/// Driver without hardware. Remembers every applied value so tests and dry
/// runs can observe what would have reached the strip.
pub struct DummyDriver {
    state: Arc<Mutex<DummyState>>,
}

/// Observation handle for a [`DummyDriver`], shared with its creator.
#[derive(Clone)]
pub struct DummyHandle {
    state: Arc<Mutex<DummyState>>,
}

impl DummyDriver {
    pub fn new() -> DummyDriver {
        DummyDriver {
            state: Arc::new(Mutex::new(DummyState::default())),
        }
    }

    pub fn with_handle() -> (DummyDriver, DummyHandle) {
        let driver = DummyDriver::new();
        let handle = DummyHandle {
            state: driver.state.clone(),
        };
        (driver, handle)
    }
}

impl Default for DummyDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyHandle {
    /// The value currently held on the port.
    pub fn applied(&self) -> Option<Color> {
        self.state.lock().unwrap().applied
    }

    /// Every write in order, releases included as black.
    pub fn writes(&self) -> Vec<Color> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn released(&self) -> bool {
        self.state.lock().unwrap().released
    }
}

impl PwmDriver for DummyDriver {
    fn apply(&mut self, color: Color) -> DynFuture<'_, Result<(), PwmError>> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.lock().unwrap();
            state.applied = Some(color);
            state.writes.push(color);
            state.released = false;
            Ok(())
        })
    }

    fn release(&mut self) -> DynFuture<'_, Result<(), PwmError>> {
        let state = self.state.clone();
        Box::pin(async move {
            let mut state = state.lock().unwrap();
            state.applied = Some(crate::base::color::BLACK);
            state.writes.push(crate::base::color::BLACK);
            state.released = true;
            Ok(())
        })
    }
}

fn driver_open(_params: &HashMap<String, String>) -> Result<Box<dyn PwmDriver>, OpenError> {
    Ok(Box::new(DummyDriver::new()))
}

pub fn driver_info() -> DriverInfo {
    DriverInfo {
        name: "dummy".to_string(),
        description: "Dummy driver. Logs applied values without hardware.".to_string(),
        open: driver_open,
    }
}
