use crate::base::color::Color;
use crate::error::DynFuture;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Capability to drive the three PWM channels of an RGB strip.
///
/// Only one component may write at a time; callers coordinate so that either
/// the effect loop or a direct static write owns the port, never both.
pub trait PwmDriver: Send {
    /// Apply the color as duty cycles on the R, G and B channels.
    fn apply(&mut self, color: Color) -> DynFuture<'_, Result<(), PwmError>>;

    /// Set all channels to zero and free any underlying handle.
    fn release(&mut self) -> DynFuture<'_, Result<(), PwmError>>;
}

#[derive(Debug)]
pub enum PwmError {
    Io(std::io::Error),
    Protocol(String),
    Closed,
}

impl std::error::Error for PwmError {}

impl fmt::Display for PwmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PwmError::Io(e) => write!(f, "PWM I/O error: {}", e),
            PwmError::Protocol(msg) => write!(f, "PWM protocol error: {}", msg),
            PwmError::Closed => write!(f, "PWM port is closed"),
        }
    }
}

impl From<std::io::Error> for PwmError {
    fn from(e: std::io::Error) -> PwmError {
        PwmError::Io(e)
    }
}

#[derive(Debug)]
pub enum OpenError {
    NotFound,
    MissingParameter(&'static str),
    InvalidParameter(&'static str, String),
}

impl std::error::Error for OpenError {}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpenError::NotFound => write!(f, "No such driver"),
            OpenError::MissingParameter(name) => {
                write!(f, "Driver parameter '{}' missing", name)
            }
            OpenError::InvalidParameter(name, value) => {
                write!(f, "Invalid value '{}' for driver parameter '{}'", value, name)
            }
        }
    }
}

pub struct DriverInfo {
    pub name: String,
    pub description: String,
    pub open: fn(&HashMap<String, String>) -> Result<Box<dyn PwmDriver>, OpenError>,
}

lazy_static! {
    static ref DRIVERS: Mutex<Vec<DriverInfo>> = Mutex::new(Vec::new());
}

pub fn add_driver(info: DriverInfo) {
    let mut drivers = DRIVERS.lock().unwrap();
    if !drivers.iter().any(|d| d.name == info.name) {
        drivers.push(info);
    }
}

pub fn driver_names() -> Vec<String> {
    DRIVERS.lock().unwrap().iter().map(|d| d.name.clone()).collect()
}

/// Open a registered driver by name. The parameter map carries the GPIO pin
/// assignment and any driver-specific settings from the configuration.
pub fn open(
    name: &str,
    params: &HashMap<String, String>,
) -> Result<Box<dyn PwmDriver>, OpenError> {
    let drivers = DRIVERS.lock().unwrap();
    let info = drivers
        .iter()
        .find(|d| d.name.eq_ignore_ascii_case(name))
        .ok_or(OpenError::NotFound)?;
    (info.open)(params)
}
