use crate::base::color::Color;
use crate::drivers::driver::{DriverInfo, OpenError, PwmDriver, PwmError};
use crate::error::DynFuture;
use log::debug;
use std::collections::HashMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// Command word of the pigpiod socket interface for setting a PWM duty cycle
// (gpioPWM). Requests and replies are four little-endian u32 words; the last
// word of the reply is the signed result.
const CMD_PWM: u32 = 5;

const DEFAULT_PORT: u16 = 8888;

/// Client for the pigpiod daemon's socket interface.
///
/// The connection is opened lazily on the first write so that constructing
/// the driver never blocks.
pub struct PigpioDriver {
    addr: String,
    pins: [u8; 3],
    stream: Option<TcpStream>,
    closed: bool,
}

impl PigpioDriver {
    pub fn new(host: &str, port: u16, red: u8, green: u8, blue: u8) -> PigpioDriver {
        PigpioDriver {
            addr: format!("{}:{}", host, port),
            pins: [red, green, blue],
            stream: None,
            closed: false,
        }
    }

    async fn stream(&mut self) -> Result<&mut TcpStream, PwmError> {
        if self.closed {
            return Err(PwmError::Closed);
        }
        if self.stream.is_none() {
            debug!("Connecting to pigpiod at {}", self.addr);
            self.stream = Some(TcpStream::connect(&self.addr).await?);
        }
        Ok(self.stream.as_mut().unwrap())
    }

    async fn command(&mut self, cmd: u32, p1: u32, p2: u32) -> Result<i32, PwmError> {
        let stream = self.stream().await?;
        let mut request = [0u8; 16];
        request[0..4].copy_from_slice(&cmd.to_le_bytes());
        request[4..8].copy_from_slice(&p1.to_le_bytes());
        request[8..12].copy_from_slice(&p2.to_le_bytes());
        stream.write_all(&request).await?;
        let mut reply = [0u8; 16];
        stream.read_exact(&mut reply).await?;
        let res = i32::from_le_bytes([reply[12], reply[13], reply[14], reply[15]]);
        if res < 0 {
            return Err(PwmError::Protocol(format!(
                "pigpiod returned error {} for command {}",
                res, cmd
            )));
        }
        Ok(res)
    }

    async fn write_channels(&mut self, duty: [u8; 3]) -> Result<(), PwmError> {
        for (pin, value) in self.pins.into_iter().zip(duty) {
            self.command(CMD_PWM, u32::from(pin), u32::from(value)).await?;
        }
        Ok(())
    }
}

impl PwmDriver for PigpioDriver {
    fn apply(&mut self, color: Color) -> DynFuture<'_, Result<(), PwmError>> {
        Box::pin(async move {
            self.write_channels([color.red, color.green, color.blue])
                .await
        })
    }

    fn release(&mut self) -> DynFuture<'_, Result<(), PwmError>> {
        Box::pin(async move {
            let res = self.write_channels([0, 0, 0]).await;
            self.stream = None;
            self.closed = true;
            res
        })
    }
}

fn pin_param(params: &HashMap<String, String>, name: &'static str) -> Result<u8, OpenError> {
    let value = params
        .get(name)
        .ok_or(OpenError::MissingParameter(name))?;
    value
        .parse::<u8>()
        .ok()
        .filter(|pin| (1..=40).contains(pin))
        .ok_or_else(|| OpenError::InvalidParameter(name, value.clone()))
}

fn driver_open(params: &HashMap<String, String>) -> Result<Box<dyn PwmDriver>, OpenError> {
    let red = pin_param(params, "red_pin")?;
    let green = pin_param(params, "green_pin")?;
    let blue = pin_param(params, "blue_pin")?;
    let host = params
        .get("host")
        .map(String::as_str)
        .unwrap_or("localhost");
    let port = match params.get("port") {
        Some(p) => p
            .parse::<u16>()
            .map_err(|_| OpenError::InvalidParameter("port", p.clone()))?,
        None => DEFAULT_PORT,
    };
    Ok(Box::new(PigpioDriver::new(host, port, red, green, blue)))
}

pub fn driver_info() -> DriverInfo {
    DriverInfo {
        name: "pigpio".to_string(),
        description: "RGB output through the pigpiod daemon's socket interface.".to_string(),
        open: driver_open,
    }
}
