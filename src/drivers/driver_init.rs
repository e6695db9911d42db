use crate::drivers;
use drivers::driver::add_driver;
use drivers::dummy::dummy;
#[cfg(feature = "pigpio_driver")]
use drivers::pigpio::pigpio;

pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    add_driver(dummy::driver_info());
    #[cfg(feature = "pigpio_driver")]
    add_driver(pigpio::driver_info());
    Ok(())
}
