pub mod driver;
pub mod driver_init;
pub use driver::add_driver;
pub use driver::driver_names;
pub use driver::open;
pub use driver_init::init;

pub mod dummy {
    pub mod dummy;
}

#[cfg(feature = "pigpio_driver")]
pub mod pigpio {
    pub mod pigpio;
}
