pub mod base {
    pub mod brightness;
    pub mod color;
}

pub mod config;
pub mod controller;
pub mod drivers;
pub mod effect;
pub mod error;
pub mod profiles;
pub mod runner;

#[cfg(feature = "httpd")]
pub mod httpd {
    pub mod httpd;
    pub mod web_server;
    pub use self::httpd::start;
    pub use self::web_server::{BuildPage, ServerConfig};
}
