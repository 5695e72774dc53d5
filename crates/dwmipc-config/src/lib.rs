//! Configuration parsing for dwm-msg
//!
//! This crate parses the KDL configuration file that tells the `dwm-msg`
//! client where dwm's socket lives and how to behave when it goes away.

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{parse_config, parse_config_str, DEFAULT_CONFIG_PATH};
