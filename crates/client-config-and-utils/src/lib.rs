//! Configuration, paths and logging setup for the OpenPatent client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, HttpSettings, SessionSettings, DEFAULT_LOG_LEVEL, DEFAULT_SERVER_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
