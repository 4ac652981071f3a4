//! Configuration, filesystem paths and logging bootstrap shared by the
//! biometric session runtime and tools.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_CANCEL_ON_HANDLE_DROP, DEFAULT_EVENT_QUEUE_CAPACITY, DEFAULT_LOG_LEVEL,
    LOG_LEVEL_ENV,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_for_service};
pub use paths::Paths;

pub use observability::{InitError, ObservabilityMode};
