pub mod bootstrap;
pub mod client;
pub mod config;
pub mod env;
pub mod logging;

pub use bootstrap::{bootstrap, Bootstrap};
pub use client::{ApiVersion, CacheDirective, HelperError, RequestHelper, ResponseBody};
pub use config::{Environment, RunConfig, Settings};
