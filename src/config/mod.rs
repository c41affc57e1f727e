mod environment;
mod loader;

pub use environment::{
    EnvSelection, Environment, RunConfig, ALL_MODULES, DEFAULT_REPORT_DIR, MAX_FAILURES,
    VAR_ENVIRONMENT, VAR_MAX_FAILURES, VAR_MODULE, VAR_REPORT_DIR, VAR_SETTINGS_MODULE,
};
pub use loader::{load_settings, settings_path, Settings, SETTINGS_ROOT_VAR};
