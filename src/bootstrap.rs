use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::{
    client::RequestHelper,
    config::{load_settings, RunConfig, Settings, SETTINGS_ROOT_VAR},
    env::{load_dotenv, EnvMap},
    logging,
};

/// What a test needs to talk to the selected environment.
pub struct Bootstrap {
    pub run: RunConfig,
    pub settings: Settings,
    pub helper: RequestHelper,
}

/// Reads the run configuration exported by the `apirig` launcher and resolves
/// the environment's settings.
///
/// Settings are looked up under `APIRIG_SETTINGS_ROOT`, or the current
/// directory when it is unset, and `.env` in that directory feeds placeholder
/// expansion.
pub fn bootstrap() -> Result<Bootstrap> {
    logging::init_for_tests();
    let root = match std::env::var_os(SETTINGS_ROOT_VAR) {
        Some(root) => PathBuf::from(root),
        None => std::env::current_dir().context("resolving settings root")?,
    };
    let dotenv = load_dotenv(&root)?;
    let run = RunConfig::from_env()?;
    bootstrap_with(run, &root, &dotenv)
}

pub fn bootstrap_with(run: RunConfig, root: &Path, env: &EnvMap) -> Result<Bootstrap> {
    let settings = load_settings(&run, root, env)?;
    log::info!(
        "using {} ({}) at {}",
        settings.module,
        settings.path.display(),
        settings.api_host
    );
    let helper = RequestHelper::from_settings(&settings);
    Ok(Bootstrap {
        run,
        settings,
        helper,
    })
}
