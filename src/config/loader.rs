use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::{
    config::RunConfig,
    env::{expand_placeholders, EnvMap},
};

/// Overrides the directory settings modules are resolved against.
pub const SETTINGS_ROOT_VAR: &str = "APIRIG_SETTINGS_ROOT";

#[derive(Debug, Clone, Deserialize)]
struct SettingsFile {
    #[serde(rename = "API_HOST")]
    api_host: String,
    #[serde(flatten)]
    extras: HashMap<String, Value>,
}

/// Key-value settings of the selected environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_host: String,
    pub module: &'static str,
    pub path: PathBuf,
    values: HashMap<String, Value>,
}

impl Settings {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }
}

/// `data.envtest.data_qa` lives at `<root>/data/envtest/data_qa.json`.
pub fn settings_path(root: &Path, module: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(module.split('.'));
    path.set_extension("json");
    path
}

pub fn load_settings(run: &RunConfig, root: &Path, env: &EnvMap) -> Result<Settings> {
    let Some(module) = run.settings_module() else {
        bail!("no test environment selected; pass --envtest or one of --stg/--dev/--prod");
    };

    let path = settings_path(root, module);
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("reading settings {} for {}", path.display(), module))?;
    let file: SettingsFile = serde_json::from_str(&contents)
        .with_context(|| format!("parsing settings {}", path.display()))?;

    let api_host = expand_placeholders(&file.api_host, env)
        .with_context(|| format!("expanding API_HOST in {}", path.display()))?;
    Url::parse(&api_host)
        .with_context(|| format!("API_HOST {api_host:?} in {} is not a URL", path.display()))?;

    Ok(Settings {
        api_host,
        module,
        path,
        values: file.extras,
    })
}
