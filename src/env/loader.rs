use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::env::EnvMap;

pub const DOTENV_FILE: &str = ".env";

pub fn load_env_file_sync(path: &Path, env: &mut EnvMap) -> Result<PathBuf> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading env file {}", path.display()))?;
    let iter = dotenvy::from_read_iter(Cursor::new(content));

    for item in iter {
        let (key, value) = item.with_context(|| format!("parsing env file {}", path.display()))?;
        env.insert(key, value);
    }

    Ok(path.to_path_buf())
}

/// Reads `<dir>/.env` into a fresh map. A missing file is not an error.
pub fn load_dotenv(dir: &Path) -> Result<EnvMap> {
    let mut env = EnvMap::new();
    let path = dir.join(DOTENV_FILE);
    if path.is_file() {
        let loaded = load_env_file_sync(&path, &mut env)?;
        log::debug!("loaded {} variables from {}", env.len(), loaded.display());
    }
    Ok(env)
}

/// The `.env` entries whose keys the process environment does not already
/// define. Inherited variables always win.
pub fn unset_in_process(env: &EnvMap) -> EnvMap {
    env.iter()
        .filter(|(key, _)| std::env::var_os(key).is_none())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
