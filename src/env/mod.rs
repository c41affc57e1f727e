use std::collections::HashMap;

pub type EnvMap = HashMap<String, String>;

mod loader;
mod placeholders;

pub use loader::{load_dotenv, load_env_file_sync, unset_in_process, DOTENV_FILE};
pub use placeholders::expand_placeholders;
