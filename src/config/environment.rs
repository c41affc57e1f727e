use std::{fmt, path::PathBuf, str::FromStr};

use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;

use crate::env::EnvMap;

pub const ALL_MODULES: &str = "All";
pub const MAX_FAILURES: u32 = 5;
pub const DEFAULT_REPORT_DIR: &str = "reports/test-results";

pub const VAR_ENVIRONMENT: &str = "APIRIG_ENVIRONMENT";
pub const VAR_SETTINGS_MODULE: &str = "APIRIG_SETTINGS_MODULE";
pub const VAR_MODULE: &str = "APIRIG_MODULE";
pub const VAR_MAX_FAILURES: &str = "APIRIG_MAX_FAILURES";
pub const VAR_REPORT_DIR: &str = "APIRIG_REPORT_DIR";

/// Deployment target a test run talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Environment {
    #[value(name = "LOCAL")]
    Local,
    #[value(name = "QA")]
    Qa,
    #[value(name = "STG")]
    Stg,
    #[value(name = "DEV")]
    Dev,
    #[value(name = "PROD")]
    Prod,
}

impl Environment {
    pub const ALL: [Environment; 5] = [
        Environment::Local,
        Environment::Qa,
        Environment::Stg,
        Environment::Dev,
        Environment::Prod,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Environment::Local => "LOCAL",
            Environment::Qa => "QA",
            Environment::Stg => "STG",
            Environment::Dev => "DEV",
            Environment::Prod => "PROD",
        }
    }

    pub fn settings_module(self) -> &'static str {
        match self {
            Environment::Local => "data.envtest.data_local",
            Environment::Qa => "data.envtest.data_qa",
            Environment::Stg => "data.envtest.data_stg",
            Environment::Dev => "data.envtest.data_dev",
            Environment::Prod => "data.envtest.data_prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        Environment::ALL
            .into_iter()
            .find(|env| env.name() == value)
            .ok_or_else(|| anyhow!("Unknown test environment: {value}"))
    }
}

/// The environment flags as given on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvSelection {
    pub envtest: Option<Environment>,
    pub stg: bool,
    pub dev: bool,
    pub prod: bool,
}

impl EnvSelection {
    /// Shortcut flags win over `--envtest`, in the order STG, DEV, PROD.
    pub fn resolve(&self) -> Option<Environment> {
        if self.stg {
            Some(Environment::Stg)
        } else if self.dev {
            Some(Environment::Dev)
        } else if self.prod {
            Some(Environment::Prod)
        } else {
            self.envtest
        }
    }
}

/// Configuration of one test run, fixed before the first request is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub environment: Option<Environment>,
    pub module: String,
    pub max_failures: u32,
    pub report_dir: Option<PathBuf>,
}

impl RunConfig {
    pub fn from_selection(selection: &EnvSelection, module: &str, with_report: bool) -> Self {
        let environment = selection.resolve();
        match environment {
            Some(env) => log::warn!("Running tests on {env} environment"),
            None => log::warn!("Running tests without a selected environment"),
        }

        Self {
            environment,
            module: module.to_string(),
            max_failures: MAX_FAILURES,
            report_dir: with_report.then(|| PathBuf::from(DEFAULT_REPORT_DIR)),
        }
    }

    pub fn settings_module(&self) -> Option<&'static str> {
        self.environment.map(Environment::settings_module)
    }

    pub fn runs_all_modules(&self) -> bool {
        self.module == ALL_MODULES
    }

    /// Variables handed to the test process.
    pub fn exports(&self) -> Vec<(&'static str, String)> {
        let mut vars = Vec::new();
        if let Some(env) = self.environment {
            vars.push((VAR_ENVIRONMENT, env.name().to_string()));
            vars.push((VAR_SETTINGS_MODULE, env.settings_module().to_string()));
        }
        vars.push((VAR_MODULE, self.module.clone()));
        vars.push((VAR_MAX_FAILURES, self.max_failures.to_string()));
        if let Some(dir) = &self.report_dir {
            vars.push((VAR_REPORT_DIR, dir.display().to_string()));
        }
        vars
    }

    pub fn from_env() -> Result<Self> {
        let vars: EnvMap = std::env::vars().collect();
        Self::from_env_map(&vars)
    }

    /// Rebuilds the configuration exported by [`RunConfig::exports`].
    pub fn from_env_map(vars: &EnvMap) -> Result<Self> {
        let environment = vars
            .get(VAR_ENVIRONMENT)
            .map(|name| name.parse::<Environment>())
            .transpose()?;

        if let Some(module) = vars.get(VAR_SETTINGS_MODULE) {
            match environment {
                Some(env) if env.settings_module() == module => {}
                Some(env) => bail!(
                    "{VAR_SETTINGS_MODULE}={module} does not belong to the {env} environment"
                ),
                None => bail!("{VAR_SETTINGS_MODULE} is set but {VAR_ENVIRONMENT} is not"),
            }
        }

        let max_failures = match vars.get(VAR_MAX_FAILURES) {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("parsing {VAR_MAX_FAILURES}={raw}"))?,
            None => MAX_FAILURES,
        };

        Ok(Self {
            environment,
            module: vars
                .get(VAR_MODULE)
                .cloned()
                .unwrap_or_else(|| ALL_MODULES.to_string()),
            max_failures,
            report_dir: vars.get(VAR_REPORT_DIR).map(PathBuf::from),
        })
    }
}
