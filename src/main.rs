use std::process::{Command, ExitCode};

use anyhow::{bail, Context, Result};
use apirig::config::{EnvSelection, Environment, RunConfig, ALL_MODULES};
use apirig::env::{load_dotenv, unset_in_process};
use clap::Parser;
use colored::Colorize;

#[derive(Parser, Debug)]
#[command(
    name = "apirig",
    version,
    about = "Environment launcher for API integration tests",
    disable_help_subcommand = true
)]
struct Cli {
    /// Test environment
    #[arg(long, value_enum, value_name = "ENV")]
    envtest: Option<Environment>,

    /// Module to be tested
    #[arg(long, default_value = ALL_MODULES)]
    module: String,

    /// Run tests on staging environment
    #[arg(long)]
    stg: bool,

    /// Run tests on dev environment
    #[arg(long)]
    dev: bool,

    /// Run tests on production environment
    #[arg(long)]
    prod: bool,

    /// Do not set up the report directory
    #[arg(long)]
    no_report: bool,

    /// Print the exported variables and exit
    #[arg(long)]
    print_env: bool,

    /// Test command to run (defaults to `cargo nextest run --max-fail=5`)
    #[arg(last = true, value_name = "COMMAND")]
    command: Vec<String>,
}

impl Cli {
    fn selection(&self) -> EnvSelection {
        EnvSelection {
            envtest: self.envtest,
            stg: self.stg,
            dev: self.dev,
            prod: self.prod,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    apirig::logging::init();

    let run = RunConfig::from_selection(&cli.selection(), &cli.module, !cli.no_report);

    if cli.print_env {
        for (key, value) in run.exports() {
            println!("{key}={value}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let base_dir = std::env::current_dir()?;
    let dotenv = unset_in_process(&load_dotenv(&base_dir).context("loading .env")?);

    if let Some(dir) = &run.report_dir {
        let dir = base_dir.join(dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating report directory {}", dir.display()))?;
    }

    let command = test_command(&run, &cli.command);
    print_banner(&run, &command);

    let (program, args) = match command.split_first() {
        Some(parts) => parts,
        None => bail!("empty test command"),
    };
    let status = Command::new(program)
        .args(args)
        .current_dir(&base_dir)
        .envs(&dotenv)
        .envs(run.exports())
        .status()
        .with_context(|| format!("running {}", program))?;

    Ok(ExitCode::from(exit_status(status.code())))
}

/// `cargo nextest run` stopping after `max_failures`, filtered by module unless
/// every module runs. An explicit nextest command gets the threshold too when it
/// does not set one itself; any other command runs verbatim.
fn test_command(run: &RunConfig, explicit: &[String]) -> Vec<String> {
    let max_fail = format!("--max-fail={}", run.max_failures);
    if !explicit.is_empty() {
        let mut command = explicit.to_vec();
        if let Some(pos) = nextest_run_position(&command) {
            let sets_own = command[pos + 1..]
                .iter()
                .take_while(|arg| arg.as_str() != "--")
                .any(|arg| arg.starts_with("--max-fail") || arg == "--no-fail-fast");
            if !sets_own {
                command.insert(pos + 1, max_fail);
            }
        }
        return command;
    }
    let mut command = vec![
        "cargo".to_string(),
        "nextest".to_string(),
        "run".to_string(),
        max_fail,
    ];
    if !run.runs_all_modules() {
        command.push(run.module.clone());
    }
    command
}

/// Index of `run` in `cargo nextest run ...` or `cargo-nextest nextest run ...`.
fn nextest_run_position(command: &[String]) -> Option<usize> {
    let nextest = command.iter().position(|arg| arg == "nextest")?;
    let program = command.first()?;
    let launched_by_cargo = nextest == 1
        && std::path::Path::new(program)
            .file_stem()
            .is_some_and(|stem| stem == "cargo" || stem == "cargo-nextest");
    match command.get(nextest + 1) {
        Some(arg) if launched_by_cargo && (arg == "run" || arg == "r") => Some(nextest + 1),
        _ => None,
    }
}

/// Signals and out-of-range codes are reported as a plain failure.
fn exit_status(code: Option<i32>) -> u8 {
    code.and_then(|code| u8::try_from(code).ok()).unwrap_or(1)
}

fn print_banner(run: &RunConfig, command: &[String]) {
    let environment = run
        .environment
        .map(|env| env.name().yellow().bold().to_string())
        .unwrap_or_else(|| "none".red().bold().to_string());
    println!("{} {}", "Environment:".bold(), environment);
    if let Some(module) = run.settings_module() {
        println!("{} {}", "Settings:".bold(), module.cyan());
    }
    println!("{} {}", "Module:".bold(), run.module);
    println!(
        "{} {}",
        "Max failures:".bold(),
        run.max_failures.to_string().dimmed()
    );
    if let Some(dir) = &run.report_dir {
        println!("{} {}", "Reports:".bold(), dir.display().to_string().dimmed());
    }
    println!("{} {}", "Command:".bold(), command.join(" ").dimmed());
}
