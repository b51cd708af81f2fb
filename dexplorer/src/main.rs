use std::{env, fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use dexplorer_analysis::{Analyser, Report};
use dexplorer_diffeq::{Model, OdeModel, Variable};
use dexplorer_models::{ModelConfig, ModelParameters};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use ron::ser::{PrettyConfig, to_string_pretty};
use serde::Serialize;

mod config;
use config::AnalysisConfig;

const PROGRESS_RESOLUTION: u64 = 1000;

#[derive(Debug, Parser)]
#[command(
    version,
    about = "Compare fixed-step ODE solvers against closed-form solutions",
    long_about = None
)]
struct Cli {
    /// Analysis configuration (.ron)
    config: Option<PathBuf>,
    /// Keep every trajectory in the report
    #[arg(long)]
    full: bool,
    /// Write the report to this file as RON
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// List the available models with their default parameters
    #[arg(long)]
    list_models: bool,
}

fn main() -> Result<()> {
    // Default log level to "warn", info lines would break the progress bar
    if env::var("RUST_LOG").is_err() {
        unsafe { env::set_var("RUST_LOG", "warn") }
    }
    pretty_env_logger::init();

    let cli = Cli::parse();
    if cli.list_models {
        return list_models();
    }

    let path = cli
        .config
        .context("no configuration file given, see --help")?;
    let mut config = AnalysisConfig::from_path(&path)?;
    config.full_report |= cli.full;
    let output = cli.output.as_deref();

    let result = match &config.model {
        ModelConfig::SimpleDrag(p) => run(p.model()?, &config, output),
        ModelConfig::Drag(p) => run(p.model()?, &config, output),
        ModelConfig::BrakedDrag(p) => run(p.model()?, &config, output),
        ModelConfig::Spring(p) => run(p.model()?, &config, output),
        ModelConfig::ViscousFriction(p) => run(p.model()?, &config, output),
        ModelConfig::SimpleCompression(p) => run(p.model()?, &config, output),
        ModelConfig::CrankshaftCompression(p) => run(p.model()?, &config, output),
    };
    if let Err(e) = result {
        error(&format!("analysis '{}' failed: {e:#}", config.name));
        std::process::exit(1);
    }
    Ok(())
}

fn run<M>(model: Model<M>, config: &AnalysisConfig, output: Option<&Path>) -> Result<()>
where
    M: OdeModel + 'static,
    M::Variable: Serialize,
{
    let analyser = Analyser::new(model);
    let handle = analyser.start(config.request()?)?;

    let bar = ProgressBar::new(PROGRESS_RESOLUTION);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {msg}",
        )?
        .progress_chars("=>-"),
    );
    // ends once the session drops its sender
    for progress in handle.progress().iter() {
        bar.set_position((progress.ratio * PROGRESS_RESOLUTION as f64).round() as u64);
        bar.set_message(progress.message);
    }
    bar.finish_and_clear();

    let report = handle.wait()?;
    info!("report '{}' created at {}", report.name(), report.created_at());
    print_report(&report)?;

    if let Some(path) = output {
        let text = to_string_pretty(&report, PrettyConfig::default())?;
        fs::write(path, text).with_context(|| format!("could not write {}", path.display()))?;
        success(&format!("Report saved to {}", path.display()));
    }
    Ok(())
}

fn print_report<V: Variable>(report: &Report<V>) -> Result<()> {
    println!("{}", report.name().bold());
    println!("{}", report.short_description());
    println!(
        "parameter range [{}, {}]",
        report.min_parameter(),
        report.max_parameter()
    );

    for solving_type in report.solving_types() {
        println!();
        println!("{}", solving_type.to_string().cyan().bold());
        for value in report.analysis_values(solving_type)? {
            let mae = match value.mean_absolute_error.defined() {
                Some(mae) => format_variable(&mae),
                None => "undefined".yellow().to_string(),
            };
            print!("  step {:<12} mae {}", value.parameter_step, mae);
            if let Some(trajectory) = &value.trajectory {
                print!("  ({} samples", trajectory.len());
                if let Some((parameter, variable)) = trajectory.last() {
                    print!(", last {} -> {}", parameter, format_variable(&variable));
                }
                print!(")");
            }
            println!();
        }
    }
    Ok(())
}

fn format_variable<V: Variable>(variable: &V) -> String {
    let components: Vec<String> = variable
        .components()
        .iter()
        .map(|c| format!("{c:.6e}"))
        .collect();
    match components.as_slice() {
        [single] => single.clone(),
        _ => format!("[{}]", components.join(", ")),
    }
}

fn list_models() -> Result<()> {
    for model in ModelConfig::all() {
        println!("{} ({})", model.variant().bold(), model.name());
        println!("  {}", model.short_description());
        println!("  {}", to_string_pretty(&model, PrettyConfig::default().compact_arrays(true))?);
        println!();
    }
    Ok(())
}

fn success(s: &str) {
    println!("{}", s.green())
}

fn error(s: &str) {
    eprintln!("{}", s.red())
}
