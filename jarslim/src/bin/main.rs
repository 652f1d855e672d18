use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use jarslim::{
    shade,
    types::{ShadeEvent, StageProgress},
    ShadeConfig,
};

/// Shade and minify jars down to the classes reachable from a set of packages
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input jars, zips or class directories
    inputs: Vec<PathBuf>,

    /// Output jar
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Analysis report (defaults to <OUTPUT>.analysis.txt)
    #[arg(long)]
    analysis: Option<PathBuf>,

    /// Dotted package shaded classes are moved under
    #[arg(long)]
    shadow_package: Option<String>,

    /// Package whose classes are entry points
    #[arg(long = "keep", value_name = "PACKAGE")]
    keep: Vec<String>,

    /// Package whose classes and resources keep their names
    #[arg(long = "unshaded", value_name = "PACKAGE")]
    unshaded: Vec<String>,

    /// Package excluded from the entry points
    #[arg(long = "ignore", value_name = "PACKAGE")]
    ignore: Vec<String>,

    /// Package of platform classes that are never followed
    #[arg(long = "runtime", value_name = "PACKAGE")]
    runtime: Vec<String>,

    /// Skip re-parsing rewritten classes
    #[arg(long)]
    no_verify: bool,

    /// JSON config, command line values override it
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ShadeConfig> {
        let mut config = match &self.config {
            Some(path) => ShadeConfig::load(path)?,
            None => ShadeConfig::default(),
        };

        config.inputs.extend(self.inputs);
        if self.output.is_some() {
            config.output = self.output;
        }
        if self.analysis.is_some() {
            config.analysis = self.analysis;
        }
        if self.shadow_package.is_some() {
            config.shadow_package = self.shadow_package;
        }
        config.keep_packages.extend(self.keep);
        config.unshaded_packages.extend(self.unshaded);
        config.ignore_packages.extend(self.ignore);
        for package in self.runtime {
            if !config.runtime_packages.contains(&package) {
                config.runtime_packages.push(package);
            }
        }
        if self.no_verify {
            config.verify = false;
        }
        Ok(config)
    }
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(1000);
    let style = ProgressStyle::with_template("{spinner} {msg:20} [{bar:40}] {percent:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style.progress_chars("=> "));
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn show_progress(bar: &ProgressBar, event: ShadeEvent) {
    bar.set_message(event.stage.as_str());
    match event.progress {
        StageProgress::Unknown => bar.set_position(0),
        StageProgress::Percentage(value) => bar.set_position((value * 1000.0) as u64),
        StageProgress::Done => bar.set_position(1000),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jarslim=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            return ExitCode::FAILURE;
        }
    };

    let bar = progress_bar();
    let result = shade(&config, |event| show_progress(&bar, event));
    bar.finish_and_clear();

    match result {
        Ok(summary) => {
            println!("{} {}", "Shaded".green().bold(), summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!(
                "{} {:#}",
                "error:".red().bold(),
                anyhow::Error::from(err)
            );
            ExitCode::FAILURE
        }
    }
}
