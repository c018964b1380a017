// Batch entry point: picks a full-body model image for every product row

use anyhow::Context;
use clap::Parser;
use lookbook_lib::core::config::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// JSON settings file; defaults are used when omitted
    #[clap(long, value_parser)]
    config: Option<PathBuf>,

    /// Input product CSV
    #[clap(long)]
    input: Option<PathBuf>,

    /// Output CSV path
    #[clap(long)]
    output: Option<PathBuf>,

    /// Name of the resolved image column
    #[clap(long)]
    column: Option<String>,

    /// Records processed concurrently
    #[clap(long)]
    workers: Option<usize>,

    /// Landmark visibility threshold
    #[clap(long)]
    threshold: Option<f32>,

    /// ONNX pose landmark model
    #[clap(long)]
    model: Option<PathBuf>,

    /// Write a JSON run report here
    #[clap(long)]
    report: Option<PathBuf>,

    /// Debug logging
    #[clap(short, long)]
    verbose: bool,

    /// Write the default settings file and exit
    #[clap(long, value_name = "FILE")]
    write_default_config: Option<PathBuf>,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(input) = &self.input {
            config.input_path = input.clone();
        }
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(column) = &self.column {
            config.output_column = column.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(threshold) = self.threshold {
            config.classifier.visibility_threshold = threshold;
        }
        if let Some(model) = &self.model {
            config.pose.model_path = model.clone();
        }
        if let Some(report) = &self.report {
            config.report_path = Some(report.clone());
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.verbose { "lookbook=debug,lookbook_lib=debug" } else { "lookbook=info,lookbook_lib=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    if let Some(path) = &args.write_default_config {
        Config::default()
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("Default settings written to {}", path.display());
        return Ok(());
    }

    let config = args.load_config()?;
    let outcome = lookbook_lib::run(&config).await.context("dataset update failed")?;

    let summary = &outcome.report.summary;
    tracing::info!(
        "Done: {} products, {} updated, {} unchanged",
        summary.total,
        summary.updated,
        summary.unchanged
    );
    if outcome.persisted.is_err() {
        tracing::error!(
            "Results were not saved to {}; the run completed but the output file is missing",
            config.output_path.display()
        );
    }

    Ok(())
}
