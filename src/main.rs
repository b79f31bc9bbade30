use anyhow::{Context, Result};
use clap::Parser;
use pagein::classifier::{AccessClassifier, Describe};
use pagein::registry::PageRegistry;
use pagein::{cli::Cli, replay, report, symbolize};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let describer: Arc<dyn Describe> = match &cli.binary {
        Some(path) => Arc::new(
            symbolize::DwarfDescriber::load(path)
                .with_context(|| format!("Failed to load symbols from {}", path.display()))?,
        ),
        None => Arc::new(symbolize::HexDescriber),
    };

    let registry = Arc::new(PageRegistry::new());
    let classifier = AccessClassifier::new(registry.clone(), describer);

    let events = replay::replay_file(&cli.trace, &classifier)
        .with_context(|| format!("Failed to replay {}", cli.trace.display()))?;
    tracing::debug!(events, pages = registry.len(), "replay complete");

    let report_path = match cli.output {
        Some(path) => path,
        None => {
            let base_dir = match cli.output_dir {
                Some(dir) => dir,
                None => std::env::current_dir().context("Failed to resolve working directory")?,
            };
            report::default_report_path(&base_dir)
        }
    };

    // Export failure is non-fatal by contract; it logs and returns.
    report::export(registry.snapshot(), &report_path);

    Ok(())
}
