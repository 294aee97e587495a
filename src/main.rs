use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use codec_bus::{Bench, BenchConfig, RunSummary};
use tokio_util::sync::CancellationToken;

mod args;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("codec_bus", log::LevelFilter::Info)
        .init();
}

#[tokio::main]
async fn main() -> ! {
    let cli = args::Cli::try_parse().unwrap_or_else(|e| {
        let code = if e.use_stderr() { 1 } else { 0 };
        let _ = e.print();
        std::process::exit(code);
    });

    init_logging();
    if let Err(e) = codec_bus::init() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if cli.list_codecs {
        for provider in codec_bus::codec::available() {
            println!("{}", provider);
        }
        std::process::exit(0);
    }

    let config = cli.to_config().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = run(config, cli.summary_json).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    std::process::exit(0);
}

async fn run(config: BenchConfig, summary_json: Option<PathBuf>) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let handle_cancel = cancel.clone();
    let mut handle = tokio::task::spawn_blocking(move || -> codec_bus::Result<RunSummary> {
        let mut bench = Bench::open(&config)?;
        let mut stdout = std::io::stdout().lock();
        bench.run(&handle_cancel, &mut stdout)?;
        let summary = bench.summary();
        bench.finish()?;
        Ok(summary)
    });

    let summary = loop {
        tokio::select! {
            result = &mut handle => {
                break result.context("benchmark task failed")??;
            },
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                log::info!("interrupted, stopping after the current frame");
                cancel.cancel();
            },
        }
    };

    log::info!(
        "{} frames, {} bytes in, {} bytes out{}",
        summary.frames,
        summary.input_bytes,
        summary.output_bytes,
        if summary.interrupted { " (interrupted)" } else { "" }
    );

    if let Some(path) = summary_json {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
        log::info!("summary written to {}", path.display());
    }
    Ok(())
}
