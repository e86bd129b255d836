use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediascribe::cli::Cli;
use mediascribe::config::Config;
use mediascribe::fetch::{render_format_table, Fetcher, FetcherRegistry};
use mediascribe::job::LanguageHint;
use mediascribe::session::{Session, SessionOptions};
use mediascribe::transcribe::WhisperCliTranscriber;
use mediascribe::utils;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing
    let default_filter = if args.verbose {
        "mediascribe=debug"
    } else {
        "mediascribe=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().await?;

    // Check for required external tools (non-fatal)
    let missing_deps = utils::check_dependencies(&config).await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may still be reachable)");
    }

    let fetcher: Arc<dyn Fetcher> = Arc::new(FetcherRegistry::new(&config.tools.yt_dlp_path));

    if args.list_formats {
        for url in &args.sources {
            println!("\nAvailable formats for {}:", url);
            match fetcher.list_formats(url).await {
                Ok(formats) if formats.is_empty() => println!("No audio formats found"),
                Ok(formats) => print!("{}", render_format_table(&formats)),
                Err(e) => eprintln!("Error: {}", e),
            }
        }
        return Ok(());
    }

    let model = args
        .model
        .unwrap_or_else(|| config.tools.whisper_model.clone());
    let transcriber = Arc::new(WhisperCliTranscriber::new(
        &config.tools.whisper_path,
        &model,
    ));

    let options = SessionOptions {
        workers: args.workers.unwrap_or(config.app.max_workers),
        format_hint: args.format_id,
        language: LanguageHint::parse(
            args.language
                .as_deref()
                .or(config.app.default_language.as_deref()),
        ),
        output_base: args.output,
    };

    let session = Session::new(fetcher, transcriber, options)?;

    if args.interactive {
        session.run_interactive().await?;
        return Ok(());
    }

    let report = session.run_batch(&args.sources).await?;
    if report.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
