mod acquisition;
mod aggregator;
mod cli;
mod download;
mod ledger;
mod logging;
mod outside;
mod result;
mod sources;
mod transcode;
mod types;

use std::path::Path;

use clap::Parser;
use indoc::indoc;
use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use tracing::info;

use crate::{
    acquisition::AcquisitionLoop,
    aggregator::RankingAggregator,
    cli::{Args, Command, ScrapeArgs},
    download::ClipDownloader,
    ledger::DownloadLedger,
    outside::{Ffmpeg, Ytdl},
    sources::build_sources,
    transcode::SocialRenderer,
    types::Subject,
};

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(args.log)?;

    match args.command {
        Command::Scrape(scrape) => run_scrape(&scrape),
        Command::Config => {
            print_sample_config();
            Ok(())
        }
        Command::Stats { out } => {
            print_stats(&out);
            Ok(())
        }
        Command::ClearHistory { out, confirm } => {
            clear_history(&out, confirm);
            Ok(())
        }
    }
}

fn run_scrape(args: &ScrapeArgs) -> Result<()> {
    let subject = Subject::parse(&args.subject);
    let sources = build_sources(&args.platforms, &args.credentials(), args.min_views)?;

    std::fs::create_dir_all(&args.out)
        .into_diagnostic()
        .wrap_err("Could not create out directory")?;

    let social = args.social_config();
    let (fetcher, engine) = load_external_components(social.is_some())?;

    let mut ledger = DownloadLedger::load(&args.out);
    info!("{} clips already downloaded", ledger.len());

    let renderer = match (&engine, social) {
        (Some(engine), Some(config)) => Some(SocialRenderer::new(engine, config)),
        _ => None,
    };

    let aggregator = RankingAggregator::new(&sources);
    let downloader = ClipDownloader::new(&fetcher, &args.out, args.quality);
    let outcome =
        AcquisitionLoop::new(aggregator, downloader, renderer.as_ref()).run(&subject, args.limit, &mut ledger);

    if outcome.files.is_empty() {
        println!("{}", "No clips were downloaded".yellow());
    } else {
        println!("{}", "Download complete!".green().bold());
        println!("Files saved to: {}", args.out.display());
        println!("Total files downloaded: {}", outcome.files.len());
        if outcome.exhausted {
            println!(
                "{}",
                format!(
                    "Only {} of {} requested clips were available",
                    outcome.files.len(),
                    outcome.requested
                )
                .yellow()
            );
        }
    }

    Ok(())
}

/// Load the external components.
///
/// The transcoding engine is only required (and only checked for) when
/// social renditions are enabled.
fn load_external_components(with_engine: bool) -> Result<(Ytdl, Option<Ffmpeg>)> {
    // Construct the handles concurrently as executing an external program
    // is not instantaneous
    let ytdl_thread = std::thread::spawn(Ytdl::new);
    let engine = if with_engine {
        Some(Ffmpeg::new()?)
    } else {
        None
    };
    let ytdl = ytdl_thread.join().expect("Could not join thread")?;

    Ok((ytdl, engine))
}

fn print_sample_config() {
    let sample = indoc! {"
        # Twitch API credentials
        # Get these from: https://dev.twitch.tv/console/apps
        CLIPSCRAPE_TWITCH_CLIENT_ID=your_twitch_client_id
        CLIPSCRAPE_TWITCH_CLIENT_SECRET=your_twitch_client_secret

        # YouTube Data API key
        # Get one from: https://console.cloud.google.com/apis/credentials
        CLIPSCRAPE_YOUTUBE_API_KEY=your_youtube_api_key

        # Kick does not require credentials for public clips
    "};

    println!("{}", "Sample environment configuration:".blue().bold());
    print!("{sample}");
    println!();
    println!(
        "{}",
        "Export these variables (or pass the equivalent flags) before scraping".yellow()
    );
}

fn print_stats(out: &Path) {
    let stats = DownloadLedger::load(out).stats();

    println!("{}", "Download statistics".blue().bold());
    println!("Total clips downloaded: {}", stats.total);

    if stats.per_platform.is_empty() {
        println!("{}", "No clips downloaded yet".dimmed());
    } else {
        println!("\n{}", "By platform:".cyan());
        for (platform, count) in &stats.per_platform {
            println!("  {platform}: {count} clips");
        }
    }
}

fn clear_history(out: &Path, confirm: bool) {
    if !confirm {
        println!(
            "{}",
            "This will clear the download history and allow re-downloading of all clips."
                .yellow()
        );
        println!("{}", "Run again with --confirm to proceed.".yellow());
        return;
    }

    let mut ledger = DownloadLedger::load(out);
    let cleared = ledger.len();
    ledger.clear();
    println!(
        "{}",
        format!("Cleared {cleared} entries from the download history").green()
    );
}
