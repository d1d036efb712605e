use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{
    sources::Credentials,
    transcode::{Rendition, SocialConfig},
    types::{Platform, Quality},
};

macro_rules! arg_env {
    ($v:literal) => {
        concat!("CLIPSCRAPE_", $v)
    };
}

/// Find and download the most viewed clips from streaming platforms.
/// Download, rank, and optionally derive social-media renditions.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// Log verbosity (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = arg_env!("LOG"))]
    pub log: tracing::Level,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape and download the top clips for a creator,
    /// or for `all` the cross-platform trending clips
    Scrape(ScrapeArgs),

    /// Print a sample environment file with every supported variable
    Config,

    /// Show download statistics and history
    Stats {
        /// The output directory whose history to inspect
        #[arg(short, long, default_value = "./downloads", env = arg_env!("OUT"))]
        out: PathBuf,
    },

    /// Clear the download history, allowing previously downloaded clips
    /// to be downloaded again
    ClearHistory {
        /// The output directory whose history to clear
        #[arg(short, long, default_value = "./downloads", env = arg_env!("OUT"))]
        out: PathBuf,

        /// Skip the confirmation prompt and clear immediately
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(clap::Args, Debug)]
pub struct ScrapeArgs {
    /// Creator name to scrape clips for, or `all` for the top trending
    /// clips across the selected platforms
    pub subject: String,

    /// Platforms to scrape
    #[arg(
        short,
        long,
        value_delimiter = ',',
        default_values = ["twitch", "kick"],
        env = arg_env!("PLATFORMS")
    )]
    pub platforms: Vec<Platform>,

    /// Number of unique clips to download
    #[arg(short, long, default_value_t = 10, env = arg_env!("LIMIT"))]
    pub limit: usize,

    /// Output directory for downloaded clips
    #[arg(short, long, default_value = "./downloads", env = arg_env!("OUT"))]
    pub out: PathBuf,

    /// Video quality: `best`, or a height ceiling such as 720 or 1080
    #[arg(short, long, default_value_t = Quality::Best, env = arg_env!("QUALITY"))]
    pub quality: Quality,

    /// Minimum view count for clips
    #[arg(long, default_value_t = 0, env = arg_env!("MIN_VIEWS"))]
    pub min_views: u64,

    /// Do not create social media renditions of downloaded clips
    #[arg(long = "no-social", env = arg_env!("NO_SOCIAL"))]
    pub no_social: bool,

    /// Social media renditions to create
    #[arg(
        long,
        value_delimiter = ',',
        default_values = ["square", "vertical"],
        env = arg_env!("SOCIAL_FORMATS")
    )]
    pub social_formats: Vec<Rendition>,

    /// Maximum duration for social media renditions, in seconds
    #[arg(long, default_value_t = 59.0, env = arg_env!("SOCIAL_DURATION"))]
    pub social_duration: f64,

    /// Hard-crop renditions instead of compositing over a blurred backdrop
    #[arg(long, env = arg_env!("NO_BACKGROUND_BLUR"))]
    pub no_background_blur: bool,

    /// Foreground scale factor for the blurred-background composition
    #[arg(long, default_value_t = 1.0, env = arg_env!("VIDEO_SCALE"))]
    pub video_scale: f64,

    /// Twitch application client id
    #[arg(long, env = arg_env!("TWITCH_CLIENT_ID"), hide_env_values = true)]
    pub twitch_client_id: Option<String>,

    /// Twitch application client secret
    #[arg(long, env = arg_env!("TWITCH_CLIENT_SECRET"), hide_env_values = true)]
    pub twitch_client_secret: Option<String>,

    /// YouTube Data API key
    #[arg(long, env = arg_env!("YOUTUBE_API_KEY"), hide_env_values = true)]
    pub youtube_api_key: Option<String>,
}

impl ScrapeArgs {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            twitch_client_id: self.twitch_client_id.clone(),
            twitch_client_secret: self.twitch_client_secret.clone(),
            youtube_api_key: self.youtube_api_key.clone(),
        }
    }

    /// The rendition pipeline settings, or `None` when disabled.
    pub fn social_config(&self) -> Option<SocialConfig> {
        if self.no_social || self.social_formats.is_empty() {
            return None;
        }

        Some(SocialConfig {
            renditions: self.social_formats.clone(),
            max_duration: self.social_duration,
            background_blur: !self.no_background_blur,
            video_scale: self.video_scale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrape_defaults_cover_the_common_run() {
        let args = Args::parse_from(["clipscrape", "scrape", "all"]);
        let Command::Scrape(scrape) = args.command else {
            panic!("expected scrape");
        };

        assert_eq!(scrape.subject, "all");
        assert_eq!(scrape.platforms, vec![Platform::Twitch, Platform::Kick]);
        assert_eq!(scrape.limit, 10);
        assert_eq!(scrape.quality, Quality::Best);

        let social = scrape.social_config().unwrap();
        assert_eq!(social.renditions, vec![Rendition::Square, Rendition::Vertical]);
        assert_eq!(social.max_duration, 59.0);
        assert!(social.background_blur);
    }

    #[test]
    fn no_social_disables_the_rendition_pipeline() {
        let args = Args::parse_from(["clipscrape", "scrape", "all", "--no-social"]);
        let Command::Scrape(scrape) = args.command else {
            panic!("expected scrape");
        };
        assert!(scrape.social_config().is_none());
    }

    #[test]
    fn platform_and_format_lists_accept_comma_separation() {
        let args = Args::parse_from([
            "clipscrape",
            "scrape",
            "somecreator",
            "--platforms",
            "twitch,youtube",
            "--social-formats",
            "vertical",
        ]);
        let Command::Scrape(scrape) = args.command else {
            panic!("expected scrape");
        };

        assert_eq!(scrape.platforms, vec![Platform::Twitch, Platform::Youtube]);
        assert_eq!(
            scrape.social_config().unwrap().renditions,
            vec![Rendition::Vertical]
        );
    }
}
