mod kick;
mod twitch;
mod youtube;

pub use kick::KickSource;
pub use twitch::TwitchSource;
pub use youtube::YoutubeSource;

use miette::miette;
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};

use crate::{
    result::Result,
    types::{Clip, Platform, Subject},
};

/// Capability contract implemented once per platform.
///
/// Implementations must fail with a recoverable error, never by corrupting
/// shared state: a dead platform only costs its own contribution.
pub trait ClipSource: Sync {
    fn platform(&self) -> Platform;

    /// Top clips for the subject, sorted by view count descending,
    /// at most `limit` of them.
    fn fetch_top_clips(&self, subject: &Subject, limit: usize) -> Result<Vec<Clip>>;
}

/// Credentials a run may need, depending on the selected platforms.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub twitch_client_id: Option<String>,
    pub twitch_client_secret: Option<String>,
    pub youtube_api_key: Option<String>,
}

/// Build an adapter for every selected platform.
///
/// Missing mandatory credentials for an explicitly selected platform is the
/// only fatal condition of the pipeline.
pub fn build_sources(
    platforms: &[Platform],
    credentials: &Credentials,
    min_views: u64,
) -> miette::Result<Vec<Box<dyn ClipSource>>> {
    let mut sources: Vec<Box<dyn ClipSource>> = Vec::with_capacity(platforms.len());

    for &platform in platforms {
        match platform {
            Platform::Twitch => {
                let (id, secret) = credentials
                    .twitch_client_id
                    .as_ref()
                    .zip(credentials.twitch_client_secret.as_ref())
                    .ok_or_else(|| {
                        miette!(
                            "Twitch requires CLIPSCRAPE_TWITCH_CLIENT_ID and \
                             CLIPSCRAPE_TWITCH_CLIENT_SECRET. \
                             Run `clipscrape config` for a sample environment file"
                        )
                    })?;
                sources.push(Box::new(TwitchSource::new(id.clone(), secret.clone(), min_views)));
            }
            Platform::Kick => sources.push(Box::new(KickSource::new(min_views))),
            Platform::Youtube => {
                let key = credentials.youtube_api_key.as_ref().ok_or_else(|| {
                    miette!(
                        "YouTube requires CLIPSCRAPE_YOUTUBE_API_KEY. \
                         Run `clipscrape config` for a sample environment file"
                    )
                })?;
                sources.push(Box::new(YoutubeSource::new(key.clone(), min_views)));
            }
        }
    }

    Ok(sources)
}

/// Clips older than this are not worth ranking.
const RECENT_WINDOW_DAYS: i64 = 7;

/// RFC3339 start of the trending window, for APIs that filter by date.
fn recent_window_start() -> String {
    let start = OffsetDateTime::now_utc() - Duration::days(RECENT_WINDOW_DAYS);
    // The format of a known-valid timestamp cannot fail
    start.format(&Rfc3339).unwrap()
}

/// Parse a platform timestamp, falling back to the epoch on malformed input
/// so that one bad record does not sink the whole batch.
fn parse_timestamp(raw: &str) -> OffsetDateTime {
    OffsetDateTime::parse(raw, &Rfc3339).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

/// Shared post-processing: drop clips under the view floor, rank by views,
/// keep the top `limit`.
fn rank_and_truncate(mut clips: Vec<Clip>, min_views: u64, limit: usize) -> Vec<Clip> {
    clips.retain(|c| c.view_count >= min_views);
    clips.sort_by(|a, b| b.view_count.cmp(&a.view_count));
    clips.truncate(limit);
    clips
}
