use std::fmt::Display;

use time::OffsetDateTime;

use super::Platform;

/// A normalized clip record, independent of the platform it came from.
///
/// Raw API payload shapes stay inside their source adapter; only this type
/// crosses into the pipeline.
#[derive(Debug, Clone)]
pub struct Clip {
    /// Source-assigned identifier, unique only within its platform
    pub id: String,
    pub title: String,
    /// Resolvable by the media fetcher
    pub source_url: String,
    /// Primary ranking key
    pub view_count: u64,
    pub duration_seconds: f64,
    pub created_at: OffsetDateTime,
    pub thumbnail_url: String,
    pub creator: String,
    pub platform: Platform,
}

impl Clip {
    /// The canonical deduplication key.
    ///
    /// `id` alone is insufficient: different platforms may reuse numeric ids,
    /// so the key spans `(platform, id, creator)`.
    pub fn ledger_key(&self) -> String {
        format!("{}:{}:{}", self.platform, self.id, self.creator)
    }
}

/// What an acquisition run is looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// Top trending clips across the whole platform
    Trending,
    /// Top clips of a specific creator
    Creator(String),
}

impl Subject {
    /// The CLI uses the literal `all` for platform-wide trending clips.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("all") {
            Subject::Trending
        } else {
            Subject::Creator(s.to_owned())
        }
    }
}

impl Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subject::Trending => f.write_str("trending clips across platforms"),
            Subject::Creator(name) => write!(f, "clips for creator '{name}'"),
        }
    }
}

/// Test fixture shared by the pipeline's unit tests.
#[cfg(test)]
pub fn sample_clip(id: &str, creator: &str, platform: Platform, view_count: u64) -> Clip {
    Clip {
        id: id.to_owned(),
        title: format!("clip {id}"),
        source_url: format!("https://example.com/{id}"),
        view_count,
        duration_seconds: 30.0,
        created_at: time::macros::datetime!(2024-05-01 12:00 UTC),
        thumbnail_url: String::new(),
        creator: creator.to_owned(),
        platform,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_key_spans_platform_id_and_creator() {
        let clip = sample_clip("1234", "streamer", Platform::Kick, 10);
        assert_eq!(clip.ledger_key(), "kick:1234:streamer");

        // Same numeric id on another platform must produce a different key
        let other = sample_clip("1234", "streamer", Platform::Twitch, 10);
        assert_ne!(clip.ledger_key(), other.ledger_key());
    }

    #[test]
    fn subject_parses_the_all_literal() {
        assert_eq!(Subject::parse("all"), Subject::Trending);
        assert_eq!(Subject::parse("All"), Subject::Trending);
        assert_eq!(
            Subject::parse("pokimane"),
            Subject::Creator("pokimane".to_owned())
        );
    }
}
