use std::sync::OnceLock;

use regex::Regex;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    result::{Error, Result},
    types::{Clip, Platform, Subject},
};

use super::{parse_timestamp, rank_and_truncate, recent_window_start, ClipSource};

const API_URL: &str = "https://www.googleapis.com/youtube/v3";

pub struct YoutubeSource {
    client: Client,
    api_key: String,
    min_views: u64,
}

impl YoutubeSource {
    pub fn new(api_key: String, min_views: u64) -> Self {
        Self {
            client: Client::new(),
            api_key,
            min_views,
        }
    }

    fn get<T: serde::de::DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        self.client
            .get(format!("{API_URL}/{path}"))
            .query(query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|_| Error::SourceUnavailable {
                platform: Platform::Youtube.to_string(),
            })
    }

    /// Resolve a channel name to its id, first by username then by search.
    fn resolve_channel(&self, name: &str) -> Result<String> {
        let by_username: ItemsPage<ChannelItem> =
            self.get("channels", &[("part", "id"), ("forUsername", name)])?;
        if let Some(channel) = by_username.items.first() {
            return Ok(channel.id.clone());
        }

        let by_search: ItemsPage<SearchItem> = self.get(
            "search",
            &[
                ("part", "snippet"),
                ("type", "channel"),
                ("q", name),
                ("maxResults", "1"),
            ],
        )?;

        by_search
            .items
            .first()
            .and_then(|item| item.snippet.as_ref())
            .and_then(|snippet| snippet.channel_id.clone())
            .ok_or_else(|| Error::SubjectNotFound {
                platform: Platform::Youtube.to_string(),
                subject: name.to_owned(),
            })
    }
}

impl ClipSource for YoutubeSource {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    fn fetch_top_clips(&self, subject: &Subject, limit: usize) -> Result<Vec<Clip>> {
        debug!("Fetching {subject} from youtube");

        // Data API caps maxResults at 50
        let max_results = limit.min(50).to_string();
        let published_after = recent_window_start();

        let mut query = vec![
            ("part", "snippet".to_owned()),
            ("type", "video".to_owned()),
            ("order", "viewCount".to_owned()),
            ("maxResults", max_results),
            ("publishedAfter", published_after),
        ];

        if let Subject::Creator(name) = subject {
            query.push(("channelId", self.resolve_channel(name)?));
        }

        let query: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let search: ItemsPage<SearchItem> = self.get("search", &query)?;

        let video_ids: Vec<&str> = search
            .items
            .iter()
            .filter_map(|item| item.id.as_ref())
            .filter_map(|id| id.video_id.as_deref())
            .collect();
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }

        // The search endpoint has no statistics; a second lookup fills
        // in view counts and durations
        let videos: ItemsPage<VideoItem> = self.get(
            "videos",
            &[
                ("part", "snippet,statistics,contentDetails"),
                ("id", &video_ids.join(",")),
            ],
        )?;

        Ok(rank_and_truncate(
            videos.items.into_iter().map(VideoItem::into_clip).collect(),
            self.min_views,
            limit,
        ))
    }
}

/// Parse an ISO-8601 duration (`PT4M13S`) into seconds.
fn parse_iso8601_duration(raw: &str) -> f64 {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?").unwrap());

    let Some(cap) = re.captures(raw) else {
        return 0.0;
    };
    let part = |i| {
        cap.get(i)
            .map_or(0u64, |m| m.as_str().parse().unwrap_or(0))
    };

    (part(1) * 3600 + part(2) * 60 + part(3)) as f64
}

// Data API wire shapes, private to this adapter.

#[derive(Deserialize)]
struct ItemsPage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct ChannelItem {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    id: Option<SearchId>,
    snippet: Option<SearchSnippet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    video_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchSnippet {
    channel_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    statistics: VideoStatistics,
    content_details: ContentDetails,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    published_at: String,
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Deserialize, Default)]
struct Thumbnails {
    high: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    /// The API serves counters as strings
    #[serde(default)]
    view_count: String,
}

#[derive(Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
}

impl VideoItem {
    fn into_clip(self) -> Clip {
        let thumbnail_url = self
            .snippet
            .thumbnails
            .high
            .or(self.snippet.thumbnails.default)
            .map(|t| t.url)
            .unwrap_or_default();

        Clip {
            source_url: format!("https://www.youtube.com/watch?v={}", self.id),
            title: self.snippet.title,
            view_count: self.statistics.view_count.parse().unwrap_or(0),
            duration_seconds: parse_iso8601_duration(&self.content_details.duration),
            created_at: parse_timestamp(&self.snippet.published_at),
            thumbnail_url,
            creator: self.snippet.channel_title,
            platform: Platform::Youtube,
            id: self.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso8601_durations_convert_to_seconds() {
        assert_eq!(parse_iso8601_duration("PT4M13S"), 253.0);
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), 3723.0);
        assert_eq!(parse_iso8601_duration("PT45S"), 45.0);
        assert_eq!(parse_iso8601_duration("garbage"), 0.0);
    }
}
