use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    result::{Error, Result},
    types::{Clip, Platform, Subject},
};

use super::{parse_timestamp, rank_and_truncate, ClipSource};

const API_URL: &str = "https://kick.com/api/v2";

/// Kick serves public clips without authentication.
pub struct KickSource {
    client: Client,
    min_views: u64,
}

impl KickSource {
    pub fn new(min_views: u64) -> Self {
        Self {
            client: Client::new(),
            min_views,
        }
    }

    fn get<T: serde::de::DeserializeOwned>(&self, url: &str, limit: usize) -> Result<T> {
        self.client
            .get(url)
            .query(&[("limit", limit.to_string())])
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|_| Error::SourceUnavailable {
                platform: Platform::Kick.to_string(),
            })
    }

    /// Merge several trending endpoints; they overlap, so dedup by clip id.
    fn trending_clips(&self, limit: usize) -> Result<Vec<Clip>> {
        let endpoints = [
            format!("{API_URL}/clips/trending"),
            format!("{API_URL}/clips/featured"),
            format!("{API_URL}/clips"),
        ];

        let mut raw: Vec<RawClip> = Vec::new();
        let mut any_succeeded = false;
        for endpoint in &endpoints {
            match self.get::<ClipsPage>(endpoint, (limit * 2).min(100)) {
                Ok(page) => {
                    any_succeeded = true;
                    raw.extend(page.data);
                }
                Err(_) => warn!("Failed to fetch from {endpoint}"),
            }
        }

        if !any_succeeded {
            return Err(Error::SourceUnavailable {
                platform: Platform::Kick.to_string(),
            });
        }

        let mut seen = std::collections::BTreeSet::new();
        raw.retain(|clip| seen.insert(clip.id.to_key()));

        Ok(rank_and_truncate(
            raw.into_iter().map(RawClip::into_clip).collect(),
            self.min_views,
            limit,
        ))
    }

    fn creator_clips(&self, username: &str, limit: usize) -> Result<Vec<Clip>> {
        let channel: RawChannelInfo = self
            .client
            .get(format!("{API_URL}/channels/{username}"))
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|_| Error::SubjectNotFound {
                platform: Platform::Kick.to_string(),
                subject: username.to_owned(),
            })?;

        let page: ClipsPage = self.get(
            &format!("{API_URL}/channels/{}/clips", channel.id),
            limit.min(50),
        )?;

        Ok(rank_and_truncate(
            page.data.into_iter().map(RawClip::into_clip).collect(),
            self.min_views,
            limit,
        ))
    }
}

impl ClipSource for KickSource {
    fn platform(&self) -> Platform {
        Platform::Kick
    }

    fn fetch_top_clips(&self, subject: &Subject, limit: usize) -> Result<Vec<Clip>> {
        debug!("Fetching {subject} from kick");

        match subject {
            Subject::Trending => self.trending_clips(limit),
            Subject::Creator(username) => self.creator_clips(username, limit),
        }
    }
}

// Kick wire shapes, private to this adapter.

#[derive(Deserialize)]
struct ClipsPage {
    #[serde(default)]
    data: Vec<RawClip>,
}

#[derive(Deserialize)]
struct RawChannelInfo {
    id: u64,
}

/// Kick returns numeric clip ids; stringified at this boundary so the
/// canonical key stays a plain string triple.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Num(u64),
    Str(String),
}

impl RawId {
    fn to_key(&self) -> String {
        match self {
            RawId::Num(n) => n.to_string(),
            RawId::Str(s) => s.clone(),
        }
    }
}

#[derive(Deserialize)]
struct RawClip {
    id: RawId,
    title: Option<String>,
    #[serde(default)]
    views: u64,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    thumbnail_url: String,
    channel: Option<RawChannel>,
}

#[derive(Deserialize)]
struct RawChannel {
    username: Option<String>,
    slug: Option<String>,
}

impl RawClip {
    fn into_clip(self) -> Clip {
        let id = self.id.to_key();
        let slug = self
            .channel
            .as_ref()
            .and_then(|c| c.slug.clone())
            .unwrap_or_default();
        let creator = self
            .channel
            .as_ref()
            .and_then(|c| c.username.clone().or_else(|| c.slug.clone()))
            .unwrap_or_else(|| "Unknown".to_owned());

        Clip {
            source_url: format!("https://kick.com/{slug}/clips/{id}"),
            title: self.title.unwrap_or_else(|| "Untitled Clip".to_owned()),
            view_count: self.views,
            duration_seconds: self.duration,
            created_at: parse_timestamp(&self.created_at),
            thumbnail_url: self.thumbnail_url,
            creator,
            platform: Platform::Kick,
            id,
        }
    }
}
