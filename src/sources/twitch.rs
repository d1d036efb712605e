use std::sync::Mutex;

use miette::miette;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    result::{Error, Result},
    types::{Clip, Platform, Subject},
};

use super::{parse_timestamp, rank_and_truncate, recent_window_start, ClipSource};

const HELIX_URL: &str = "https://api.twitch.tv/helix";
const OAUTH_URL: &str = "https://id.twitch.tv/oauth2/token";

/// How many of the current top games to pull trending clips from
const TRENDING_GAMES: usize = 10;

pub struct TwitchSource {
    client: Client,
    client_id: String,
    client_secret: String,
    min_views: u64,
    /// App access token, acquired once before the first fetch
    token: Mutex<Option<String>>,
}

impl TwitchSource {
    pub fn new(client_id: String, client_secret: String, min_views: u64) -> Self {
        Self {
            client: Client::new(),
            client_id,
            client_secret,
            min_views,
            token: Mutex::new(None),
        }
    }

    /// Acquire an app access token through the client-credentials grant.
    fn authenticate(&self) -> Result<String> {
        let mut token = self.token.lock().unwrap();
        if let Some(token) = token.as_ref() {
            return Ok(token.clone());
        }

        let response: TokenResponse = self
            .client
            .post(OAUTH_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| Error::Miette(miette!("Could not authenticate with Twitch: {e}")))?;

        *token = Some(response.access_token.clone());
        Ok(response.access_token)
    }

    fn get<T: serde::de::DeserializeOwned>(
        &self,
        token: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        self.client
            .get(url)
            .header("Client-ID", &self.client_id)
            .bearer_auth(token)
            .query(query)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|_| Error::SourceUnavailable {
                platform: Platform::Twitch.to_string(),
            })
    }

    /// Trending = the most viewed clips of the current top games,
    /// over the recent window.
    fn trending_clips(&self, token: &str, limit: usize) -> Result<Vec<Clip>> {
        let games: Paged<RawGame> =
            self.get(token, &format!("{HELIX_URL}/games/top"), &[("first", "20")])?;

        let started_at = recent_window_start();
        let per_game = limit.min(20).to_string();

        let mut clips = Vec::new();
        for game in games.data.iter().take(TRENDING_GAMES) {
            let fetched: Result<Paged<RawClip>> = self.get(
                token,
                &format!("{HELIX_URL}/clips"),
                &[
                    ("game_id", game.id.as_str()),
                    ("first", per_game.as_str()),
                    ("started_at", started_at.as_str()),
                ],
            );

            match fetched {
                Ok(page) => clips.extend(page.data),
                // One dead game category should not sink the platform
                Err(_) => warn!("Failed to get Twitch clips for game {}", game.name),
            }
        }

        Ok(rank_and_truncate(
            clips.into_iter().map(RawClip::into_clip).collect(),
            self.min_views,
            limit,
        ))
    }

    fn creator_clips(&self, token: &str, login: &str, limit: usize) -> Result<Vec<Clip>> {
        let users: Paged<RawUser> =
            self.get(token, &format!("{HELIX_URL}/users"), &[("login", login)])?;

        let Some(user) = users.data.first() else {
            return Err(Error::SubjectNotFound {
                platform: Platform::Twitch.to_string(),
                subject: login.to_owned(),
            });
        };

        // Helix caps page sizes at 100
        let first = limit.min(100).to_string();
        let page: Paged<RawClip> = self.get(
            token,
            &format!("{HELIX_URL}/clips"),
            &[
                ("broadcaster_id", user.id.as_str()),
                ("first", first.as_str()),
                ("started_at", recent_window_start().as_str()),
            ],
        )?;

        Ok(rank_and_truncate(
            page.data.into_iter().map(RawClip::into_clip).collect(),
            self.min_views,
            limit,
        ))
    }
}

impl ClipSource for TwitchSource {
    fn platform(&self) -> Platform {
        Platform::Twitch
    }

    fn fetch_top_clips(&self, subject: &Subject, limit: usize) -> Result<Vec<Clip>> {
        let token = self.authenticate()?;
        debug!("Fetching {subject} from twitch");

        match subject {
            Subject::Trending => self.trending_clips(&token, limit),
            Subject::Creator(login) => self.creator_clips(&token, login, limit),
        }
    }
}

// Helix wire shapes, private to this adapter.

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct Paged<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct RawGame {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
}

#[derive(Deserialize)]
struct RawClip {
    id: String,
    title: String,
    url: String,
    view_count: u64,
    #[serde(default)]
    duration: f64,
    created_at: String,
    #[serde(default)]
    thumbnail_url: String,
    broadcaster_name: String,
}

impl RawClip {
    fn into_clip(self) -> Clip {
        Clip {
            id: self.id,
            title: self.title,
            source_url: self.url,
            view_count: self.view_count,
            duration_seconds: self.duration,
            created_at: parse_timestamp(&self.created_at),
            thumbnail_url: self.thumbnail_url,
            creator: self.broadcaster_name,
            platform: Platform::Twitch,
        }
    }
}
