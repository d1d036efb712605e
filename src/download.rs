use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use miette::miette;
use regex::Regex;
use time::macros::format_description;
use tracing::{info, warn};

use crate::{
    ledger::DownloadLedger,
    outside::MediaFetcher,
    result::{Error, Result},
    types::{Clip, Quality},
};

/// Cap on sanitized title length, to respect filesystem path limits
const MAX_TITLE_LEN: usize = 100;

/// Downloads a clip's media to its deterministic on-disk location.
pub struct ClipDownloader<'a> {
    fetcher: &'a dyn MediaFetcher,
    output_root: &'a Path,
    quality: Quality,
}

impl<'a> ClipDownloader<'a> {
    pub fn new(fetcher: &'a dyn MediaFetcher, output_root: &'a Path, quality: Quality) -> Self {
        Self {
            fetcher,
            output_root,
            quality,
        }
    }

    /// Directory partition for a clip: `<output_root>/<creator>/<platform>/`
    fn clip_dir(&self, clip: &Clip) -> PathBuf {
        self.output_root
            .join(sanitize_filename(&clip.creator))
            .join(clip.platform.as_str())
    }

    /// Extension-less filename, stable across runs:
    /// `<sanitized-title>_<YYYY-MM-DD>_<platform>`
    fn file_stem(clip: &Clip) -> String {
        let date_format = format_description!("[year]-[month]-[day]");
        // Formatting a date with a fixed description cannot fail
        let date = clip.created_at.date().format(&date_format).unwrap();

        format!(
            "{}_{date}_{}",
            sanitize_filename(&clip.title),
            clip.platform
        )
    }

    /// Download one clip, returning its on-disk path.
    ///
    /// An already-known clip is a no-op that still resolves to the expected
    /// path, so callers treat skip and fresh download uniformly. The ledger
    /// is marked (and persisted) only after the media is actually on disk.
    pub fn download(&self, clip: &Clip, ledger: &mut DownloadLedger) -> Result<PathBuf> {
        let dir = self.clip_dir(clip);
        let stem = Self::file_stem(clip);

        if ledger.is_known(clip) {
            info!("Skipping already downloaded clip: {}", clip.title);
            return Ok(find_by_stem(&dir, &stem).unwrap_or_else(|| dir.join(&stem)));
        }

        fs::create_dir_all(&dir)
            .map_err(|e| Error::Miette(miette!("Could not create {}: {e}", dir.display())))?;

        info!("Downloading: {} by {}", clip.title, clip.creator);

        // The fetcher picks the container, so hand it a template and
        // locate the real file afterwards
        let template = dir.join(format!("{stem}.%(ext)s"));
        if let Err(err) = self.fetcher.fetch(&clip.source_url, &template, self.quality) {
            let report = miette::Report::from(err);
            warn!("Failed to download {}: {report}", clip.title);
            return Err(Error::FetchFailed {
                title: clip.title.clone(),
            });
        }

        let Some(path) = find_by_stem(&dir, &stem) else {
            warn!("Fetcher reported success but no file matches {stem}");
            return Err(Error::FetchFailed {
                title: clip.title.clone(),
            });
        };

        ledger.mark_downloaded(clip);
        ledger.persist();

        info!("Downloaded: {}", path.display());
        Ok(path)
    }
}

/// Replace filesystem-hostile characters, collapse whitespace runs,
/// and cap the length.
pub fn sanitize_filename(name: &str) -> String {
    static HOSTILE: OnceLock<Regex> = OnceLock::new();
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();

    let hostile = HOSTILE.get_or_init(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").unwrap());

    let name = hostile.replace_all(name, "_");
    let name = whitespace.replace_all(&name, "_");
    name.chars().take(MAX_TITLE_LEN).collect()
}

/// Find the file whose name is `<stem>.<ext>` for any extension.
///
/// A plain prefix match would also catch this clip's renditions
/// (`<stem>_square.<ext>`), so the dot is required.
fn find_by_stem(dir: &Path, stem: &str) -> Option<PathBuf> {
    fs::read_dir(dir).ok()?.flatten().map(|e| e.path()).find(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(stem))
            .is_some_and(|rest| rest.starts_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::types::{sample_clip, Platform};

    struct MockFetcher {
        ext: &'static str,
        fail: bool,
        calls: Mutex<usize>,
    }

    impl MockFetcher {
        fn new(ext: &'static str) -> Self {
            Self {
                ext,
                fail: false,
                calls: Mutex::new(0),
            }
        }
    }

    impl MediaFetcher for MockFetcher {
        fn fetch(&self, _source_url: &str, output_template: &Path, _quality: Quality) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return crate::result::bail("mock failure");
            }

            let name = output_template
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .replace("%(ext)s", self.ext);
            fs::write(output_template.with_file_name(name), b"media").unwrap();
            Ok(())
        }
    }

    #[test]
    fn sanitization_removes_hostile_characters_and_caps_length() {
        let sanitized = sanitize_filename("a: b/c * d   e");
        assert_eq!(sanitized, "a__b_c___d_e");
        for c in ['<', '>', ':', '"', '/', '\\', '|', '?', '*', ' '] {
            assert!(!sanitized.contains(c));
        }

        let long = "x".repeat(500);
        assert_eq!(sanitize_filename(&long).chars().count(), MAX_TITLE_LEN);
    }

    #[test]
    fn fresh_download_lands_in_the_partitioned_layout() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MockFetcher::new("mp4");
        let mut ledger = DownloadLedger::load(dir.path());

        let clip = sample_clip("a", "streamer", Platform::Twitch, 100);
        let downloader = ClipDownloader::new(&fetcher, dir.path(), Quality::Best);
        let path = downloader.download(&clip, &mut ledger).unwrap();

        assert_eq!(
            path,
            dir.path()
                .join("streamer")
                .join("twitch")
                .join("clip_a_2024-05-01_twitch.mp4")
        );
        assert!(path.exists());
        assert!(ledger.is_known(&clip));
        // The ledger was persisted right after the download
        assert!(DownloadLedger::load(dir.path()).is_known(&clip));
    }

    #[test]
    fn known_clip_is_a_no_op_that_resolves_to_the_expected_path() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MockFetcher::new("mp4");
        let mut ledger = DownloadLedger::load(dir.path());

        let clip = sample_clip("a", "streamer", Platform::Twitch, 100);
        let downloader = ClipDownloader::new(&fetcher, dir.path(), Quality::Best);
        let first = downloader.download(&clip, &mut ledger).unwrap();
        let second = downloader.download(&clip, &mut ledger).unwrap();

        assert_eq!(first, second);
        assert_eq!(*fetcher.calls.lock().unwrap(), 1);
    }

    #[test]
    fn fetch_failure_leaves_the_ledger_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MockFetcher {
            fail: true,
            ..MockFetcher::new("mp4")
        };
        let mut ledger = DownloadLedger::load(dir.path());

        let clip = sample_clip("a", "streamer", Platform::Twitch, 100);
        let downloader = ClipDownloader::new(&fetcher, dir.path(), Quality::Best);

        assert!(matches!(
            downloader.download(&clip, &mut ledger),
            Err(Error::FetchFailed { .. })
        ));
        assert!(!ledger.is_known(&clip));
    }

    #[test]
    fn located_file_is_the_clip_not_one_of_its_renditions() {
        let dir = tempfile::tempdir().unwrap();
        let stem = "clip_2024-05-01_twitch";
        fs::write(dir.path().join(format!("{stem}_square.mp4")), b"").unwrap();
        fs::write(dir.path().join(format!("{stem}.mp4")), b"").unwrap();

        let found = find_by_stem(dir.path(), stem).unwrap();
        assert_eq!(found.file_name().unwrap(), format!("{stem}.mp4").as_str());
    }
}
