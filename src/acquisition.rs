use std::path::PathBuf;

use tracing::{info, warn};

use crate::{
    aggregator::RankingAggregator, download::ClipDownloader, ledger::DownloadLedger,
    transcode::SocialRenderer, types::Subject,
};

/// Bound on fetch iterations; the only termination safety net against an
/// upstream that keeps serving already-seen clips.
pub const MAX_ATTEMPTS: usize = 10;

/// Over-fetch to absorb expected duplicate/already-downloaded attrition
const OVERFETCH_FACTOR: usize = 2;
/// Cap on one fetch window, bounding upstream API cost
const FETCH_LIMIT_CAP: usize = 50;

/// What an acquisition run produced.
///
/// A shortfall is not an error: running out of upstream supply is a normal
/// terminal state, reported as "found K of N".
#[derive(Debug)]
pub struct AcquisitionOutcome {
    pub files: Vec<PathBuf>,
    pub requested: usize,
    pub attempts: usize,
    pub exhausted: bool,
}

impl AcquisitionOutcome {
    pub fn is_complete(&self) -> bool {
        self.files.len() >= self.requested
    }
}

/// Orchestrates fetch → filter → download until enough unique,
/// not-previously-downloaded clips are collected or the retry budget runs out.
pub struct AcquisitionLoop<'a> {
    aggregator: RankingAggregator<'a>,
    downloader: ClipDownloader<'a>,
    renderer: Option<&'a SocialRenderer<'a>>,
}

impl<'a> AcquisitionLoop<'a> {
    pub fn new(
        aggregator: RankingAggregator<'a>,
        downloader: ClipDownloader<'a>,
        renderer: Option<&'a SocialRenderer<'a>>,
    ) -> Self {
        Self {
            aggregator,
            downloader,
            renderer,
        }
    }

    /// Collect `target` unique clips for the subject.
    ///
    /// Platform result orders are stable, so re-fetching without an offset
    /// would return the same clips forever. The offset advances only when
    /// attrition is observed, to avoid skipping clips unnecessarily.
    pub fn run(
        &self,
        subject: &Subject,
        target: usize,
        ledger: &mut DownloadLedger,
    ) -> AcquisitionOutcome {
        let mut collected = Vec::new();
        let mut offset = 0;
        let mut attempts = 0;

        info!("Searching for {target} unique clips");

        while collected.len() < target && attempts < MAX_ATTEMPTS {
            let remaining = target - collected.len();
            let fetch_limit = (remaining * OVERFETCH_FACTOR).min(FETCH_LIMIT_CAP);

            let clips = self.aggregator.aggregate(subject, fetch_limit, offset);
            if clips.is_empty() {
                info!("No more clips found matching the criteria");
                break;
            }

            let total_fetched = clips.len();
            let new_clips: Vec<_> = clips.into_iter().filter(|c| !ledger.is_known(c)).collect();

            if new_clips.is_empty() {
                info!(
                    "All {total_fetched} fetched clips have already been downloaded, \
                     trying next batch"
                );
                offset += fetch_limit;
                attempts += 1;
                continue;
            }

            let new_count = new_clips.len();
            info!(
                "New clips to download ({}/{remaining} needed)",
                new_count.min(remaining)
            );

            for clip in new_clips.into_iter().take(remaining) {
                info!(
                    "{}. {} ({} views | {} | {})",
                    collected.len() + 1,
                    clip.title,
                    clip.view_count,
                    clip.platform,
                    clip.creator
                );

                match self.downloader.download(&clip, ledger) {
                    Ok(path) => {
                        // Renditions are best-effort: a transcode failure
                        // never rolls back the download or the ledger entry
                        if let Some(renderer) = self.renderer {
                            if let Err(err) = renderer.process(&path) {
                                let report = miette::Report::from(err);
                                warn!("Could not create social renditions: {report}");
                            }
                        }
                        collected.push(path);
                    }
                    Err(err) => {
                        let report = miette::Report::from(err);
                        warn!("Skipping clip: {report}");
                    }
                }
            }

            // Attrition ate into this window; move past it so the next
            // iteration fetches fresh clips instead of re-covering these
            if new_count < remaining {
                offset += fetch_limit;
            }

            attempts += 1;
        }

        let exhausted = collected.len() < target;
        if exhausted {
            warn!(
                "Could only find {} unique clips out of {target} requested",
                collected.len()
            );
        } else {
            info!("Successfully found and downloaded {} unique clips", collected.len());
        }

        AcquisitionOutcome {
            files: collected,
            requested: target,
            attempts,
            exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path, sync::Mutex};

    use super::*;
    use crate::{
        outside::MediaFetcher,
        result::Result,
        sources::ClipSource,
        types::{sample_clip, Clip, Platform, Quality},
    };

    /// Serves a fixed ranked list, honoring limit like a real platform.
    struct FixedSource {
        clips: Vec<Clip>,
    }

    impl ClipSource for FixedSource {
        fn platform(&self) -> Platform {
            Platform::Twitch
        }

        fn fetch_top_clips(&self, _subject: &Subject, limit: usize) -> Result<Vec<Clip>> {
            Ok(self.clips.iter().take(limit).cloned().collect())
        }
    }

    struct WritingFetcher {
        calls: Mutex<Vec<String>>,
    }

    impl WritingFetcher {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl MediaFetcher for WritingFetcher {
        fn fetch(&self, source_url: &str, output_template: &Path, _quality: Quality) -> Result<()> {
            self.calls.lock().unwrap().push(source_url.to_owned());
            let name = output_template
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .replace("%(ext)s", "mp4");
            fs::write(output_template.with_file_name(name), b"media").unwrap();
            Ok(())
        }
    }

    fn run_loop(
        sources: &[Box<dyn ClipSource>],
        fetcher: &WritingFetcher,
        out: &Path,
        subject: &Subject,
        target: usize,
        ledger: &mut DownloadLedger,
    ) -> AcquisitionOutcome {
        let aggregator = RankingAggregator::new(sources);
        let downloader = ClipDownloader::new(fetcher, out, Quality::Best);
        AcquisitionLoop::new(aggregator, downloader, None).run(subject, target, ledger)
    }

    fn fixed(clips: Vec<Clip>) -> Vec<Box<dyn ClipSource>> {
        vec![Box::new(FixedSource { clips })]
    }

    #[test]
    fn downloads_only_the_unknown_clip() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = WritingFetcher::new();
        let mut ledger = DownloadLedger::load(dir.path());

        let known = sample_clip("x", "a", Platform::Twitch, 100);
        let fresh = sample_clip("y", "a", Platform::Twitch, 50);
        ledger.mark_downloaded(&known);

        let sources = fixed(vec![known, fresh.clone()]);
        let subject = Subject::Creator("a".into());
        let outcome = run_loop(&sources, &fetcher, dir.path(), &subject, 1, &mut ledger);

        assert!(outcome.is_complete());
        assert_eq!(*fetcher.calls.lock().unwrap(), vec![fresh.source_url]);
    }

    #[test]
    fn second_run_returns_different_clips_until_supply_is_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = WritingFetcher::new();
        let mut ledger = DownloadLedger::load(dir.path());

        let clips: Vec<Clip> = (0..4)
            .map(|i| sample_clip(&format!("c{i}"), "a", Platform::Twitch, 100 - i as u64))
            .collect();
        let sources = fixed(clips);
        let subject = Subject::Creator("a".into());

        let first = run_loop(&sources, &fetcher, dir.path(), &subject, 2, &mut ledger);
        let second = run_loop(&sources, &fetcher, dir.path(), &subject, 2, &mut ledger);
        assert!(first.is_complete());
        assert!(second.is_complete());

        // No repeats between the two runs
        let calls = fetcher.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 4);
        let unique: std::collections::BTreeSet<_> = calls.iter().collect();
        assert_eq!(unique.len(), 4);

        // Supply is now exhausted: a third run comes back short, as a
        // partial result rather than an error
        let third = run_loop(&sources, &fetcher, dir.path(), &subject, 2, &mut ledger);
        assert!(third.exhausted);
        assert!(third.files.is_empty());
    }

    #[test]
    fn empty_upstream_terminates_early() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = WritingFetcher::new();
        let mut ledger = DownloadLedger::load(dir.path());

        let sources = fixed(Vec::new());
        let subject = Subject::Trending;
        let outcome = run_loop(&sources, &fetcher, dir.path(), &subject, 3, &mut ledger);

        assert!(outcome.exhausted);
        assert_eq!(outcome.attempts, 0);
        assert!(outcome.files.is_empty());
    }

    #[test]
    fn attempts_are_bounded_when_everything_is_already_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = WritingFetcher::new();
        let mut ledger = DownloadLedger::load(dir.path());

        // A deep upstream where every clip is already in the ledger:
        // each window is non-empty but fully filtered away
        let pool: Vec<Clip> = (0..30)
            .map(|i| sample_clip(&format!("c{i}"), "a", Platform::Twitch, 100))
            .collect();
        for clip in &pool {
            ledger.mark_downloaded(clip);
        }
        let sources = fixed(pool);

        let subject = Subject::Trending;
        let outcome = run_loop(&sources, &fetcher, dir.path(), &subject, 1, &mut ledger);

        assert!(outcome.exhausted);
        assert_eq!(outcome.attempts, MAX_ATTEMPTS);
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }
}
