use crossbeam_channel::unbounded;
use tracing::{debug, info, warn};

use crate::{
    result::Error,
    sources::ClipSource,
    types::{Clip, Subject},
};

/// Minimum per-platform fetch for trending runs. Inflated so that enough
/// cross-platform variety survives the final truncation.
const TRENDING_MIN_FETCH: usize = 20;

/// Merges every adapter's ranked clips into one globally ranked sequence.
pub struct RankingAggregator<'a> {
    sources: &'a [Box<dyn ClipSource>],
}

impl<'a> RankingAggregator<'a> {
    pub fn new(sources: &'a [Box<dyn ClipSource>]) -> Self {
        Self { sources }
    }

    /// Fetch from every platform, skip `offset` per platform, and return the
    /// top `limit` clips of the merged ranking.
    ///
    /// A failing platform is logged and contributes nothing; truncation
    /// happens only after the full merge-and-sort so low-volume platforms
    /// are not deprioritized before ranking.
    pub fn aggregate(&self, subject: &Subject, limit: usize, offset: usize) -> Vec<Clip> {
        info!("Searching for top {subject} (offset: {offset})");

        // Fetch past the offset; adapters apply the offset as a skip on
        // their already-limit-bounded result sequence
        let per_platform_limit = match subject {
            Subject::Trending => (limit + offset).max(TRENDING_MIN_FETCH),
            Subject::Creator(_) => limit + offset,
        };

        // Platform fetches are independent, so issue them concurrently
        let (send, receive) = unbounded();
        std::thread::scope(|scope| {
            for (idx, source) in self.sources.iter().enumerate() {
                let send = send.clone();
                scope.spawn(move || {
                    let res = source.fetch_top_clips(subject, per_platform_limit);
                    // The receiver outlives every sender
                    send.send((idx, res)).unwrap();
                });
            }
        });
        drop(send);

        // Put the batches back in configuration order so the merge is
        // deterministic regardless of completion order
        let mut batches: Vec<_> = receive.iter().collect();
        batches.sort_by_key(|(idx, _)| *idx);

        let mut merged = Vec::new();
        for (idx, res) in batches {
            let platform = self.sources[idx].platform();
            match res {
                Ok(clips) => {
                    let skipped: Vec<Clip> = clips.into_iter().skip(offset).collect();
                    debug!("Found {} clips from {platform} (after offset)", skipped.len());
                    merged.extend(skipped);
                }
                Err(Error::SubjectNotFound { platform, subject }) => {
                    warn!("Creator '{subject}' not found on {platform}, skipping that platform");
                }
                Err(err) => {
                    let report = miette::Report::from(err);
                    warn!("Error fetching clips from {platform}: {report}");
                }
            }
        }

        // Stable sort: clips with equal view counts keep their input order
        merged.sort_by(|a, b| b.view_count.cmp(&a.view_count));
        merged.truncate(limit);

        info!("Total clips found: {}", merged.len());
        merged
    }
}
