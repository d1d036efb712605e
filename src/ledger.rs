use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::types::Clip;

/// Fixed ledger location under the output root.
pub const LEDGER_FILE_NAME: &str = ".downloaded_clips.json";

/// Persistent set of already-downloaded clip keys.
///
/// The set is process-local and authoritative for the current run; the
/// backing file only has to survive between runs. A missing or corrupt file
/// is an empty ledger, never an error.
pub struct DownloadLedger {
    path: PathBuf,
    ids: BTreeSet<String>,
}

/// On-disk document shape, shared with earlier versions of the tool.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerFile {
    downloaded_ids: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    last_updated: OffsetDateTime,
    total_downloaded: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub struct LedgerStats {
    pub total: usize,
    pub per_platform: BTreeMap<String, usize>,
}

impl DownloadLedger {
    /// Reconstruct the ledger from the backing store under `output_root`.
    pub fn load(output_root: &Path) -> Self {
        let path = output_root.join(LEDGER_FILE_NAME);

        let ids = match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<LedgerFile>(&data) {
                Ok(file) => file.downloaded_ids.into_iter().collect(),
                Err(e) => {
                    warn!("Download history file is corrupt, starting fresh: {e}");
                    BTreeSet::new()
                }
            },
            Err(_) => {
                debug!("No download history at {}", path.display());
                BTreeSet::new()
            }
        };

        Self { path, ids }
    }

    pub fn is_known(&self, clip: &Clip) -> bool {
        self.ids.contains(&clip.ledger_key())
    }

    /// Record a downloaded clip. Idempotent: re-recording is a no-op.
    pub fn mark_downloaded(&mut self, clip: &Clip) {
        self.ids.insert(clip.ledger_key());
    }

    /// Durably write the full set to the backing store.
    ///
    /// Persistence failure is warned, not fatal: the in-memory state stays
    /// authoritative for the rest of the run.
    pub fn persist(&self) {
        let file = LedgerFile {
            downloaded_ids: self.ids.iter().cloned().collect(),
            last_updated: OffsetDateTime::now_utc(),
            total_downloaded: self.ids.len(),
        };

        let res = serde_json::to_string_pretty(&file)
            .map_err(std::io::Error::other)
            .and_then(|json| fs::write(&self.path, json));

        if let Err(e) = res {
            warn!("Could not save download history: {e}");
        }
    }

    /// Empty the set and persist immediately.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.persist();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn stats(&self) -> LedgerStats {
        let mut per_platform = BTreeMap::new();
        for id in &self.ids {
            // The platform is the first segment of the canonical key
            let platform = id.split(':').next().unwrap_or("unknown");
            *per_platform.entry(platform.to_owned()).or_insert(0) += 1;
        }

        LedgerStats {
            total: self.ids.len(),
            per_platform,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{sample_clip, Platform};

    #[test]
    fn missing_store_is_an_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DownloadLedger::load(dir.path());
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn corrupt_store_is_an_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LEDGER_FILE_NAME), "{not json").unwrap();

        let ledger = DownloadLedger::load(dir.path());
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn known_right_after_marking_and_unknown_across_key_permutations() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = DownloadLedger::load(dir.path());

        let clip = sample_clip("abc", "streamer", Platform::Twitch, 100);
        assert!(!ledger.is_known(&clip));

        ledger.mark_downloaded(&clip);
        assert!(ledger.is_known(&clip));

        // Any key component differing must miss
        assert!(!ledger.is_known(&sample_clip("abc", "streamer", Platform::Kick, 100)));
        assert!(!ledger.is_known(&sample_clip("abd", "streamer", Platform::Twitch, 100)));
        assert!(!ledger.is_known(&sample_clip("abc", "other", Platform::Twitch, 100)));

        // Marking again is a no-op
        ledger.mark_downloaded(&clip);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn persist_then_load_round_trips_the_key_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = DownloadLedger::load(dir.path());

        ledger.mark_downloaded(&sample_clip("a", "x", Platform::Twitch, 1));
        ledger.mark_downloaded(&sample_clip("b", "y", Platform::Kick, 2));
        ledger.persist();

        let reloaded = DownloadLedger::load(dir.path());
        assert_eq!(reloaded.ids, ledger.ids);
    }

    #[test]
    fn clear_empties_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = DownloadLedger::load(dir.path());
        ledger.mark_downloaded(&sample_clip("a", "x", Platform::Twitch, 1));
        ledger.persist();

        ledger.clear();
        assert_eq!(ledger.len(), 0);
        assert_eq!(DownloadLedger::load(dir.path()).len(), 0);
    }

    #[test]
    fn stats_count_per_platform_from_the_key_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = DownloadLedger::load(dir.path());
        ledger.mark_downloaded(&sample_clip("a", "x", Platform::Twitch, 1));
        ledger.mark_downloaded(&sample_clip("b", "x", Platform::Twitch, 1));
        ledger.mark_downloaded(&sample_clip("c", "y", Platform::Kick, 1));

        let stats = ledger.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.per_platform.get("twitch"), Some(&2));
        assert_eq!(stats.per_platform.get("kick"), Some(&1));
    }
}
