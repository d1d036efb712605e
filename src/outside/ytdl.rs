use std::{ffi::OsStr, path::Path};

use crate::{
    result::{bail, Result},
    types::Quality,
};

use super::command::{assert_success_command, YT_DL, YT_DLP};

/// Interface for retrieving a clip's media from its source URL.
///
/// The fetcher writes exactly one file matching the output template;
/// it is free to pick the container format (the `%(ext)s` placeholder).
pub trait MediaFetcher: Sync {
    fn fetch(&self, source_url: &str, output_template: &Path, quality: Quality) -> Result<()>;
}

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp) program
pub struct Ytdl {
    program: &'static str,
}

impl Ytdl {
    /// Verify that the `yt-dlp` or `youtube-dl` binaries are reachable
    pub fn new() -> Result<Self> {
        // Check `yt-dlp`
        if assert_success_command(YT_DLP, |cmd| cmd.arg("--version")).is_ok() {
            Ok(Self { program: YT_DLP })
        } else if assert_success_command(YT_DL, |cmd| cmd.arg("--version")).is_ok() {
            // Check `youtube-dl`
            Ok(Self { program: YT_DL })
        } else {
            bail("Neither yt-dlp nor youtube-dl found")
        }
    }
}

impl MediaFetcher for Ytdl {
    fn fetch(&self, source_url: &str, output_template: &Path, quality: Quality) -> Result<()> {
        assert_success_command(self.program, |cmd| {
            cmd.arg("-q")
                .args([OsStr::new("-o"), output_template.as_os_str()])
                .arg("--no-continue") // Or else fails when file already exists, even an empty one
                .args(["-f", &quality.format_selector()])
                .arg("--")
                .arg(source_url)
        })
    }
}
