use std::{ffi::OsStr, fmt::Debug, path::Path};

use miette::miette;
use serde::Deserialize;

use crate::result::{Error, Result};

use super::command::{assert_success_command, run_expect_stdout, FFMPEG, FFPROBE, FFXXX_DEFAULT_ARGS};

/// Source media facts needed to plan a transcode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
}

/// Interface for the external transcoding engine.
///
/// Invoked twice per rendition: once to inspect the source, once to encode
/// with a filter-graph expression. Encode parameters other than the graph
/// and the duration cap are fixed and owned by the implementation.
pub trait TranscodeEngine: Sync + Debug {
    /// Inspect the source for duration and video dimensions.
    fn probe(&self, input: &Path) -> Result<MediaInfo>;

    /// Encode `input` through `filter_graph` into `output`,
    /// keeping at most `max_duration_seconds` of the source.
    fn encode(
        &self,
        input: &Path,
        filter_graph: &str,
        max_duration_seconds: f64,
        output: &Path,
    ) -> Result<()>;
}

/// Interface for the [ffmpeg/ffprobe](https://ffmpeg.org) programs
#[derive(Debug)]
pub struct Ffmpeg;

impl Ffmpeg {
    /// Verify that the `ffmpeg` and `ffprobe` binaries are reachable
    pub fn new() -> Result<Self> {
        assert_success_command(FFMPEG, |cmd| cmd.arg("-version"))?;
        assert_success_command(FFPROBE, |cmd| cmd.arg("-version"))?;

        Ok(Self)
    }
}

impl TranscodeEngine for Ffmpeg {
    fn probe(&self, input: &Path) -> Result<MediaInfo> {
        let output = run_expect_stdout(FFPROBE, |cmd| {
            cmd.args(FFXXX_DEFAULT_ARGS)
                .args(["-print_format", "json"])
                .arg("-show_format")
                .arg("-show_streams")
                .arg(input)
        })?;

        let probe: ProbeOutput = serde_json::from_str(&output)
            .map_err(|e| Error::Miette(miette!("Could not parse ffprobe JSON output: {e}")))?;

        let duration_seconds: f64 = probe
            .format
            .duration
            .parse()
            .map_err(|e| Error::Miette(miette!("Could not parse source duration: {e}")))?;

        let video = probe
            .streams
            .iter()
            .find(|s| s.codec_type == "video")
            .ok_or_else(|| Error::Miette(miette!("Source has no video stream")))?;

        match (video.width, video.height) {
            (Some(width), Some(height)) => Ok(MediaInfo {
                duration_seconds,
                width,
                height,
            }),
            _ => Err(Error::Miette(miette!(
                "Video stream is missing its dimensions"
            ))),
        }
    }

    fn encode(
        &self,
        input: &Path,
        filter_graph: &str,
        max_duration_seconds: f64,
        output: &Path,
    ) -> Result<()> {
        assert_success_command(FFMPEG, |cmd| {
            cmd.args(FFXXX_DEFAULT_ARGS)
                .arg("-y")
                .args([OsStr::new("-i"), input.as_os_str()])
                .args(["-t", &max_duration_seconds.to_string()])
                .args(["-filter_complex", filter_graph])
                .args(["-map", "[v]"])
                .args(["-map", "0:a?"])
                .args(["-c:v", "libx264"])
                .args(["-c:a", "aac"])
                .args(["-preset", "fast"])
                .args(["-crf", "23"])
                .arg(output)
        })
    }
}

/// Wire shapes of the ffprobe inspection output.
/// Kept private: only [MediaInfo] leaves this module.
#[derive(Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: String,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
}
