use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tracing::{info, warn};

use crate::{
    outside::TranscodeEngine,
    result::{Error, Result},
};

/// A derived fixed-aspect output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Rendition {
    /// 1:1, for feed posts
    Square,
    /// 9:16, for shorts and reels
    Vertical,
}

impl Rendition {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Rendition::Square => (1080, 1080),
            Rendition::Vertical => (1080, 1920),
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Rendition::Square => "_square",
            Rendition::Vertical => "_vertical",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Rendition::Square => "square",
            Rendition::Vertical => "vertical",
        }
    }
}

/// Settings for the social rendition pipeline.
#[derive(Debug, Clone)]
pub struct SocialConfig {
    pub renditions: Vec<Rendition>,
    /// Cap on output duration, in seconds
    pub max_duration: f64,
    /// Compose the clip over a blurred copy of itself instead of hard cropping
    pub background_blur: bool,
    /// Foreground scale factor for the blurred-background composition
    pub video_scale: f64,
}

/// Derives social renditions from a downloaded clip.
///
/// Renditions are attempted independently; one failing does not cancel the
/// other, and the original file is never touched.
pub struct SocialRenderer<'a> {
    engine: &'a dyn TranscodeEngine,
    config: SocialConfig,
}

impl<'a> SocialRenderer<'a> {
    pub fn new(engine: &'a dyn TranscodeEngine, config: SocialConfig) -> Self {
        Self { engine, config }
    }

    /// Produce every configured rendition of `input`, returning the paths of
    /// the subset that succeeded.
    ///
    /// Probe failure aborts the whole job: no rendition is possible without
    /// the source dimensions.
    pub fn process(&self, input: &Path) -> Result<Vec<PathBuf>> {
        if self.config.renditions.is_empty() {
            return Ok(Vec::new());
        }

        info!(
            "Creating social media versions of {}",
            input.file_name().unwrap_or_default().to_string_lossy()
        );

        let media = self.engine.probe(input).map_err(|err| {
            let report = miette::Report::from(err);
            warn!("Could not probe source: {report}");
            Error::ProbeFailed {
                path: input.display().to_string(),
            }
        })?;

        let duration = media.duration_seconds.min(self.config.max_duration);

        let mut outputs = Vec::new();
        for &rendition in &self.config.renditions {
            match self.render(input, rendition, duration) {
                Ok(path) => outputs.push(path),
                Err(err) => {
                    let report = miette::Report::from(err);
                    warn!("Failed to create {} version: {report}", rendition.name());
                }
            }
        }

        if !outputs.is_empty() {
            info!("Created {} social media versions", outputs.len());
        }
        Ok(outputs)
    }

    fn render(&self, input: &Path, rendition: Rendition, duration: f64) -> Result<PathBuf> {
        let output = rendition_path(input, rendition);
        let (width, height) = rendition.dimensions();

        let graph = if self.config.background_blur {
            blurred_background_graph(width, height, self.config.video_scale)
        } else {
            crop_fill_graph(width, height)
        };

        self.engine
            .encode(input, &graph, duration, &output)
            .map_err(|err| {
                let report = miette::Report::from(err);
                warn!("Transcode engine failed: {report}");
                Error::RenditionFailed {
                    rendition: rendition.name(),
                }
            })?;

        Ok(output)
    }
}

/// Scale-and-crop the source to fill the target frame exactly.
/// Crop, not letterbox: no bars on any source aspect ratio.
fn crop_fill_graph(width: u32, height: u32) -> String {
    format!(
        "[0:v]scale={width}:{height}:force_original_aspect_ratio=increase,\
         crop={width}:{height}[v]"
    )
}

/// Split the source in two: a scaled/cropped, heavily blurred backdrop, and
/// a foreground copy scaled by the configured factor, centered on top.
/// Preserves more of the original frame than hard cropping.
fn blurred_background_graph(width: u32, height: u32, video_scale: f64) -> String {
    let scaled = (height as f64 * video_scale).round() as u32;
    format!(
        "[0:v]split=2[bg][fg];\
         [bg]scale={width}:{height}:force_original_aspect_ratio=increase,\
         crop={width}:{height},gblur=sigma=20[blurred];\
         [fg]scale=iw*min({width}/iw\\,{scaled}/ih):ih*min({width}/iw\\,{scaled}/ih)[scaled];\
         [blurred][scaled]overlay=(W-w)/2:(H-h)/2[v]"
    )
}

/// `clip.mp4` + square → `clip_square.mp4`, next to the source.
fn rendition_path(input: &Path, rendition: Rendition) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    input.with_file_name(format!("{stem}{}.{ext}", rendition.suffix()))
}
