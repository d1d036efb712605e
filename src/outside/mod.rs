mod command;
mod ffmpeg;
mod ytdl;

pub use ffmpeg::{Ffmpeg, MediaInfo, TranscodeEngine};
pub use ytdl::{MediaFetcher, Ytdl};
