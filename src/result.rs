use std::fmt::Display;

use miette::miette;

/// Recoverable failures of the acquisition pipeline.
///
/// Every variant except [`Error::Miette`] is expected to be matched on
/// somewhere: a single platform or clip failing must degrade the run,
/// not abort it.
#[derive(Debug)]
pub enum Error {
    /// A platform's fetch failed entirely. That platform contributes nothing.
    SourceUnavailable { platform: String },

    /// A specific creator could not be found on a platform.
    /// Treated like [`Error::SourceUnavailable`] for that platform.
    SubjectNotFound { platform: String, subject: String },

    /// Media retrieval failed for one clip. The clip is skipped.
    FetchFailed { title: String },

    /// The transcode input could not be inspected.
    /// Aborts that clip's renditions only.
    ProbeFailed { path: String },

    /// One output rendition failed. The others are still attempted.
    RenditionFailed { rendition: &'static str },

    Miette(miette::Report),
}

impl From<miette::Report> for Error {
    fn from(err: miette::Report) -> Self {
        Error::Miette(err)
    }
}

impl From<Error> for miette::Report {
    fn from(err: Error) -> Self {
        match err {
            Error::SourceUnavailable { platform } => miette!("Source {platform} is unavailable"),
            Error::SubjectNotFound { platform, subject } => {
                miette!("Creator '{subject}' not found on {platform}")
            }
            Error::FetchFailed { title } => miette!("Could not fetch media for clip '{title}'"),
            Error::ProbeFailed { path } => miette!("Could not probe media file '{path}'"),
            Error::RenditionFailed { rendition } => miette!("{rendition} rendition failed"),
            Error::Miette(err) => err,
        }
    }
}

impl Error {
    pub fn wrap_err_with<D, F>(self, f: F) -> Error
    where
        D: Display + Send + Sync + 'static,
        F: FnOnce() -> D,
    {
        match self {
            Error::Miette(report) => Error::Miette(report.wrap_err(f())),
            err => err,
        }
    }
}

pub fn bail<T>(msg: &'static str) -> Result<T> {
    Err(Error::Miette(miette!(msg)))
}

pub type Result<T> = std::result::Result<T, Error>;
