use snafu::Snafu;
use std::path::PathBuf;

/// Errors that can occur during section extraction.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ExtractError {
    #[snafu(display("section #{index} has an unsupported path {path:?}"))]
    UnsupportedPath { index: usize, path: String },

    #[snafu(display("cannot create directory {}: {source}", path.display()))]
    CreateDirectoryFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot create file {}: {source}", path.display()))]
    CreateFileFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot write to {}: {source}", path.display()))]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}
