//! Library side of the `hwnp-util` tool.
//!
//! Opens HWNP images from disk and extracts their sections to a directory.
//!
//! # Example
//!
//! ```no_run
//! use hwnp_util::{SectionExtractor, SilentProgress, open_image};
//!
//! let image = unsafe { open_image("firmware.bin".as_ref()) }.expect("failed to open image");
//! let extractor = SectionExtractor::new(&image, SilentProgress, false);
//! extractor.extract("output/").expect("extraction failed");
//! ```

pub mod extract;
pub mod hexdump;
pub mod progress;

pub use self::extract::{ExtractError, SectionExtractor};
pub use self::progress::{ExtractProgress, SilentProgress};

#[cfg(feature = "cli")]
pub use self::progress::ConsoleProgress;

use hwnp::Image;
use snafu::{ResultExt, Snafu};
use std::path::{Path, PathBuf};

/// Errors that can occur when opening an image file from disk.
#[derive(Debug, Snafu)]
pub enum OpenImageError {
    #[snafu(display("failed to open {}", path.display()))]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to memory map {}", path.display()))]
    MmapFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to read {}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse HWNP image"))]
    ParseImage { source: hwnp::FormatError },
}

/// Opens an image using a read-only memory map.
///
/// # Safety
///
/// The caller must ensure the file is not modified or truncated while the
/// returned image is in use.
pub unsafe fn open_image(path: &Path) -> Result<Image<memmap2::Mmap>, OpenImageError> {
    let file = std::fs::File::open(path).context(OpenFileSnafu { path })?;
    let raw = unsafe { memmap2::Mmap::map(&file).context(MmapFileSnafu { path })? };
    Image::new(raw).context(ParseImageSnafu)
}

/// Reads an image into memory so it can be edited.
pub fn load_image(path: &Path) -> Result<Image<Vec<u8>>, OpenImageError> {
    let raw = std::fs::read(path).context(ReadFileSnafu { path })?;
    Image::new(raw).context(ParseImageSnafu)
}
