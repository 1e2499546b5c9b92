//! A library for parsing, editing and repacking HWNP firmware images.
//!
//! HWNP is the container format used by Huawei ONT/router firmware updates. An
//! image is a fixed 0x128-byte header, a table of 360-byte section
//! descriptors and a data region holding every section payload.
//!
//! # Features
//!
//! - Parse the header, the product ID list and the section table
//! - Classify section payloads (shell scripts, XML, flags, text, binaries)
//! - Edit the product ID list and section payloads within their fixed slots
//! - Neutralize the `signinfo` signature manifest and re-stamp its hashes
//! - Recompute the head CRC and write a loader-acceptable image
//!
//! # Example
//!
//! ```no_run
//! use hwnp::Image;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("firmware.bin")?;
//! let mut image = Image::new(bytes)?;
//!
//! println!("CRC valid: {}", image.crc_valid());
//! for section in image.sections() {
//!     println!("{:>3} {:<8} {}", section.index(), section.content(), section.path());
//! }
//!
//! image.set_product_ids(&["120", "130"])?;
//! image.save("firmware-modified.bin")?;
//! # Ok(())
//! # }
//! ```

use self::header::{HEAD_CRC_OFFSET, HwnpHeader, PRODUCT_ID_OFFSET, SECTION_DESC_SIZE};
use self::section::Section;
use self::signinfo::SigninfoReport;
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use std::path::{Path, PathBuf};

use format_error::*;

pub mod checksum;
pub mod content;
pub mod header;
pub mod section;
pub mod session;
pub mod signinfo;
pub mod upgrade_check;

pub use self::header::ProductIdError;

/// A parsed HWNP image.
///
/// The raw buffer is the single source of truth: sections only record where
/// their payload lives, and every edit is written straight into the buffer.
/// Editing requires a buffer that is also `AsMut<[u8]>`, such as `Vec<u8>`.
#[must_use]
pub struct Image<R: AsRef<[u8]>> {
    raw: R,
    header: HwnpHeader,
    sections: Vec<Section>,
    computed_crc: u32,
}

impl<R: AsRef<[u8]>> std::fmt::Debug for Image<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("header", &self.header)
            .field("section_count", &self.sections.len())
            .field("crc_valid", &self.crc_valid())
            .finish_non_exhaustive()
    }
}

impl<R: AsRef<[u8]>> Image<R> {
    /// Parses an image from raw bytes.
    ///
    /// A head CRC mismatch is not an error; check [`Image::crc_valid()`].
    ///
    /// # Errors
    ///
    /// Returns [`FormatError`] if the magic is missing or the header, the
    /// descriptor table or any payload does not fit into `raw`.
    pub fn new(raw: R) -> Result<Self, FormatError> {
        let bytes = raw.as_ref();
        let header = HwnpHeader::read(bytes).context(ReadHeaderFailedSnafu)?;

        if header.item_desc_size() as usize != SECTION_DESC_SIZE {
            log::warn!(
                "descriptor size is {} bytes, expected {SECTION_DESC_SIZE}",
                header.item_desc_size()
            );
        }

        let sections =
            section::read_table(bytes, header.item_count()).context(ReadTableFailedSnafu)?;
        let computed_crc = checksum::compute_head_crc(bytes);

        if computed_crc != header.head_crc() {
            log::debug!(
                "head CRC mismatch: stored 0x{:08X}, computed 0x{computed_crc:08X}",
                header.head_crc()
            );
        }

        Ok(Self {
            raw,
            header,
            sections,
            computed_crc,
        })
    }

    /// Returns a reference to the header.
    pub fn header(&self) -> &HwnpHeader {
        &self.header
    }

    /// Returns the product IDs currently stored in the image.
    #[must_use]
    pub fn product_ids(&self) -> &[String] {
        self.header.product_ids()
    }

    /// Returns all sections in descriptor order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Returns the section at `index`.
    #[must_use]
    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    #[must_use]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Finds a section by its file name (path without the `file:` prefix).
    #[must_use]
    pub fn find_section(&self, file_name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.file_name() == file_name)
    }

    /// Returns the signature manifest section, if the image has one.
    #[must_use]
    pub fn signinfo_section(&self) -> Option<&Section> {
        self.sections.iter().find(|s| s.is_signinfo())
    }

    /// Returns the current payload of `section`.
    ///
    /// # Panics
    ///
    /// Panics if `section` does not belong to this image.
    #[must_use]
    pub fn section_data(&self, section: &Section) -> &[u8] {
        &self.raw.as_ref()[section.data_range()]
    }

    /// Returns `true` if the stored head CRC matches the image contents.
    #[must_use]
    pub fn crc_valid(&self) -> bool {
        self.computed_crc == self.header.head_crc()
    }

    /// Returns the head CRC computed over the current contents.
    #[must_use]
    pub const fn computed_crc(&self) -> u32 {
        self.computed_crc
    }

    /// Returns the whole image buffer.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_ref()
    }

    /// Consumes the image and returns the underlying buffer.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.raw
    }
}

impl<R: AsRef<[u8]> + AsMut<[u8]>> Image<R> {
    /// Replaces the product ID list.
    ///
    /// # Errors
    ///
    /// Returns [`ProductIdError::TooLong`] if the encoded list exceeds the
    /// 260-byte window, or [`ProductIdError::InvalidIdentifier`] for an ID that
    /// cannot be stored. The image is unchanged on error.
    pub fn set_product_ids<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<(), ProductIdError> {
        let window = header::encode_product_ids(ids)?;

        self.raw.as_mut()[PRODUCT_ID_OFFSET..(PRODUCT_ID_OFFSET + window.len())]
            .copy_from_slice(&window);
        self.header.set_product_ids(window);
        self.refresh_crc();

        Ok(())
    }

    /// Replaces the payload of the section at `index`.
    ///
    /// Shorter data is zero-padded to the section size; sections never grow
    /// or shrink. Text views are refreshed from the new bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SectionDataError::TooLarge`] if `data` is longer than the
    /// section, or [`SectionDataError::NotFound`] for an unknown index. The
    /// image is unchanged on error.
    pub fn set_section_data(&mut self, index: usize, data: &[u8]) -> Result<(), SectionDataError> {
        let section = self
            .sections
            .get_mut(index)
            .context(section_data_error::NotFoundSnafu { index })?;

        ensure!(
            data.len() <= section.data_size(),
            section_data_error::TooLargeSnafu {
                index,
                len: data.len(),
                capacity: section.data_size(),
            }
        );

        let slot = &mut self.raw.as_mut()[section.data_range()];
        let (head, tail) = slot.split_at_mut(data.len());
        head.copy_from_slice(data);
        tail.fill(0);

        section.refresh_text(slot);
        self.refresh_crc();

        Ok(())
    }

    /// Zeroes the signature manifest header and re-stamps its hashes.
    ///
    /// Returns `None` if the image has no manifest section.
    pub fn patch_signinfo(&mut self) -> Option<SigninfoReport> {
        let report = signinfo::patch(self.raw.as_mut(), &self.sections)?;

        let manifest = &mut self.sections[report.section()];
        manifest.refresh_text(&self.raw.as_ref()[manifest.data_range()]);

        log::info!(
            "disabled signinfo in section #{} ({} hashes updated, {} unmatched)",
            report.section(),
            report.updated().len(),
            report.unmatched().len()
        );

        Some(report)
    }

    /// Recomputes the head CRC and stores it in the header.
    pub fn recalculate_crc(&mut self) -> u32 {
        let crc = checksum::compute_head_crc(self.raw.as_ref());
        self.raw.as_mut()[HEAD_CRC_OFFSET..(HEAD_CRC_OFFSET + 4)]
            .copy_from_slice(&crc.to_le_bytes());
        self.header.set_head_crc(crc);
        self.computed_crc = crc;
        crc
    }

    /// Prepares the buffer for writing.
    ///
    /// The manifest is patched first, then the head CRC is computed over the
    /// final bytes. This runs on every save whether or not anything changed.
    pub fn finalize(&mut self) -> Option<SigninfoReport> {
        let report = self.patch_signinfo();
        let crc = self.recalculate_crc();
        log::debug!("head CRC is now 0x{crc:08X}");
        report
    }

    /// Finalizes the image and writes it to `path`.
    ///
    /// The file is written directly, not through a temporary file. If the
    /// write fails the finalized buffer is kept and the save can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError::Write`] if the file cannot be written.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<Option<SigninfoReport>, SaveError> {
        let path = path.as_ref();
        let report = self.finalize();
        std::fs::write(path, self.raw.as_ref()).context(WriteSnafu { path })?;
        Ok(report)
    }

    fn refresh_crc(&mut self) {
        self.computed_crc = checksum::compute_head_crc(self.raw.as_ref());
    }
}

#[derive(Debug, Snafu)]
#[snafu(module)]
#[non_exhaustive]
pub enum FormatError {
    #[snafu(display("invalid HWNP header"))]
    ReadHeaderFailed { source: header::ReadError },

    #[snafu(display("invalid section table"))]
    ReadTableFailed { source: section::TableError },
}

#[derive(Debug, Snafu)]
#[snafu(module)]
#[non_exhaustive]
pub enum SectionDataError {
    #[snafu(display("no section #{index}"))]
    NotFound { index: usize },

    #[snafu(display(
        "data for section #{index} is too large ({len} > {capacity} bytes), sections cannot grow"
    ))]
    TooLarge {
        index: usize,
        len: usize,
        capacity: usize,
    },
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum SaveError {
    #[snafu(display("cannot write {}", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
