use crate::content::{self, ContentKind};
use crate::header::{HEADER_SIZE, SECTION_DESC_SIZE, ascii_lossy, nul_terminated};
use crate::signinfo::SIGNINFO_MARKER;
use snafu::{OptionExt, Snafu};
use std::ops::Range;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Errors when reading the section descriptor table.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum TableError {
    #[snafu(display("descriptor #{num} is outside of the image"))]
    DescriptorOutOfBounds { num: usize },

    #[snafu(display("data of section #{num} ({size} bytes at 0x{offset:X}) is outside of the image"))]
    DataOutOfBounds {
        num: usize,
        offset: usize,
        size: usize,
    },
}

/// Scheme prefix carried by section paths (`file:/var/foo.xml`).
pub const FILE_SCHEME: &str = "file:";

pub const PATH_SIZE: usize = 256;
pub const LABEL_SIZE: usize = 92;

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub(crate) struct SectionDescRaw {
    item_crc: U32,            // 0x000
    stored_offset: U32,       // 0x004 - legacy, not used for layout
    data_size: U32,           // 0x008
    path: [u8; PATH_SIZE],    // 0x00C
    label: [u8; LABEL_SIZE],  // 0x10C
}

const _: () = assert!(size_of::<SectionDescRaw>() == SECTION_DESC_SIZE);

/// One section of an HWNP image.
///
/// The payload itself is not stored here; it lives in the image buffer at
/// [`Section::data_range()`].
#[derive(Debug, Clone)]
#[must_use]
pub struct Section {
    index: usize,
    item_crc: u32,
    stored_offset: u32,
    data_offset: usize,
    data_size: usize,
    path: String,
    label: String,
    content: ContentKind,
    text: Option<String>,
}

impl Section {
    /// Returns the position of this section in the descriptor table.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Returns the checksum stored in the descriptor.
    ///
    /// This value is kept verbatim and is never recomputed after an edit.
    #[must_use]
    pub const fn item_crc(&self) -> u32 {
        self.item_crc
    }

    /// Returns the offset stored in the descriptor. Informational only.
    #[must_use]
    pub const fn stored_offset(&self) -> u32 {
        self.stored_offset
    }

    /// Returns the computed offset of the payload within the image.
    #[must_use]
    pub const fn data_offset(&self) -> usize {
        self.data_offset
    }

    /// Returns the payload size, which is also the capacity of the slot.
    #[must_use]
    pub const fn data_size(&self) -> usize {
        self.data_size
    }

    #[must_use]
    pub const fn data_range(&self) -> Range<usize> {
        self.data_offset..(self.data_offset + self.data_size)
    }

    /// Returns the raw path, including any `file:` prefix.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the path with the `file:` prefix removed.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.strip_prefix(FILE_SCHEME).unwrap_or(&self.path)
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub const fn content(&self) -> ContentKind {
        self.content
    }

    /// Returns the decoded text view, if the payload has one.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Returns `true` if this is the signature manifest section.
    #[must_use]
    pub fn is_signinfo(&self) -> bool {
        self.path.contains(SIGNINFO_MARKER)
    }

    pub(crate) fn refresh_text(&mut self, data: &[u8]) {
        self.text = content::text_view(self.content, data);
    }
}

/// Rounds `offset` up to the next multiple of 4.
#[must_use]
pub const fn align4(offset: usize) -> usize {
    (offset + 3) & !3
}

/// Reads `count` descriptors and lays out their payloads.
///
/// Payloads are packed after the descriptor table in descriptor order, each
/// one starting on a 4-byte boundary.
pub(crate) fn read_table(image: &[u8], count: usize) -> Result<Vec<Section>, TableError> {
    let descriptors = (0..count)
        .map(|num| {
            let offset = HEADER_SIZE + num * SECTION_DESC_SIZE;
            image
                .get(offset..)
                .and_then(|raw| SectionDescRaw::read_from_prefix(raw).ok())
                .map(|(desc, _)| desc)
                .context(DescriptorOutOfBoundsSnafu { num })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut sections = Vec::with_capacity(count);
    let mut data_offset = HEADER_SIZE + count * SECTION_DESC_SIZE;

    for (num, desc) in descriptors.into_iter().enumerate() {
        let data_size = desc.data_size.get() as usize;
        let data = data_offset
            .checked_add(data_size)
            .and_then(|end| image.get(data_offset..end))
            .context(DataOutOfBoundsSnafu {
                num,
                offset: data_offset,
                size: data_size,
            })?;

        let path = ascii_lossy(nul_terminated(&desc.path));
        let label = ascii_lossy(nul_terminated(&desc.label));
        let file_name = path.strip_prefix(FILE_SCHEME).unwrap_or(&path);
        let (content, text) = content::classify(file_name, data);

        log::debug!(
            "section #{num}: {path} ({data_size} bytes at 0x{data_offset:X}, stored 0x{:X}) as {content}",
            desc.stored_offset.get()
        );

        sections.push(Section {
            index: num,
            item_crc: desc.item_crc.get(),
            stored_offset: desc.stored_offset.get(),
            data_offset,
            data_size,
            path,
            label,
            content,
            text,
        });

        data_offset = align4(data_offset + data_size);
    }

    Ok(sections)
}
