use std::fmt;

use snafu::{Snafu, ensure};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{big_endian, little_endian::U32},
};

/// Errors when reading an HWNP header.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReadError {
    #[snafu(display("invalid HWNP magic"))]
    InvalidMagic,

    #[snafu(display("image is too small to hold an HWNP header"))]
    TooSmall,
}

/// Errors when encoding the product ID list.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ProductIdError {
    #[snafu(display("product ID list too long ({len} > {max} bytes)"))]
    TooLong { len: usize, max: usize },

    #[snafu(display("invalid product ID {id:?}: must be non-empty ASCII without '|'"))]
    InvalidIdentifier { id: String },
}

pub const HWNP_MAGIC: [u8; 4] = *b"HWNP";

/// Size of the fixed header, which is also where the descriptor table starts.
pub const HEADER_SIZE: usize = 0x128;

/// Offset of the product ID window.
pub const PRODUCT_ID_OFFSET: usize = 0x24;

/// Capacity of the product ID window (260 bytes).
pub const PRODUCT_ID_CAPACITY: usize = HEADER_SIZE - PRODUCT_ID_OFFSET;

pub const PRODUCT_ID_DELIMITER: u8 = b'|';

/// Offset of the stored head CRC.
pub const HEAD_CRC_OFFSET: usize = 0x08;

/// The head CRC covers everything from this offset to the end of the image.
pub const HEAD_CRC_COVERAGE_START: usize = 0x0C;

/// Descriptor entry size found on every known image.
pub const SECTION_DESC_SIZE: usize = 360;

#[derive(Debug, Clone, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct HwnpHeaderRaw {
    pub magic: [u8; 4],                         // 0x00 - "HWNP"
    pub payload_size: big_endian::U32,          // 0x04
    pub head_crc: U32,                          // 0x08 - CRC32(image[0x0C..])
    pub head_len: U32,                          // 0x0C
    pub file_crc: U32,                          // 0x10 - not maintained
    pub item_num: U32,                          // 0x14 - low byte only
    pub version: U32,                           // 0x18
    pub item_desc_size: U32,                    // 0x1C
    pub reserved: U32,                          // 0x20
    pub product_ids: [u8; PRODUCT_ID_CAPACITY], // 0x24
                                                // 0x128 - descriptor table
}

const _: () = assert!(size_of::<HwnpHeaderRaw>() == HEADER_SIZE);

/// Parsed HWNP header.
#[derive(Debug, Clone)]
#[must_use]
pub struct HwnpHeader {
    raw_header: HwnpHeaderRaw,
    product_ids: Vec<String>,
}

impl HwnpHeader {
    /// Parses an HWNP header from the start of an image.
    ///
    /// # Errors
    ///
    /// Returns an error if the magic is missing or the image is shorter than
    /// [`HEADER_SIZE`].
    pub fn read(image: &[u8]) -> Result<Self, ReadError> {
        ensure!(
            image.get(..HWNP_MAGIC.len()) == Some(&HWNP_MAGIC[..]),
            InvalidMagicSnafu
        );

        let (raw_header, _) =
            HwnpHeaderRaw::read_from_prefix(image).map_err(|_| TooSmallSnafu.build())?;
        let product_ids = decode_product_ids(&raw_header.product_ids);

        Ok(Self {
            raw_header,
            product_ids,
        })
    }

    /// Returns the declared payload size (stored big-endian).
    #[must_use]
    pub const fn payload_size(&self) -> u32 {
        self.raw_header.payload_size.get()
    }

    /// Returns the stored head CRC.
    #[must_use]
    pub const fn head_crc(&self) -> u32 {
        self.raw_header.head_crc.get()
    }

    #[must_use]
    pub const fn head_len(&self) -> u32 {
        self.raw_header.head_len.get()
    }

    /// Returns the secondary CRC field. This codec never reads or updates it.
    #[must_use]
    pub const fn file_crc(&self) -> u32 {
        self.raw_header.file_crc.get()
    }

    /// Returns the number of sections.
    ///
    /// Only the low byte of the stored field is significant.
    #[must_use]
    pub const fn item_count(&self) -> usize {
        (self.raw_header.item_num.get() & 0xFF) as _
    }

    #[must_use]
    pub const fn version(&self) -> u32 {
        self.raw_header.version.get()
    }

    /// Returns the descriptor entry size recorded in the header.
    #[must_use]
    pub const fn item_desc_size(&self) -> u32 {
        self.raw_header.item_desc_size.get()
    }

    #[must_use]
    pub const fn reserved(&self) -> u32 {
        self.raw_header.reserved.get()
    }

    /// Returns the product IDs in stored order.
    #[must_use]
    pub fn product_ids(&self) -> &[String] {
        &self.product_ids
    }

    /// Returns the product IDs as they appear on disk (`A|B|`).
    #[must_use]
    pub fn product_id_string(&self) -> String {
        let mut out = String::new();
        for id in &self.product_ids {
            out.push_str(id);
            out.push(PRODUCT_ID_DELIMITER as char);
        }
        out
    }

    /// Returns the offset where section data begins.
    #[must_use]
    pub const fn data_start(&self) -> usize {
        HEADER_SIZE + self.item_count() * SECTION_DESC_SIZE
    }

    /// Returns the raw header.
    #[must_use]
    pub const fn raw_header(&self) -> &HwnpHeaderRaw {
        &self.raw_header
    }

    pub(crate) fn set_head_crc(&mut self, crc: u32) {
        self.raw_header.head_crc.set(crc);
    }

    pub(crate) fn set_product_ids(&mut self, window: [u8; PRODUCT_ID_CAPACITY]) {
        self.product_ids = decode_product_ids(&window);
        self.raw_header.product_ids = window;
    }
}

impl fmt::Display for HwnpHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HWNP v0x{:08X}, {} sections, products {}",
            self.version(),
            self.item_count(),
            self.product_id_string()
        )
    }
}

/// Decodes the product ID list from its fixed window.
///
/// The list ends at the first NUL byte, or at the end of the window if there
/// is none. Empty fragments are dropped.
#[must_use]
pub fn decode_product_ids(window: &[u8]) -> Vec<String> {
    let text = ascii_lossy(nul_terminated(window));
    text.split(PRODUCT_ID_DELIMITER as char)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Encodes a product ID list into a zero-filled window.
///
/// The IDs are joined with `|` and a trailing `|` is appended, so an empty
/// list is stored as a lone `|`.
///
/// # Errors
///
/// Returns [`ProductIdError::TooLong`] if the encoded list does not fit into
/// [`PRODUCT_ID_CAPACITY`] bytes.
pub fn encode_product_ids<S: AsRef<str>>(
    ids: &[S],
) -> Result<[u8; PRODUCT_ID_CAPACITY], ProductIdError> {
    let mut encoded = Vec::with_capacity(PRODUCT_ID_CAPACITY);

    for (num, id) in ids.iter().enumerate() {
        let id = id.as_ref();
        let valid = !id.is_empty()
            && id
                .bytes()
                .all(|b| b.is_ascii() && b != 0 && b != PRODUCT_ID_DELIMITER);
        ensure!(valid, InvalidIdentifierSnafu { id });

        if num > 0 {
            encoded.push(PRODUCT_ID_DELIMITER);
        }
        encoded.extend_from_slice(id.as_bytes());
    }
    encoded.push(PRODUCT_ID_DELIMITER);

    ensure!(
        encoded.len() <= PRODUCT_ID_CAPACITY,
        TooLongSnafu {
            len: encoded.len(),
            max: PRODUCT_ID_CAPACITY,
        }
    );

    let mut window = [0u8; PRODUCT_ID_CAPACITY];
    window[..encoded.len()].copy_from_slice(&encoded);
    Ok(window)
}

/// Returns the bytes before the first NUL, or all of them.
pub(crate) fn nul_terminated(bytes: &[u8]) -> &[u8] {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..len]
}

/// Decodes ASCII, replacing every non-ASCII byte with U+FFFD.
pub(crate) fn ascii_lossy(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
        .collect()
}
