//! Synthetic HWNP image builder shared by the integration tests.

#![allow(dead_code)]

use hwnp::header::{HEADER_SIZE, PRODUCT_ID_OFFSET, SECTION_DESC_SIZE};

pub const ITEM_CRC: u32 = 0xCAFE_BABE;

pub struct SectionSpec {
    pub path: String,
    pub label: String,
    pub data: Vec<u8>,
}

pub struct ImageBuilder {
    product_ids: Vec<u8>,
    version: u32,
    sections: Vec<SectionSpec>,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self {
            product_ids: b"120|130|".to_vec(),
            version: 0x0000_0200,
            sections: Vec::new(),
        }
    }

    pub fn product_ids(mut self, raw: &[u8]) -> Self {
        self.product_ids = raw.to_vec();
        self
    }

    pub fn section(self, path: &str, data: &[u8]) -> Self {
        self.labeled(path, "", data)
    }

    pub fn labeled(mut self, path: &str, label: &str, data: &[u8]) -> Self {
        self.sections.push(SectionSpec {
            path: path.to_owned(),
            label: label.to_owned(),
            data: data.to_vec(),
        });
        self
    }

    /// Returns the offset each section payload is expected at.
    pub fn offsets(&self) -> Vec<usize> {
        let mut offset = HEADER_SIZE + self.sections.len() * SECTION_DESC_SIZE;
        self.sections
            .iter()
            .map(|s| {
                let current = offset;
                offset = (offset + s.data.len() + 3) & !3;
                current
            })
            .collect()
    }

    /// Builds the image with a correct head CRC.
    pub fn build(&self) -> Vec<u8> {
        let mut image = vec![0u8; HEADER_SIZE];
        image[0..4].copy_from_slice(b"HWNP");
        image[0x0C..0x10].copy_from_slice(&0x0000_0128u32.to_le_bytes());
        image[0x10..0x14].copy_from_slice(&0x1111_1111u32.to_le_bytes());
        image[0x14..0x18].copy_from_slice(&(self.sections.len() as u32).to_le_bytes());
        image[0x18..0x1C].copy_from_slice(&self.version.to_le_bytes());
        image[0x1C..0x20].copy_from_slice(&(SECTION_DESC_SIZE as u32).to_le_bytes());
        image[PRODUCT_ID_OFFSET..(PRODUCT_ID_OFFSET + self.product_ids.len())]
            .copy_from_slice(&self.product_ids);

        for (num, (section, offset)) in self.sections.iter().zip(self.offsets()).enumerate() {
            let mut desc = vec![0u8; SECTION_DESC_SIZE];
            desc[0..4].copy_from_slice(&ITEM_CRC.to_le_bytes());
            // Deliberately wrong so tests notice if it is used for layout.
            desc[4..8].copy_from_slice(&((offset as u32) ^ 0x5A5A_0000 ^ num as u32).to_le_bytes());
            desc[8..12].copy_from_slice(&(section.data.len() as u32).to_le_bytes());
            desc[12..(12 + section.path.len())].copy_from_slice(section.path.as_bytes());
            desc[268..(268 + section.label.len())].copy_from_slice(section.label.as_bytes());
            image.extend_from_slice(&desc);
        }

        for section in &self.sections {
            image.extend_from_slice(&section.data);
            while image.len() % 4 != 0 {
                image.push(0);
            }
        }

        let payload_size = (image.len() - 0x4C) as u32;
        image[0x04..0x08].copy_from_slice(&payload_size.to_be_bytes());

        let crc = crc32fast::hash(&image[0x0C..]);
        image[0x08..0x0C].copy_from_slice(&crc.to_le_bytes());
        image
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::Digest;
    hex::encode(sha2::Sha256::digest(data))
}

/// Builds a signinfo payload: a non-zero 60-byte header then hash lines.
pub fn signinfo(lines: &[(&str, &str)]) -> Vec<u8> {
    let mut data = b"500R020C00SPC270B520 | SIGNINFO".to_vec();
    data.resize(60, b'#');
    data.push(b'\n');
    for (hash, path) in lines {
        data.extend_from_slice(format!("{hash}  {path}\n").as_bytes());
    }
    data
}
