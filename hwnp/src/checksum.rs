use crate::header::HEAD_CRC_COVERAGE_START;

/// Computes the head CRC of an image.
///
/// This is a standard CRC-32 (reflected polynomial `0xEDB88320`) over
/// everything after the stored CRC field.
#[must_use]
pub fn compute_head_crc(image: &[u8]) -> u32 {
    crc32fast::hash(image.get(HEAD_CRC_COVERAGE_START..).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_bytes_after_stored_field() {
        let mut image = vec![0xAAu8; HEAD_CRC_COVERAGE_START];
        image.extend_from_slice(b"123456789");

        // Standard CRC-32 check value.
        assert_eq!(compute_head_crc(&image), 0xCBF4_3926);

        image[0..HEAD_CRC_COVERAGE_START].fill(0);
        assert_eq!(compute_head_crc(&image), 0xCBF4_3926);
    }

    #[test]
    fn short_input_hashes_nothing() {
        assert_eq!(compute_head_crc(b"HWNP"), 0);
    }
}
