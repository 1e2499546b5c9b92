//! Signature manifest (`signinfo`) handling.
//!
//! The manifest section starts with a 60-byte verification header followed by
//! lines of the form `<sha256 hex>  /path/of/section`. A device only enforces
//! the hashes while the header is non-zero, so saving an image always zeroes
//! the header and re-stamps the hashes of every section it lists.

use crate::header::ascii_lossy;
use crate::section::Section;
use sha2::{Digest, Sha256};

/// Paths containing this marker identify the manifest section.
pub const SIGNINFO_MARKER: &str = "signinfo";

/// Size of the verification header at the start of the manifest.
pub const SIGNINFO_HEADER_SIZE: usize = 60;

/// Length of a lowercase hex SHA-256 digest.
pub const HASH_HEX_LEN: usize = 64;

/// A `<hash, path>` line found in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    hash_offset: usize,
    path: String,
}

impl ManifestEntry {
    /// Returns the offset of the hex digest within the manifest payload.
    #[must_use]
    pub const fn hash_offset(&self) -> usize {
        self.hash_offset
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the hex digest bytes of this entry inside `manifest`.
    ///
    /// Returns `None` if `manifest` is too short to hold the digest.
    #[must_use]
    pub fn hash<'a>(&self, manifest: &'a [u8]) -> Option<&'a [u8]> {
        manifest.get(self.hash_offset..(self.hash_offset + HASH_HEX_LEN))
    }
}

/// Outcome of patching the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct SigninfoReport {
    section: usize,
    updated: Vec<String>,
    unmatched: Vec<String>,
}

impl SigninfoReport {
    /// Returns the index of the manifest section.
    #[must_use]
    pub const fn section(&self) -> usize {
        self.section
    }

    /// Returns the paths whose hashes were re-stamped.
    #[must_use]
    pub fn updated(&self) -> &[String] {
        &self.updated
    }

    /// Returns the listed paths that match no section.
    #[must_use]
    pub fn unmatched(&self) -> &[String] {
        &self.unmatched
    }
}

/// Scans a manifest payload for `<64 lowercase hex> <whitespace> /<path>`
/// lines.
///
/// Matches never overlap. The path runs to the end of the line and is trimmed.
#[must_use]
pub fn manifest_entries(manifest: &[u8]) -> Vec<ManifestEntry> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while pos + HASH_HEX_LEN <= manifest.len() {
        match match_entry(manifest, pos) {
            Some((entry, end)) => {
                entries.push(entry);
                pos = end;
            }
            None => pos += 1,
        }
    }

    entries
}

fn match_entry(manifest: &[u8], start: usize) -> Option<(ManifestEntry, usize)> {
    let hash = manifest.get(start..(start + HASH_HEX_LEN))?;
    if !hash.iter().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }

    let mut pos = start + HASH_HEX_LEN;
    let spaces = manifest[pos..].iter().take_while(|&&b| is_space(b)).count();
    if spaces == 0 {
        return None;
    }
    pos += spaces;

    if manifest.get(pos) != Some(&b'/') {
        return None;
    }

    let end = manifest[pos..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(manifest.len(), |n| pos + n);

    // At least one character must follow the leading slash.
    if end - pos < 2 {
        return None;
    }

    let path = ascii_lossy(&manifest[pos..end])
        .trim_matches(|c: char| c.is_ascii() && is_space(c as u8))
        .to_owned();

    Some((
        ManifestEntry {
            hash_offset: start,
            path,
        },
        end,
    ))
}

const fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0B | 0x0C | b'\r' | 0x1C..=0x1F)
}

/// Disables signature enforcement and re-stamps the manifest hashes.
///
/// Returns `None` if the image has no manifest section.
pub(crate) fn patch(image: &mut [u8], sections: &[Section]) -> Option<SigninfoReport> {
    let manifest = sections.iter().find(|s| s.is_signinfo())?;
    let range = manifest.data_range();

    let header_len = SIGNINFO_HEADER_SIZE.min(range.len());
    image[range.start..(range.start + header_len)].fill(0);

    let mut report = SigninfoReport {
        section: manifest.index(),
        updated: Vec::new(),
        unmatched: Vec::new(),
    };

    for entry in manifest_entries(&image[range.clone()]) {
        let Some(target) = sections.iter().find(|s| s.file_name() == entry.path()) else {
            log::debug!("signinfo lists {} which is not in the image", entry.path());
            report.unmatched.push(entry.path);
            continue;
        };

        let digest = hex::encode(Sha256::digest(&image[target.data_range()]));
        let at = range.start + entry.hash_offset;
        image[at..(at + HASH_HEX_LEN)].copy_from_slice(digest.as_bytes());

        log::debug!("signinfo: {} -> {digest}", entry.path());
        report.updated.push(entry.path);
    }

    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const H1: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn finds_hash_lines() {
        let manifest = format!("header\n{H1}  /var/a.xml\n{H1}\t/etc/b.sh\r\n");
        let entries = manifest_entries(manifest.as_bytes());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path(), "/var/a.xml");
        assert_eq!(entries[0].hash_offset(), 7);
        assert_eq!(entries[0].hash(manifest.as_bytes()), Some(H1.as_bytes()));
        assert_eq!(entries[0].hash(&manifest.as_bytes()[..20]), None);
        assert_eq!(entries[1].path(), "/etc/b.sh");
    }

    #[test]
    fn requires_lowercase_hash_and_absolute_path() {
        let upper = H1.to_uppercase();
        let manifest = format!("{upper} /a\n{H1} relative\n{H1} /\n");
        assert!(manifest_entries(manifest.as_bytes()).is_empty());
    }

    #[test]
    fn longer_hex_run_matches_its_tail() {
        let manifest = format!("f{H1} /a/b\n");
        let entries = manifest_entries(manifest.as_bytes());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hash_offset(), 1);
    }

    #[test]
    fn path_is_trimmed_of_separator_controls() {
        let manifest = format!("{H1} /x\x1f\x1c \n{H1} /y\t\r\n");
        let entries = manifest_entries(manifest.as_bytes());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path(), "/x");
        assert_eq!(entries[1].path(), "/y");
    }

    #[test]
    fn whitespace_may_span_lines() {
        let manifest = format!("{H1}\n\n/late/path");
        let entries = manifest_entries(manifest.as_bytes());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path(), "/late/path");
    }

    #[test]
    fn zeroed_header_is_skipped() {
        let mut manifest = vec![0u8; SIGNINFO_HEADER_SIZE];
        manifest.extend_from_slice(format!("{H1} /x\n").as_bytes());
        let entries = manifest_entries(&manifest);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hash_offset(), SIGNINFO_HEADER_SIZE);
    }
}
