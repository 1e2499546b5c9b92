//! Text rendering helpers for the `dump` and `list` commands.

use std::fmt::Write;

const BYTES_PER_ROW: usize = 16;

/// Renders `data` as a classic hex dump, showing at most `max_bytes` bytes.
///
/// Each row is `OOOOOOOO  HH HH ..  ascii`. Offsets are relative to `base`.
#[must_use]
pub fn hex_dump(data: &[u8], base: usize, max_bytes: usize) -> String {
    let shown = &data[..data.len().min(max_bytes)];
    let mut out = String::new();

    for (row, chunk) in shown.chunks(BYTES_PER_ROW).enumerate() {
        let _ = write!(out, "{:08X}  ", base + row * BYTES_PER_ROW);

        for i in 0..BYTES_PER_ROW {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{b:02X} ");
                }
                None => out.push_str("   "),
            }
        }

        out.push(' ');
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push('\n');
    }

    let remaining = data.len() - shown.len();
    if remaining > 0 {
        let _ = writeln!(out, "... ({remaining} more bytes)");
    }

    out
}

/// Formats a byte count with a binary unit suffix.
#[must_use]
pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if size < 1024 {
        return format!("{size} B");
    }

    let mut value = size as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_row() {
        let data: Vec<u8> = (0x41..0x51).collect();
        assert_eq!(
            hex_dump(&data, 0, 64),
            "00000000  41 42 43 44 45 46 47 48 49 4A 4B 4C 4D 4E 4F 50  ABCDEFGHIJKLMNOP\n"
        );
    }

    #[test]
    fn short_row_is_padded() {
        let dump = hex_dump(b"HWNP\x00", 0x128, 64);
        let expected = format!("00000128  48 57 4E 50 00 {} HWNP.\n", "   ".repeat(11));
        assert_eq!(dump, expected);
    }

    #[test]
    fn truncated_output() {
        let data = vec![0xFFu8; 40];
        let dump = hex_dump(&data, 0, 16);
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000000  FF FF"));
        assert_eq!(lines[1], "... (24 more bytes)");
    }

    #[test]
    fn empty_input() {
        assert_eq!(hex_dump(&[], 0, 16), "");
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(32 * 1024 * 1024), "32.0 MiB");
    }
}
