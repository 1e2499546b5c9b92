//! Hardware check toggles found in `UpgradeCheck.xml`.
//!
//! The file lists elements like `<HardVersion CheckEnable="1" />`. Each flag is
//! a single digit, so toggling rewrites one byte and never changes the payload
//! length.

/// A check element and the position of its flag digit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeCheck {
    name: String,
    enabled: bool,
    flag_offset: usize,
}

impl UpgradeCheck {
    /// Returns the element name (`HardVersion`, `BoardId`, ...).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the offset of the `0`/`1` digit within the payload.
    #[must_use]
    pub const fn flag_offset(&self) -> usize {
        self.flag_offset
    }
}

const ATTRIBUTE: &[u8] = b"CheckEnable=\"";

/// Parses every `<Name CheckEnable="0|1" />` element in `xml`.
#[must_use]
pub fn parse_checks(xml: &[u8]) -> Vec<UpgradeCheck> {
    let mut checks = Vec::new();
    let mut pos = 0;

    while pos < xml.len() {
        match match_check(xml, pos) {
            Some((check, end)) => {
                checks.push(check);
                pos = end;
            }
            None => pos += 1,
        }
    }

    checks
}

/// Rewrites the flags of the checks selected by `select` in place.
///
/// `select` receives each check name and returns the desired state, or `None`
/// to leave the check alone. Returns the number of flags that changed.
pub fn set_checks<F>(xml: &mut [u8], mut select: F) -> usize
where
    F: FnMut(&str) -> Option<bool>,
{
    let mut changed = 0;

    for check in parse_checks(xml) {
        let Some(enabled) = select(check.name()) else {
            continue;
        };

        if enabled != check.enabled {
            xml[check.flag_offset] = if enabled { b'1' } else { b'0' };
            changed += 1;
        }
    }

    changed
}

fn match_check(xml: &[u8], start: usize) -> Option<(UpgradeCheck, usize)> {
    if xml.get(start) != Some(&b'<') {
        return None;
    }

    let name_start = start + 1;
    let name_len = xml[name_start..].iter().take_while(|&&b| is_word(b)).count();
    if name_len == 0 {
        return None;
    }

    let mut pos = name_start + name_len;
    let spaces = skip_spaces(xml, pos);
    if spaces == 0 {
        return None;
    }
    pos += spaces;

    if !xml[pos..].starts_with(ATTRIBUTE) {
        return None;
    }
    pos += ATTRIBUTE.len();

    let flag_offset = pos;
    let enabled = match xml.get(flag_offset)? {
        b'0' => false,
        b'1' => true,
        _ => return None,
    };
    pos += 1;

    if xml.get(pos) != Some(&b'"') {
        return None;
    }
    pos += 1;

    pos += skip_spaces(xml, pos);
    if xml.get(pos) == Some(&b'/') {
        pos += 1;
    }
    pos += skip_spaces(xml, pos);

    if xml.get(pos) != Some(&b'>') {
        return None;
    }

    let name = String::from_utf8_lossy(&xml[name_start..(name_start + name_len)]).into_owned();

    Some((
        UpgradeCheck {
            name,
            enabled,
            flag_offset,
        },
        pos + 1,
    ))
}

const fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn skip_spaces(xml: &[u8], pos: usize) -> usize {
    xml[pos..]
        .iter()
        .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\n' | 0x0B | 0x0C | b'\r'))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0"?>
<UpgradeCheck>
  <HardVersion CheckEnable="1"/>
  <BoardId   CheckEnable="0" />
  <LswChip CheckEnable="1">
  <Broken CheckEnable="2"/>
  <NoSpaceCheckEnable="1"/>
</UpgradeCheck>
"#;

    #[test]
    fn parses_well_formed_checks() {
        let checks = parse_checks(XML.as_bytes());
        let names: Vec<_> = checks.iter().map(|c| (c.name(), c.enabled())).collect();
        assert_eq!(
            names,
            [("HardVersion", true), ("BoardId", false), ("LswChip", true)]
        );
        assert_eq!(XML.as_bytes()[checks[1].flag_offset()], b'0');
    }

    #[test]
    fn set_checks_rewrites_single_digits() {
        let mut xml = XML.as_bytes().to_vec();
        let changed = set_checks(&mut xml, |name| (name != "LswChip").then_some(false));
        assert_eq!(changed, 1);
        assert_eq!(xml.len(), XML.len());

        let checks = parse_checks(&xml);
        assert!(!checks[0].enabled());
        assert!(!checks[1].enabled());
        assert!(checks[2].enabled());
    }

    #[test]
    fn enable_all() {
        let mut xml = XML.as_bytes().to_vec();
        assert_eq!(set_checks(&mut xml, |_| Some(true)), 1);
        assert!(parse_checks(&xml).iter().all(UpgradeCheck::enabled));
    }
}
