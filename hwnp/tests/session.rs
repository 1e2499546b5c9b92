mod common;

use common::{ImageBuilder, sha256_hex, signinfo};
use hwnp::session::{CheckSelection, Command, CommandError, Session};
use hwnp::upgrade_check::parse_checks;
use hwnp::{Image, SectionDataError};
use std::collections::BTreeMap;

const UPGRADE_CHECK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<upgradecheck>
<HardVersion CheckEnable="1"/>
<BoardId CheckEnable="1"/>
<LswChip CheckEnable="0"/>
</upgradecheck>
"#;

fn builder() -> ImageBuilder {
    let zero = "0".repeat(64);
    let manifest = signinfo(&[(zero.as_str(), "/var/UpgradeCheck.xml")]);
    ImageBuilder::new()
        .labeled("file:/var/UpgradeCheck.xml", "UPGRDCHECK", UPGRADE_CHECK.as_bytes())
        .labeled("file:/mnt/jffs2/ProductLineMode", "FLAG", &[0x00])
        .labeled("file:/signinfo", "SIGNINFO", &manifest)
}

fn open() -> Session {
    Session::open(builder().build()).unwrap()
}

fn checks(session: &Session) -> Vec<(String, bool)> {
    let image = session.image();
    parse_checks(image.section_data(image.section(0).unwrap()))
        .into_iter()
        .map(|c| (c.name().to_owned(), c.enabled()))
        .collect()
}

#[test]
fn applies_commands_in_order() {
    let mut session = open();
    assert!(!session.is_modified());

    session
        .apply_all([
            Command::SetProductIds(vec!["5E".into(), "6A0".into()]),
            Command::SetSectionData {
                index: 1,
                data: vec![0x01],
            },
            Command::SetProductIds(vec!["A81".into()]),
        ])
        .unwrap();

    assert!(session.is_modified());
    assert_eq!(session.applied().len(), 3);
    assert_eq!(session.image().product_ids(), ["A81"]);
    assert_eq!(session.image().section(1).unwrap().text(), Some("01"));
}

#[test]
fn failed_command_is_not_recorded() {
    let mut session = open();
    let before = session.image().as_bytes().to_vec();

    let err = session
        .apply(Command::SetSectionData {
            index: 1,
            data: vec![0; 8],
        })
        .unwrap_err();
    assert!(matches!(
        err,
        CommandError::SectionData {
            source: SectionDataError::TooLarge { .. }
        }
    ));

    let err = session
        .apply(Command::SetProductIds(vec!["x".repeat(300)]))
        .unwrap_err();
    assert!(matches!(err, CommandError::ProductIds { .. }));

    assert!(!session.is_modified());
    assert_eq!(session.image().as_bytes(), before.as_slice());
}

#[test]
fn disables_all_upgrade_checks() {
    let mut session = open();
    session
        .apply(Command::SetUpgradeChecks {
            index: 0,
            checks: CheckSelection::All(false),
        })
        .unwrap();

    assert!(checks(&session).iter().all(|(_, enabled)| !enabled));
    let text = session.image().section(0).unwrap().text().unwrap();
    assert!(text.contains(r#"<HardVersion CheckEnable="0"/>"#));
    assert_eq!(text.len(), UPGRADE_CHECK.len());
}

#[test]
fn toggles_named_upgrade_checks() {
    let mut session = open();
    let named = BTreeMap::from([("BoardId".to_owned(), false), ("LswChip".to_owned(), true)]);
    session
        .apply(Command::SetUpgradeChecks {
            index: 0,
            checks: CheckSelection::Named(named),
        })
        .unwrap();

    assert_eq!(
        checks(&session),
        [
            ("HardVersion".to_owned(), true),
            ("BoardId".to_owned(), false),
            ("LswChip".to_owned(), true)
        ]
    );
}

#[test]
fn unknown_upgrade_check_is_rejected() {
    let mut session = open();
    let named = BTreeMap::from([("NoSuchCheck".to_owned(), false)]);
    let err = session
        .apply(Command::SetUpgradeChecks {
            index: 0,
            checks: CheckSelection::Named(named),
        })
        .unwrap_err();
    assert!(matches!(err, CommandError::UnknownCheck { index: 0, .. }));

    let err = session
        .apply(Command::SetUpgradeChecks {
            index: 1,
            checks: CheckSelection::All(false),
        })
        .unwrap_err();
    assert!(matches!(err, CommandError::NoUpgradeChecks { index: 1 }));

    let err = session
        .apply(Command::SetUpgradeChecks {
            index: 7,
            checks: CheckSelection::All(false),
        })
        .unwrap_err();
    assert!(matches!(err, CommandError::NoSection { index: 7 }));
}

#[test]
fn save_restamps_edited_section() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("modified.bin");

    let mut session = open();
    session
        .apply(Command::SetUpgradeChecks {
            index: 0,
            checks: CheckSelection::All(false),
        })
        .unwrap();
    let report = session.save(&path).unwrap().unwrap();
    assert!(!session.is_modified());
    assert_eq!(report.updated(), ["/var/UpgradeCheck.xml"]);

    let image = Image::new(std::fs::read(&path).unwrap()).unwrap();
    assert!(image.crc_valid());

    let xml = image.section_data(image.section(0).unwrap());
    let manifest = image.section_data(image.signinfo_section().unwrap());
    let expected = sha256_hex(xml);
    let text = std::str::from_utf8(&manifest[61..]).unwrap();
    assert!(text.starts_with(&expected));
}
