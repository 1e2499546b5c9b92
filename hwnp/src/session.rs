//! Editing sessions.
//!
//! A [`Session`] owns one image and applies [`Command`]s to it in order. This
//! is the surface an editor front-end drives: it builds commands from user
//! input, applies them, and finally saves.

use crate::signinfo::SigninfoReport;
use crate::upgrade_check;
use crate::{FormatError, Image, ProductIdError, SaveError, SectionDataError};
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use std::collections::BTreeMap;
use std::path::Path;

/// An edit to apply to an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace the product ID list.
    SetProductIds(Vec<String>),

    /// Replace a section payload, zero-padding shorter data.
    SetSectionData { index: usize, data: Vec<u8> },

    /// Toggle `CheckEnable` flags in an `UpgradeCheck.xml` section.
    SetUpgradeChecks { index: usize, checks: CheckSelection },
}

/// Which upgrade checks to change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckSelection {
    /// Set every check to the given state.
    All(bool),

    /// Set the named checks.
    Named(BTreeMap<String, bool>),
}

impl CheckSelection {
    fn state_for(&self, name: &str) -> Option<bool> {
        match self {
            Self::All(enabled) => Some(*enabled),
            Self::Named(map) => map.get(name).copied(),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(module)]
#[non_exhaustive]
pub enum CommandError {
    #[snafu(display("cannot set product IDs"))]
    ProductIds { source: ProductIdError },

    #[snafu(display("cannot set section data"))]
    SectionData { source: SectionDataError },

    #[snafu(display("no section #{index}"))]
    NoSection { index: usize },

    #[snafu(display("section #{index} has no upgrade checks"))]
    NoUpgradeChecks { index: usize },

    #[snafu(display("section #{index} has no upgrade check named {name}"))]
    UnknownCheck { index: usize, name: String },
}

/// An image being edited.
#[derive(Debug)]
pub struct Session {
    image: Image<Vec<u8>>,
    applied: Vec<Command>,
}

impl Session {
    /// Starts a session on an owned image buffer.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError`] if the buffer is not a valid HWNP image.
    pub fn open(raw: Vec<u8>) -> Result<Self, FormatError> {
        Ok(Self::from_image(Image::new(raw)?))
    }

    pub fn from_image(image: Image<Vec<u8>>) -> Self {
        Self {
            image,
            applied: Vec::new(),
        }
    }

    pub fn image(&self) -> &Image<Vec<u8>> {
        &self.image
    }

    /// Returns `true` if any command was applied since the last save.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        !self.applied.is_empty()
    }

    /// Returns the commands applied since the last save.
    #[must_use]
    pub fn applied(&self) -> &[Command] {
        &self.applied
    }

    /// Applies a command. The image is unchanged if it fails.
    pub fn apply(&mut self, command: Command) -> Result<(), CommandError> {
        match &command {
            Command::SetProductIds(ids) => self
                .image
                .set_product_ids(ids.as_slice())
                .context(command_error::ProductIdsSnafu)?,
            Command::SetSectionData { index, data } => self
                .image
                .set_section_data(*index, data)
                .context(command_error::SectionDataSnafu)?,
            Command::SetUpgradeChecks { index, checks } => {
                self.apply_upgrade_checks(*index, checks)?
            }
        }

        self.applied.push(command);
        Ok(())
    }

    /// Applies commands in order, stopping at the first failure.
    pub fn apply_all<I>(&mut self, commands: I) -> Result<(), CommandError>
    where
        I: IntoIterator<Item = Command>,
    {
        commands.into_iter().try_for_each(|c| self.apply(c))
    }

    /// Finalizes the image and writes it to `path`.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<Option<SigninfoReport>, SaveError> {
        let report = self.image.save(path)?;
        self.applied.clear();
        Ok(report)
    }

    /// Ends the session and returns the image.
    pub fn into_image(self) -> Image<Vec<u8>> {
        self.image
    }

    fn apply_upgrade_checks(
        &mut self,
        index: usize,
        checks: &CheckSelection,
    ) -> Result<(), CommandError> {
        let section = self
            .image
            .section(index)
            .context(command_error::NoSectionSnafu { index })?;
        let mut data = self.image.section_data(section).to_vec();

        let found = upgrade_check::parse_checks(&data);
        ensure!(!found.is_empty(), command_error::NoUpgradeChecksSnafu { index });

        if let CheckSelection::Named(map) = checks {
            let unknown = map
                .keys()
                .find(|n| !found.iter().any(|c| c.name() == n.as_str()));
            if let Some(name) = unknown {
                return command_error::UnknownCheckSnafu { index, name }.fail();
            }
        }

        let changed = upgrade_check::set_checks(&mut data, |name| checks.state_for(name));
        log::debug!("section #{index}: {changed} upgrade checks changed");

        self.image
            .set_section_data(index, &data)
            .context(command_error::SectionDataSnafu)
    }
}
