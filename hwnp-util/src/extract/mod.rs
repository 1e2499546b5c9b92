mod error;

pub use self::error::ExtractError;

use self::error::{
    CreateDirectoryFailedSnafu, CreateFileFailedSnafu, UnsupportedPathSnafu, WriteFailedSnafu,
};
use crate::progress::ExtractProgress;
use hwnp::Image;
use hwnp::section::Section;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use snafu::{ResultExt, ensure};
use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Extracts the section payloads of an image to a directory.
///
/// Each section is written to `{output}/{file name}`, so
/// `file:/var/UpgradeCheck.xml` ends up at `{output}/var/UpgradeCheck.xml`.
pub struct SectionExtractor<'a, R: AsRef<[u8]> + Sync, P: ExtractProgress> {
    image: &'a Image<R>,
    progress: P,
    overwrite: bool,
}

impl<'a, R: AsRef<[u8]> + Sync, P: ExtractProgress> SectionExtractor<'a, R, P> {
    /// Creates a new extractor for the given image.
    ///
    /// If `overwrite` is `true`, existing files will be replaced during extraction.
    /// Otherwise, extraction will fail if an output file already exists.
    pub fn new(image: &'a Image<R>, progress: P, overwrite: bool) -> Self {
        Self {
            image,
            progress,
            overwrite,
        }
    }

    /// Extracts every section to the specified directory.
    ///
    /// Directories are created sequentially, then all payloads are written
    /// in parallel using rayon.
    pub fn extract(&self, output: impl AsRef<Path>) -> Result<(), ExtractError> {
        let output = output.as_ref();
        let sections = self.image.sections();

        // Phase 1: Resolve output paths.
        let work = sections
            .iter()
            .map(|section| {
                Ok(SectionWork {
                    section,
                    output_path: output.join(relative_path(section)?),
                })
            })
            .collect::<Result<Vec<_>, ExtractError>>()?;

        // Phase 2: Create parent directories.
        for item in &work {
            if let Some(parent) = item.output_path.parent() {
                create_dir_all(parent).context(CreateDirectoryFailedSnafu { path: parent })?;
            }
        }

        // Phase 3: Write payloads in parallel.
        let total = work.len();

        work.par_iter().try_for_each(|item| {
            self.progress
                .section_start(&item.output_path, item.section.index(), total);
            self.write_section(item)
        })?;

        self.progress.completed(total);

        Ok(())
    }

    /// Called from rayon worker threads in parallel.
    fn write_section(&self, item: &SectionWork<'_>) -> Result<(), ExtractError> {
        let mut opts = OpenOptions::new();
        opts.write(true);

        if self.overwrite {
            opts.create(true).truncate(true);
        } else {
            opts.create_new(true);
        }

        let path = &item.output_path;
        let mut dest = opts.open(path).context(CreateFileFailedSnafu { path })?;
        let data = self.image.section_data(item.section);
        dest.write_all(data).context(WriteFailedSnafu { path })?;

        self.progress.section_completed(path, data.len());

        Ok(())
    }
}

struct SectionWork<'a> {
    section: &'a Section,
    output_path: PathBuf,
}

/// Maps a section to a path below the output directory.
///
/// Unnamed sections are written as `section_NN.bin`.
fn relative_path(section: &Section) -> Result<PathBuf, ExtractError> {
    let name = section.file_name().trim_start_matches('/');
    let index = section.index();

    if name.is_empty() {
        return Ok(PathBuf::from(format!("section_{index:02}.bin")));
    }

    let path = Path::new(name);
    ensure!(
        path.components().all(|c| matches!(c, Component::Normal(_))),
        UnsupportedPathSnafu {
            index,
            path: section.path(),
        }
    );

    Ok(path.to_path_buf())
}
