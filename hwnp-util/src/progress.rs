use std::path::Path;

/// Trait for receiving extraction progress updates.
///
/// Methods take `&self` so one reporter can be shared by the rayon workers.
pub trait ExtractProgress: Send + Sync {
    /// Called when a section starts being written.
    fn section_start(&self, _path: &Path, _index: usize, _total: usize) {}

    /// Called when a section has been fully written.
    fn section_completed(&self, _path: &Path, _written: usize) {}

    /// Called once every section has been written.
    fn completed(&self, _total: usize) {}
}

impl<T: ExtractProgress> ExtractProgress for &T {
    fn section_start(&self, path: &Path, index: usize, total: usize) {
        (**self).section_start(path, index, total);
    }

    fn section_completed(&self, path: &Path, written: usize) {
        (**self).section_completed(path, written);
    }

    fn completed(&self, total: usize) {
        (**self).completed(total);
    }
}

/// A no-op progress implementation that discards all updates.
pub struct SilentProgress;

impl ExtractProgress for SilentProgress {}

/// Console progress reporter using an indicatif progress bar.
#[cfg(feature = "cli")]
pub struct ConsoleProgress {
    bar: indicatif::ProgressBar,
}

#[cfg(feature = "cli")]
impl ConsoleProgress {
    pub fn new(total: usize) -> Self {
        let bar = indicatif::ProgressBar::with_draw_target(
            Some(total as u64),
            indicatif::ProgressDrawTarget::stderr(),
        );

        if let Ok(style) = indicatif::ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} sections {wide_msg}")
        {
            bar.set_style(style.progress_chars("━╸─"));
        }

        Self { bar }
    }
}

#[cfg(feature = "cli")]
impl ExtractProgress for ConsoleProgress {
    fn section_start(&self, path: &Path, _index: usize, _total: usize) {
        self.bar.set_message(path.display().to_string());
    }

    fn section_completed(&self, path: &Path, written: usize) {
        log::debug!("wrote {} ({written} bytes)", path.display());
        self.bar.inc(1);
    }

    fn completed(&self, total: usize) {
        self.bar.finish_and_clear();
        println!("Extracted {total} sections.");
    }
}
