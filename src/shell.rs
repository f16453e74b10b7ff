//! File pickers and file-manager reveal.
//!
//! The orchestrator never talks to the windowing system directly; it goes
//! through [`DesktopShell`]. [`RfdShell`] is the native implementation and
//! [`HeadlessShell`] serves non-interactive runs.

use std::io;
use std::path::{Path, PathBuf};

/// Named extension filter for a file picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

impl FileFilter {
    pub fn new(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// True if `path` has one of the filter's extensions
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|f| f.eq_ignore_ascii_case(ext)))
    }
}

/// Side-effecting desktop capabilities used by the orchestrator
pub trait DesktopShell: Send {
    /// Folder chooser; `None` when cancelled
    fn pick_folder(&self, title: &str) -> Option<PathBuf>;

    /// Single-file chooser restricted to `filters`; `None` when cancelled
    fn pick_file(&self, title: &str, filters: &[FileFilter]) -> Option<PathBuf>;

    /// Show a folder in the platform file manager
    fn open_folder(&self, folder: &Path) -> io::Result<()>;
}

/// Native dialogs via `rfd`, reveal via `open`
#[cfg(feature = "desktop")]
#[derive(Debug, Default, Clone, Copy)]
pub struct RfdShell;

#[cfg(feature = "desktop")]
impl DesktopShell for RfdShell {
    fn pick_folder(&self, title: &str) -> Option<PathBuf> {
        rfd::FileDialog::new().set_title(title).pick_folder()
    }

    fn pick_file(&self, title: &str, filters: &[FileFilter]) -> Option<PathBuf> {
        let mut dialog = rfd::FileDialog::new().set_title(title);
        for filter in filters {
            dialog = dialog.add_filter(&filter.name, filter.extensions.as_slice());
        }
        dialog.pick_file()
    }

    fn open_folder(&self, folder: &Path) -> io::Result<()> {
        open::that(folder)
    }
}

/// Shell without a display: pickers return a preselected file (or nothing)
#[derive(Debug, Default, Clone)]
pub struct HeadlessShell {
    /// Answer for [`DesktopShell::pick_file`]
    pub preset_file: Option<PathBuf>,
    /// Answer for [`DesktopShell::pick_folder`]
    pub preset_folder: Option<PathBuf>,
}

impl HeadlessShell {
    pub fn with_file(file: impl Into<PathBuf>) -> Self {
        Self {
            preset_file: Some(file.into()),
            preset_folder: None,
        }
    }
}

impl DesktopShell for HeadlessShell {
    fn pick_folder(&self, _title: &str) -> Option<PathBuf> {
        self.preset_folder.clone()
    }

    fn pick_file(&self, _title: &str, filters: &[FileFilter]) -> Option<PathBuf> {
        self.preset_file
            .clone()
            .filter(|p| filters.is_empty() || filters.iter().any(|f| f.matches(p)))
    }

    fn open_folder(&self, folder: &Path) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("no file manager available to show {}", folder.display()),
        ))
    }
}

/// Native shell when built with desktop support, headless otherwise
pub fn default_shell() -> Box<dyn DesktopShell> {
    #[cfg(feature = "desktop")]
    {
        Box::new(RfdShell)
    }
    #[cfg(not(feature = "desktop"))]
    {
        Box::new(HeadlessShell::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches_case_insensitively() {
        let filter = FileFilter::new("Excel Workbook", &["xlsx"]);
        assert!(filter.matches(Path::new("/data/Roster.XLSX")));
        assert!(!filter.matches(Path::new("/data/roster.csv")));
        assert!(!filter.matches(Path::new("/data/roster")));
    }

    #[test]
    fn test_headless_shell_applies_filters() {
        let shell = HeadlessShell::with_file("/data/roster.csv");
        let filter = FileFilter::new("Excel Workbook", &["xlsx"]);
        assert_eq!(shell.pick_file("Pick", &[filter]), None);
        assert_eq!(shell.pick_file("Pick", &[]), Some(PathBuf::from("/data/roster.csv")));
        assert!(shell.open_folder(Path::new("/tmp")).is_err());
    }
}
