//! Installation diagnostics
//!
//! Reports every location the orchestrator would probe and whether it
//! exists, so a missing or misplaced engine can be found without reading
//! the source. Backs the `doctor` subcommand.

use serde::Serialize;
use std::path::PathBuf;

use crate::orchestrator::Orchestrator;
use crate::paths::{EntryKind, is_inside_archive};
use crate::types::{DeploymentMode, EngineProtocol, Platform};

/// One probed location
#[derive(Debug, Clone, Serialize)]
pub struct ProbeEntry {
    pub path: PathBuf,
    pub exists: bool,
    /// Skipped because it lies inside an archive container
    pub archived: bool,
}

impl ProbeEntry {
    fn probe(path: PathBuf, kind: EntryKind) -> Self {
        Self {
            exists: kind.matches(&path),
            archived: is_inside_archive(&path),
            path,
        }
    }

    fn usable(&self) -> bool {
        self.exists && !self.archived
    }
}

/// Snapshot of the environment as the orchestrator sees it
#[derive(Debug, Clone, Serialize)]
pub struct SanityReport {
    pub mode: DeploymentMode,
    pub platform: Platform,
    pub engine_candidates: Vec<(ProbeEntry, EngineProtocol)>,
    pub config_file: ProbeEntry,
    pub data_file: ProbeEntry,
    pub bundled_data: Vec<ProbeEntry>,
    pub output_dirs: Vec<ProbeEntry>,
    pub presentation_assets: Vec<ProbeEntry>,
}

impl SanityReport {
    /// True if an engine would be found
    pub fn engine_found(&self) -> bool {
        self.engine_candidates.iter().any(|(entry, _)| entry.usable())
    }

    /// True if the data file exists or could be bootstrapped without asking
    pub fn data_available(&self) -> bool {
        self.data_file.exists || self.bundled_data.iter().any(ProbeEntry::usable)
    }

    pub fn is_ok(&self) -> bool {
        self.engine_found()
    }
}

/// Probe every location without creating or copying anything
pub fn verify_environment(orchestrator: &Orchestrator) -> SanityReport {
    let layout = orchestrator.layout();
    let options = orchestrator.options();

    let engine_candidates = layout
        .engine_candidates(
            options.platform,
            options.mode,
            options.engine_override.as_deref(),
            options.protocol,
        )
        .into_iter()
        .map(|(path, protocol)| (ProbeEntry::probe(path, EntryKind::File), protocol))
        .collect();

    SanityReport {
        mode: options.mode,
        platform: options.platform,
        engine_candidates,
        config_file: ProbeEntry::probe(orchestrator.config_store().path(), EntryKind::File),
        data_file: ProbeEntry::probe(layout.data_file_target(), EntryKind::File),
        bundled_data: layout
            .bundled_data_candidates(options.mode)
            .into_iter()
            .map(|path| ProbeEntry::probe(path, EntryKind::File))
            .collect(),
        output_dirs: layout
            .output_dir_candidates(options.mode)
            .into_iter()
            .map(|path| ProbeEntry::probe(path, EntryKind::Dir))
            .collect(),
        presentation_assets: layout
            .presentation_asset_candidates(options.mode)
            .into_iter()
            .map(|path| ProbeEntry::probe(path, EntryKind::File))
            .collect(),
    }
}

fn mark(entry: &ProbeEntry) -> &'static str {
    if entry.archived {
        "skip"
    } else if entry.exists {
        " ok "
    } else {
        " -- "
    }
}

/// Human-readable report for the terminal
pub fn render_report(report: &SanityReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Jadwal environment ({} mode, {})\n",
        report.mode, report.platform
    ));

    out.push_str("\nEngine candidates:\n");
    for (entry, protocol) in &report.engine_candidates {
        out.push_str(&format!("  [{}] {} ({})\n", mark(entry), entry.path.display(), protocol));
    }

    out.push_str("\nSettings:\n");
    out.push_str(&format!("  [{}] {}\n", mark(&report.config_file), report.config_file.path.display()));

    out.push_str("\nData file:\n");
    out.push_str(&format!("  [{}] {}\n", mark(&report.data_file), report.data_file.path.display()));
    for entry in &report.bundled_data {
        out.push_str(&format!("  [{}] {} (bundled)\n", mark(entry), entry.path.display()));
    }

    out.push_str("\nOutput directory:\n");
    for entry in &report.output_dirs {
        out.push_str(&format!("  [{}] {}\n", mark(entry), entry.path.display()));
    }

    out.push_str("\nPresentation asset:\n");
    for entry in &report.presentation_assets {
        out.push_str(&format!("  [{}] {}\n", mark(entry), entry.path.display()));
    }

    out.push('\n');
    if report.engine_found() {
        out.push_str("Engine: found\n");
    } else {
        out.push_str("Engine: NOT FOUND - place the engine at one of the candidates above or set JADWAL_ENGINE_PATH\n");
    }
    if !report.data_available() {
        out.push_str("Data file: not bootstrapped yet; you will be asked to pick one on first run\n");
    }
    out
}
