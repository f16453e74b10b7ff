//! Deployment-aware path resolution.
//!
//! Every location the orchestrator needs (engine artifact, output directory,
//! presentation asset, bundled data) is found the same way: build an ordered
//! list of candidates from the [`Layout`] roots and take the first one that
//! exists. Candidates inside an archive container are never returned, since
//! nothing can be executed or copied out of a packed archive in place.

use serde::Serialize;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::engine::protocol::{artifact_under, protocol_for_override};
use crate::error::{JadwalError, Result};
use crate::types::{DeploymentMode, EngineProtocol, Platform, ProtocolChoice};

/// Per-user application folder under the documents directory
pub const APP_FOLDER: &str = "JadwalGenerator";

/// Environment variable holding an explicit engine path
pub const ENGINE_OVERRIDE_ENV: &str = "JADWAL_ENGINE_PATH";
/// Environment variable replacing `<documents>/<app folder>`
pub const HOME_OVERRIDE_ENV: &str = "JADWAL_HOME";
/// Environment variable replacing the application logical root
pub const APP_ROOT_ENV: &str = "JADWAL_APP_ROOT";

/// Name of the bootstrapped input workbook
pub const DATA_FILE_NAME: &str = "Master_Data.xlsx";
/// Entry document for the presentation layer
pub const PRESENTATION_ASSET_NAME: &str = "index.html";

const DATA_DIR: &str = "data";
const UNPACKED_DIR: &str = "app.asar.unpacked";
const ARCHIVE_EXTENSION: &str = "asar";

/// True if any component of `path` is an archive container (`*.asar`)
pub fn is_inside_archive(path: &Path) -> bool {
    path.components().any(|component| {
        Path::new(component.as_os_str())
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
    })
}

/// What a candidate must be on disk to count as found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

impl EntryKind {
    /// True if `path` exists and has this kind
    pub fn matches(self, path: &Path) -> bool {
        match self {
            EntryKind::File => path.is_file(),
            EntryKind::Dir => path.is_dir(),
        }
    }
}

/// First candidate of the given kind on disk, skipping archive-contained paths
pub fn first_existing<'a, I>(candidates: I, kind: EntryKind) -> Option<&'a Path>
where
    I: IntoIterator<Item = &'a Path>,
{
    candidates.into_iter().find(|candidate| {
        if is_inside_archive(candidate) {
            debug!("Skipping archive-contained candidate {:?}", candidate);
            return false;
        }
        let found = kind.matches(candidate);
        if !found && candidate.exists() {
            warn!("Skipping {:?}: not a {:?}", candidate, kind);
        } else {
            debug!("Probe {:?}: {}", candidate, if found { "found" } else { "missing" });
        }
        found
    })
}

fn push_unique(list: &mut Vec<PathBuf>, path: PathBuf) {
    if !list.contains(&path) {
        list.push(path);
    }
}

/// Engine artifact chosen by [`Layout::resolve_engine_path`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnginePath {
    pub binary_path: PathBuf,
    pub working_dir: PathBuf,
    pub protocol: EngineProtocol,
}

/// Locations computed once per process start
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLocations {
    pub engine_path: PathBuf,
    pub engine_working_dir: PathBuf,
    pub protocol: EngineProtocol,
    pub output_dir: PathBuf,
    pub config_dir: PathBuf,
    /// `None` when no entry document ships with this deployment
    pub presentation_asset_path: Option<PathBuf>,
}

/// Probe roots for one running process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Packaged runtime resources (`<exe dir>/resources`, `Contents/Resources` on macOS)
    pub resources_dir: PathBuf,
    /// Directory of the running executable
    pub module_dir: PathBuf,
    /// Application logical root
    pub app_root: PathBuf,
    /// Current working directory
    pub cwd: PathBuf,
    /// User-writable application folder (`<documents>/JadwalGenerator`)
    pub user_home: PathBuf,
}

impl Layout {
    /// Build the layout from the running process and its environment
    pub fn discover(mode: DeploymentMode) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let module_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| cwd.clone());

        let resources_dir = if cfg!(target_os = "macos") {
            module_dir
                .parent()
                .map(|contents| contents.join("Resources"))
                .unwrap_or_else(|| module_dir.join("resources"))
        } else {
            module_dir.join("resources")
        };

        let app_root = env_path(APP_ROOT_ENV).unwrap_or_else(|| match mode {
            DeploymentMode::Packaged => resources_dir.join("app"),
            DeploymentMode::Development => option_env!("CARGO_MANIFEST_DIR")
                .map(PathBuf::from)
                .filter(|p| p.is_dir())
                .unwrap_or_else(|| module_dir.clone()),
        });

        let user_home = env_path(HOME_OVERRIDE_ENV).unwrap_or_else(|| {
            dirs::document_dir()
                .or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
                .unwrap_or_else(|| cwd.clone())
                .join(APP_FOLDER)
        });

        let layout = Self {
            resources_dir,
            module_dir,
            app_root,
            cwd,
            user_home,
        };
        debug!("Discovered layout for {} mode: {:?}", mode, layout);
        layout
    }

    /// `path` itself when absolute, else joined onto the working directory
    pub fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// Nested layout for archive-packaged deployments
    pub fn unpacked_dir(&self) -> PathBuf {
        self.resources_dir.join(UNPACKED_DIR)
    }

    /// Search roots in priority order for the given mode
    fn roots(&self, mode: DeploymentMode) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if mode.is_packaged() {
            push_unique(&mut roots, self.resources_dir.clone());
            push_unique(&mut roots, self.unpacked_dir());
        }
        push_unique(&mut roots, self.module_dir.clone());
        push_unique(&mut roots, self.app_root.clone());
        push_unique(&mut roots, self.cwd.clone());
        roots
    }

    /// Ordered engine candidates, each tagged with the protocol it implies
    pub fn engine_candidates(
        &self,
        platform: Platform,
        mode: DeploymentMode,
        override_value: Option<&str>,
        choice: ProtocolChoice,
    ) -> Vec<(PathBuf, EngineProtocol)> {
        let mut candidates: Vec<(PathBuf, EngineProtocol)> = Vec::new();

        if let Some(raw) = override_value.map(str::trim).filter(|v| !v.is_empty()) {
            let path = self.absolute(Path::new(raw));
            let protocol = protocol_for_override(&path, choice);
            candidates.push((path, protocol));
        }

        for root in self.roots(mode) {
            for protocol in choice.protocols() {
                let path = artifact_under(&root, platform, *protocol);
                if !candidates.iter().any(|(existing, _)| *existing == path) {
                    candidates.push((path, *protocol));
                }
            }
        }
        candidates
    }

    /// Locate the engine artifact.
    ///
    /// The first existing candidate wins and its directory becomes the working
    /// directory. On Unix a missing execute bit is added, best effort.
    pub fn resolve_engine_path(
        &self,
        platform: Platform,
        mode: DeploymentMode,
        override_value: Option<&str>,
        choice: ProtocolChoice,
    ) -> Result<EnginePath> {
        let candidates = self.engine_candidates(platform, mode, override_value, choice);
        let found = first_existing(
            candidates.iter().map(|(path, _)| path.as_path()),
            EntryKind::File,
        )
        .map(Path::to_path_buf);

        let Some(binary_path) = found else {
            return Err(JadwalError::EngineNotFound {
                candidates: candidates.into_iter().map(|(path, _)| path).collect(),
            });
        };
        let protocol = candidates
            .iter()
            .find(|(path, _)| *path == binary_path)
            .map(|(_, protocol)| *protocol)
            .unwrap_or(EngineProtocol::Flag);

        let working_dir = binary_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cwd.clone());

        if !platform.is_windows() {
            ensure_executable(&binary_path);
        }

        info!("Resolved {} engine at {:?}", protocol, binary_path);
        Ok(EnginePath {
            binary_path,
            working_dir,
            protocol,
        })
    }

    /// Canonical output directory candidates for the mode
    pub fn output_dir_candidates(&self, mode: DeploymentMode) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        match mode {
            DeploymentMode::Packaged => push_unique(&mut candidates, self.user_home.join("output")),
            DeploymentMode::Development => {
                push_unique(&mut candidates, self.app_root.join("output"));
                push_unique(&mut candidates, self.cwd.join("output"));
            }
        }
        candidates
    }

    /// Canonical output directory, created on demand
    pub fn resolve_output_dir(&self, mode: DeploymentMode) -> Result<PathBuf> {
        let candidates = self.output_dir_candidates(mode);
        if let Some(existing) = first_existing(candidates.iter().map(PathBuf::as_path), EntryKind::Dir) {
            return Ok(existing.to_path_buf());
        }
        let first = candidates
            .into_iter()
            .next()
            .unwrap_or_else(|| self.cwd.join("output"));
        ensure_dir(&first)?;
        Ok(first)
    }

    /// Output directory for one request: the settings override when present
    pub fn output_dir_for(&self, mode: DeploymentMode, override_dir: Option<&Path>) -> Result<PathBuf> {
        match override_dir {
            Some(dir) => {
                ensure_dir(dir)?;
                Ok(dir.to_path_buf())
            }
            None => self.resolve_output_dir(mode),
        }
    }

    /// User-writable configuration directory (not created here)
    pub fn resolve_config_dir(&self) -> PathBuf {
        self.user_home.join("config")
    }

    /// Canonical location of the bootstrapped input workbook
    pub fn data_file_target(&self) -> PathBuf {
        self.resolve_config_dir().join(DATA_FILE_NAME)
    }

    /// Bundled workbook candidates in priority order
    pub fn bundled_data_candidates(&self, mode: DeploymentMode) -> Vec<PathBuf> {
        self.roots(mode)
            .into_iter()
            .map(|root| root.join(DATA_DIR).join(DATA_FILE_NAME))
            .collect()
    }

    /// Presentation asset candidates in priority order
    pub fn presentation_asset_candidates(&self, mode: DeploymentMode) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if mode.is_packaged() {
            push_unique(&mut candidates, self.resources_dir.join("app").join(PRESENTATION_ASSET_NAME));
            push_unique(&mut candidates, self.resources_dir.join(PRESENTATION_ASSET_NAME));
        }
        push_unique(&mut candidates, self.module_dir.join(PRESENTATION_ASSET_NAME));
        push_unique(&mut candidates, self.app_root.join(PRESENTATION_ASSET_NAME));
        push_unique(&mut candidates, self.cwd.join(PRESENTATION_ASSET_NAME));
        candidates
    }

    /// Entry document for the presentation layer
    pub fn resolve_presentation_asset(&self, mode: DeploymentMode) -> Result<PathBuf> {
        let candidates = self.presentation_asset_candidates(mode);
        match first_existing(candidates.iter().map(PathBuf::as_path), EntryKind::File) {
            Some(found) => Ok(found.to_path_buf()),
            None => Err(JadwalError::AssetNotFound { candidates }),
        }
    }

    /// Resolve every location for a process start
    pub fn resolve_all(
        &self,
        platform: Platform,
        mode: DeploymentMode,
        override_value: Option<&str>,
        choice: ProtocolChoice,
    ) -> Result<ResolvedLocations> {
        let engine = self.resolve_engine_path(platform, mode, override_value, choice)?;
        let output_dir = self.resolve_output_dir(mode)?;
        let presentation_asset_path = self.resolve_presentation_asset(mode).ok();
        Ok(ResolvedLocations {
            engine_path: engine.binary_path,
            engine_working_dir: engine.working_dir,
            protocol: engine.protocol,
            output_dir,
            config_dir: self.resolve_config_dir(),
            presentation_asset_path,
        })
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Create a directory (and parents); an existing directory is fine
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Add execute permission if the file has none (Unix only, best effort)
#[cfg(unix)]
pub fn ensure_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            warn!("Cannot stat {:?} to check execute bit: {}", path, e);
            return;
        }
    };
    let mode = metadata.permissions().mode();
    if mode & 0o111 != 0 {
        return;
    }
    let mut permissions = metadata.permissions();
    permissions.set_mode(mode | 0o111);
    match fs::set_permissions(path, permissions) {
        Ok(()) => debug!("Added execute permission to {:?}", path),
        Err(e) => warn!("Failed to make {:?} executable: {}", path, e),
    }
}

#[cfg(not(unix))]
pub fn ensure_executable(_path: &Path) {}
