//! Operations exposed to the presentation layer.
//!
//! [`Orchestrator`] composes the settings store, path resolver, data
//! bootstrapper and engine invoker. Each method is one user action; none of
//! them retries, and every error reaches the caller unchanged.

use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::bootstrap::{ensure_data_file, workbook_filter};
use crate::config_file::{ConfigStore, EngineSettings, SettingsPatch};
use crate::engine::runner::OutputObserver;
use crate::engine::{self, GenerationResult, Invocation};
use crate::error::{JadwalError, Result};
use crate::paths::{EnginePath, Layout, ResolvedLocations, ENGINE_OVERRIDE_ENV};
use crate::shell::{DesktopShell, FileFilter};
use crate::types::{DeploymentMode, EngineProtocol, GenerationRequest, Platform, ProtocolChoice};

const PICK_DATA_TITLE: &str = "Select the master data workbook";
const PICK_FOLDER_TITLE: &str = "Select output folder";
const PICK_FILE_TITLE: &str = "Select file";

/// How the orchestrator finds and talks to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorOptions {
    pub mode: DeploymentMode,
    pub platform: Platform,
    pub protocol: ProtocolChoice,
    /// Explicit engine path, normally from `JADWAL_ENGINE_PATH`
    pub engine_override: Option<String>,
}

impl OrchestratorOptions {
    /// Options for the running process: detected mode, host platform,
    /// automatic protocol, override from the environment
    pub fn from_env() -> Self {
        Self {
            mode: DeploymentMode::detect(),
            platform: Platform::current(),
            protocol: ProtocolChoice::Auto,
            engine_override: std::env::var(ENGINE_OVERRIDE_ENV).ok(),
        }
    }
}

/// Façade over the orchestration layer
pub struct Orchestrator {
    layout: Layout,
    options: OrchestratorOptions,
    store: ConfigStore,
    shell: Box<dyn DesktopShell>,
}

impl Orchestrator {
    pub fn new(layout: Layout, options: OrchestratorOptions, shell: Box<dyn DesktopShell>) -> Self {
        let store = ConfigStore::new(layout.resolve_config_dir());
        Self {
            layout,
            options,
            store,
            shell,
        }
    }

    /// Orchestrator for the running process
    pub fn discover(options: OrchestratorOptions, shell: Box<dyn DesktopShell>) -> Self {
        let layout = Layout::discover(options.mode);
        Self::new(layout, options, shell)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn load_settings(&self) -> EngineSettings {
        self.store.load()
    }

    pub fn save_settings(&self, patch: SettingsPatch) -> Result<EngineSettings> {
        self.store.save(patch)
    }

    pub fn pick_folder(&self) -> Option<PathBuf> {
        self.shell.pick_folder(PICK_FOLDER_TITLE)
    }

    pub fn pick_file(&self, filters: &[FileFilter]) -> Option<PathBuf> {
        self.shell.pick_file(PICK_FILE_TITLE, filters)
    }

    fn resolve_engine(&self) -> Result<EnginePath> {
        self.layout.resolve_engine_path(
            self.options.platform,
            self.options.mode,
            self.options.engine_override.as_deref(),
            self.options.protocol,
        )
    }

    /// Locations for this process start, without any per-request override
    pub fn locations(&self) -> Result<ResolvedLocations> {
        self.layout.resolve_all(
            self.options.platform,
            self.options.mode,
            self.options.engine_override.as_deref(),
            self.options.protocol,
        )
    }

    fn locations_for(&self, engine: EnginePath, settings: &EngineSettings) -> Result<ResolvedLocations> {
        let output_dir = self
            .layout
            .output_dir_for(self.options.mode, settings.output_dir.as_deref())?;
        Ok(ResolvedLocations {
            engine_path: engine.binary_path,
            engine_working_dir: engine.working_dir,
            protocol: engine.protocol,
            output_dir,
            config_dir: self.layout.resolve_config_dir(),
            presentation_asset_path: self.layout.resolve_presentation_asset(self.options.mode).ok(),
        })
    }

    /// Bootstrapped workbook for the flag protocol, unless the user points
    /// the engine at their own master file
    fn ensure_data(&self, protocol: EngineProtocol, settings: &EngineSettings) -> Result<Option<PathBuf>> {
        if protocol != EngineProtocol::Flag || settings.master_override.is_some() {
            return Ok(None);
        }
        let target = self.layout.data_file_target();
        let bundled = self.layout.bundled_data_candidates(self.options.mode);
        let path = ensure_data_file(&target, &bundled, || {
            self.shell.pick_file(PICK_DATA_TITLE, &[workbook_filter()])
        })?;
        Ok(Some(path))
    }

    /// Build the invocation `generate` would run, without running it.
    ///
    /// No data bootstrap happens; an already bootstrapped workbook is shown.
    pub fn plan(&self, request: &GenerationRequest) -> Result<Invocation> {
        request.validate()?;
        let settings = self.load_settings();
        let engine = self.resolve_engine()?;
        let data_file = (engine.protocol == EngineProtocol::Flag && settings.master_override.is_none())
            .then(|| self.layout.data_file_target())
            .filter(|p| p.is_file());
        let locations = self.locations_for(engine, &settings)?;
        Ok(engine::plan(
            &locations,
            self.options.platform,
            request,
            &settings,
            data_file.as_deref(),
            Local::now().time(),
        ))
    }

    pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        self.generate_with(request, None)
    }

    /// Run one generation, forwarding engine output to `observer`
    pub fn generate_with(
        &self,
        request: &GenerationRequest,
        observer: Option<OutputObserver<'_>>,
    ) -> Result<GenerationResult> {
        request.validate()?;
        let settings = self.load_settings();
        let engine = self.resolve_engine()?;
        let data_file = self.ensure_data(engine.protocol, &settings)?;
        let locations = self.locations_for(engine, &settings)?;

        info!(
            "Generating schedule for {}/{} with {} engine",
            request.month, request.year, locations.protocol
        );
        engine::invoke(
            &locations,
            self.options.platform,
            request,
            &settings,
            data_file.as_deref(),
            observer,
        )
    }

    /// Show `path` (or the canonical output directory) in the file manager.
    ///
    /// Files are revealed through their containing folder. Returns the folder
    /// that was opened.
    pub fn reveal_output(&self, path: Option<&Path>) -> Result<PathBuf> {
        let target = match path {
            Some(p) => p.to_path_buf(),
            None => self.layout.resolve_output_dir(self.options.mode)?,
        };
        if !target.exists() {
            return Err(JadwalError::reveal(format!(
                "{} does not exist",
                target.display()
            )));
        }

        let folder = if target.is_file() {
            target
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| JadwalError::reveal(format!("{} has no parent folder", target.display())))?
        } else {
            target
        };

        self.shell
            .open_folder(&folder)
            .map_err(|e| JadwalError::reveal(format!("failed to open {}: {}", folder.display(), e)))?;
        info!("Revealed {:?}", folder);
        Ok(folder)
    }
}
