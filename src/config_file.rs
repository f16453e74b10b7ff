//! Persisted engine settings.
//!
//! The settings document lives at `<config dir>/config.json` and holds a single
//! `general` object. Loading never fails: a missing or damaged document yields
//! defaults, and each whitelisted field is merged on its own so that a newer
//! default schema fills in what older documents lack. Saving always writes a
//! complete, default-filled document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{JadwalError, Result};

/// Settings file name inside the configuration directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Template workbook the engine uses when none is configured
pub const DEFAULT_TEMPLATE_NAME: &str = "Template_Jadwal.xlsx";

const GENERAL_KEY: &str = "general";
const KEY_VERBOSE: &str = "verbose";
const KEY_OUTDIR: &str = "outdir";
const KEY_TEMPLATE: &str = "templateName";
const KEY_MASTER: &str = "masterOverride";

/// Engine preferences edited from the settings form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSettings {
    pub verbose: bool,
    /// Output directory override; `None` uses the canonical output directory
    pub output_dir: Option<PathBuf>,
    pub template_name: String,
    /// Input workbook override; `None` uses the bootstrapped data file
    pub master_override: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            output_dir: None,
            template_name: DEFAULT_TEMPLATE_NAME.to_string(),
            master_override: None,
        }
    }
}

/// A partial settings update. Absent fields take their defaults on save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsPatch {
    pub verbose: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub template_name: Option<String>,
    pub master_override: Option<PathBuf>,
}

impl From<&EngineSettings> for SettingsPatch {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            verbose: Some(settings.verbose),
            output_dir: settings.output_dir.clone(),
            template_name: Some(settings.template_name.clone()),
            master_override: settings.master_override.clone(),
        }
    }
}

impl SettingsPatch {
    /// Pick the whitelisted keys out of a stored `general` object.
    ///
    /// A key with the wrong type is treated as absent.
    fn from_general(general: &Map<String, Value>) -> Self {
        Self {
            verbose: field(general, KEY_VERBOSE),
            output_dir: field::<String>(general, KEY_OUTDIR).and_then(non_empty_path),
            template_name: field(general, KEY_TEMPLATE),
            master_override: field::<String>(general, KEY_MASTER).and_then(non_empty_path),
        }
    }
}

impl EngineSettings {
    /// Overlay a patch on top of the defaults
    pub fn from_patch(patch: SettingsPatch) -> Self {
        let defaults = Self::default();
        Self {
            verbose: patch.verbose.unwrap_or(defaults.verbose),
            output_dir: patch.output_dir.filter(|p| !p.as_os_str().is_empty()),
            template_name: patch
                .template_name
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(defaults.template_name),
            master_override: patch.master_override.filter(|p| !p.as_os_str().is_empty()),
        }
    }

    /// True when the template differs from the engine's built-in default
    pub fn has_custom_template(&self) -> bool {
        !self.template_name.trim().is_empty() && self.template_name != DEFAULT_TEMPLATE_NAME
    }

    /// On-disk representation: `{"general": {...}}` with empty strings for unset paths
    fn to_document(&self) -> Value {
        let mut general = Map::new();
        general.insert(KEY_VERBOSE.into(), Value::Bool(self.verbose));
        general.insert(KEY_OUTDIR.into(), Value::String(path_string(&self.output_dir)));
        general.insert(KEY_TEMPLATE.into(), Value::String(self.template_name.clone()));
        general.insert(KEY_MASTER.into(), Value::String(path_string(&self.master_override)));

        let mut root = Map::new();
        root.insert(GENERAL_KEY.into(), Value::Object(general));
        Value::Object(root)
    }
}

fn field<T: DeserializeOwned>(map: &Map<String, Value>, key: &str) -> Option<T> {
    map.get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn non_empty_path(raw: String) -> Option<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

fn path_string(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Owner of the on-disk settings document
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Store rooted at a configuration directory (created lazily on save)
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: config_dir.into(),
        }
    }

    /// Location of the settings document
    pub fn path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    /// Configuration directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read settings, substituting defaults for anything missing or unreadable
    pub fn load(&self) -> EngineSettings {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {:?}, using defaults", path);
                return EngineSettings::default();
            }
            Err(e) => {
                warn!("Failed to read settings from {:?}: {}", path, e);
                return EngineSettings::default();
            }
        };

        let document: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!("Settings at {:?} are not valid JSON, using defaults: {}", path, e);
                return EngineSettings::default();
            }
        };

        match document.get(GENERAL_KEY).and_then(Value::as_object) {
            Some(general) => EngineSettings::from_patch(SettingsPatch::from_general(general)),
            None => {
                warn!("Settings at {:?} have no `{}` object, using defaults", path, GENERAL_KEY);
                EngineSettings::default()
            }
        }
    }

    /// Merge `patch` over the defaults, persist the result and return it
    pub fn save(&self, patch: SettingsPatch) -> Result<EngineSettings> {
        let settings = EngineSettings::from_patch(patch);
        let json = serde_json::to_string_pretty(&settings.to_document())?;

        let path = self.path();
        fs::create_dir_all(&self.dir).map_err(|source| JadwalError::Persistence {
            path: self.dir.clone(),
            source,
        })?;
        write_atomic(&path, json.as_bytes()).map_err(|source| JadwalError::Persistence {
            path: path.clone(),
            source,
        })?;

        info!("Saved settings to {:?}", path);
        Ok(settings)
    }
}

/// Write to a sibling temporary file, then rename it over the target
fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let result = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
