//! Typed argument contracts for the two engine protocols.
//!
//! Each protocol has a struct whose fields are the only inputs the engine
//! accepts; [`EngineArgs`] turns it into the exact argument vector and extra
//! environment the engine expects. The wrapper script reads `$1 $2 $3` and
//! `OUTPUT_PATH`; the native binary parses `-bulan`/`-tahun`-style flags.

use std::path::{Path, PathBuf};

use crate::config_file::EngineSettings;
use crate::types::{EngineProtocol, GenerationRequest};

/// Environment variable carrying the precomputed output path (positional protocol)
pub const OUTPUT_PATH_ENV: &str = "OUTPUT_PATH";
/// Environment variable carrying the bootstrapped workbook (flag protocol)
pub const DATA_FILE_ENV: &str = "JADWAL_DATA_FILE";

/// Trait for typed engine arguments.
///
/// # Contract
///
/// - `to_cli_args()`: arguments exactly as the engine parses them, without the program
/// - `get_env_vars()`: variables layered on top of the inherited environment
/// - `protocol()`: which calling convention the arguments follow
pub trait EngineArgs {
    fn to_cli_args(&self) -> Vec<String>;

    fn get_env_vars(&self) -> Vec<(String, String)>;

    fn protocol(&self) -> EngineProtocol;
}

/// Arguments for the wrapper script: `<month> <year> <extra>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalArgs {
    pub month: u32,
    pub year: u32,
    pub extra_param: u32,
    /// Where the engine must write the workbook
    pub output_path: PathBuf,
}

impl PositionalArgs {
    pub fn new(request: &GenerationRequest, output_path: PathBuf) -> Self {
        Self {
            month: request.month,
            year: request.year,
            extra_param: request.extra_param_or_default(),
            output_path,
        }
    }
}

impl EngineArgs for PositionalArgs {
    fn to_cli_args(&self) -> Vec<String> {
        vec![
            self.month.to_string(),
            self.year.to_string(),
            self.extra_param.to_string(),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![(
            OUTPUT_PATH_ENV.to_string(),
            self.output_path.to_string_lossy().into_owned(),
        )]
    }

    fn protocol(&self) -> EngineProtocol {
        EngineProtocol::Positional
    }
}

/// Arguments for the native binary.
///
/// Optional fields only produce a flag when set, so a default configuration
/// yields `-bulan <M> -tahun <Y>` and nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagArgs {
    pub month: u32,
    pub year: u32,
    pub single_day: Option<u32>,
    pub verbose: bool,
    pub output_dir: Option<PathBuf>,
    /// Only set when it differs from the engine's built-in template
    pub template_name: Option<String>,
    pub master: Option<PathBuf>,
    /// Bootstrapped workbook, exported through the environment
    pub data_file: Option<PathBuf>,
}

impl FlagArgs {
    pub fn new(
        request: &GenerationRequest,
        settings: &EngineSettings,
        data_file: Option<&Path>,
    ) -> Self {
        Self {
            month: request.month,
            year: request.year,
            single_day: request.single_day.filter(|d| (1..=31).contains(d)),
            verbose: settings.verbose,
            output_dir: settings.output_dir.clone(),
            template_name: settings
                .has_custom_template()
                .then(|| settings.template_name.clone()),
            master: settings.master_override.clone(),
            data_file: data_file.map(Path::to_path_buf),
        }
    }
}

impl EngineArgs for FlagArgs {
    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "-bulan".to_string(),
            self.month.to_string(),
            "-tahun".to_string(),
            self.year.to_string(),
        ];

        if self.verbose {
            args.push("-v".to_string());
        }
        if let Some(dir) = &self.output_dir {
            args.push("-outdir".to_string());
            args.push(dir.to_string_lossy().into_owned());
        }
        if let Some(template) = &self.template_name {
            args.push("-template".to_string());
            args.push(template.clone());
        }
        if let Some(master) = &self.master {
            args.push("-master".to_string());
            args.push(master.to_string_lossy().into_owned());
        }
        if let Some(day) = self.single_day {
            args.push("-tgl".to_string());
            args.push(day.to_string());
        }

        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        self.data_file
            .iter()
            .map(|path| (DATA_FILE_ENV.to_string(), path.to_string_lossy().into_owned()))
            .collect()
    }

    fn protocol(&self) -> EngineProtocol {
        EngineProtocol::Flag
    }
}
