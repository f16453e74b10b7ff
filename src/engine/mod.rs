//! Engine invocation: from a validated request to a supervised process.
//!
//! [`plan`] is pure: it picks the argument contract for the resolved
//! protocol, computes the output path where the protocol needs one up front,
//! and returns a complete [`Invocation`]. [`runner::run_invocation`] executes
//! it. Keeping the two apart lets `--dry-run` show exactly what would run.

pub mod args;
pub mod naming;
pub mod protocol;
pub mod runner;
pub mod sentinel;

use chrono::{Local, NaiveTime};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config_file::EngineSettings;
use crate::error::Result;
use crate::paths::ResolvedLocations;
use crate::types::{EngineProtocol, GenerationRequest, Platform};
use args::{EngineArgs, FlagArgs, PositionalArgs};
use runner::OutputObserver;

/// A fully built engine command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Variables layered on top of the inherited environment
    pub env: Vec<(String, String)>,
    pub working_dir: PathBuf,
    pub protocol: EngineProtocol,
    /// Output path known before the run (positional protocol only)
    pub expected_output: Option<PathBuf>,
}

impl Invocation {
    /// Wrap typed arguments for the engine at `engine_path`.
    ///
    /// Wrapper scripts on Windows go through `cmd.exe /c`.
    pub fn new(
        platform: Platform,
        engine_path: &Path,
        working_dir: &Path,
        engine_args: &dyn EngineArgs,
        expected_output: Option<PathBuf>,
    ) -> Self {
        let protocol = engine_args.protocol();
        let (program, args) = if platform.is_windows() && protocol == EngineProtocol::Positional {
            let mut args = vec!["/c".to_string(), engine_path.to_string_lossy().into_owned()];
            args.extend(engine_args.to_cli_args());
            (PathBuf::from("cmd.exe"), args)
        } else {
            (engine_path.to_path_buf(), engine_args.to_cli_args())
        };

        Self {
            program,
            args,
            env: engine_args.get_env_vars(),
            working_dir: working_dir.to_path_buf(),
            protocol,
            expected_output,
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{}={} ", key, quote(value))?;
        }
        write!(f, "{}", quote(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(s: &str) -> String {
    if !s.is_empty() && !s.contains(char::is_whitespace) && !s.contains('"') {
        s.to_string()
    } else {
        format!("{:?}", s)
    }
}

/// Outcome of a successful engine run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// `None` means the engine did not confirm where it wrote the workbook
    pub output_path: Option<PathBuf>,
    pub protocol: EngineProtocol,
}

/// Build the invocation for `request` without running anything.
///
/// `now` fixes the timestamp in the positional protocol's output name.
/// `data_file` is the bootstrapped workbook, exported to the flag protocol.
pub fn plan(
    locations: &ResolvedLocations,
    platform: Platform,
    request: &GenerationRequest,
    settings: &EngineSettings,
    data_file: Option<&Path>,
    now: NaiveTime,
) -> Invocation {
    match locations.protocol {
        EngineProtocol::Positional => {
            let file_name = naming::output_file_name(request.month, request.year, now);
            let output_path = locations.output_dir.join(file_name);
            let engine_args = PositionalArgs::new(request, output_path.clone());
            Invocation::new(
                platform,
                &locations.engine_path,
                &locations.engine_working_dir,
                &engine_args,
                Some(output_path),
            )
        }
        EngineProtocol::Flag => {
            let engine_args = FlagArgs::new(request, settings, data_file);
            Invocation::new(
                platform,
                &locations.engine_path,
                &locations.engine_working_dir,
                &engine_args,
                None,
            )
        }
    }
}

/// Plan and run one generation
pub fn invoke(
    locations: &ResolvedLocations,
    platform: Platform,
    request: &GenerationRequest,
    settings: &EngineSettings,
    data_file: Option<&Path>,
    observer: Option<OutputObserver<'_>>,
) -> Result<GenerationResult> {
    let invocation = plan(
        locations,
        platform,
        request,
        settings,
        data_file,
        Local::now().time(),
    );
    runner::run_invocation(&invocation, observer)
}
