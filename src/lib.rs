//! Jadwal orchestration library
//!
//! Locates the schedule engine for the current deployment layout, prepares
//! its data and settings, runs it as a supervised child process and reports
//! where the generated workbook ended up.

pub mod bootstrap;
pub mod cli;
pub mod config_file;
pub mod engine;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod paths;
pub mod process_guard;
pub mod sanity;
pub mod shell;
pub mod types;

// Re-export main types for convenience
pub use config_file::{ConfigStore, EngineSettings, SettingsPatch};
pub use engine::args::{EngineArgs, FlagArgs, PositionalArgs};
pub use engine::runner::{OutputEvent, Stream, run_invocation};
pub use engine::{GenerationResult, Invocation};
pub use error::{JadwalError, Result};
pub use executor::{Operation, OrchestratorRequest, OrchestratorResponse, Outcome, spawn_executor_thread};
pub use orchestrator::{Orchestrator, OrchestratorOptions};
pub use paths::{EnginePath, Layout, ResolvedLocations};
pub use process_guard::{ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use shell::{DesktopShell, FileFilter, HeadlessShell};
pub use types::{DeploymentMode, EngineProtocol, GenerationRequest, Platform, ProtocolChoice};
