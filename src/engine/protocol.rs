//! Which calling convention an engine artifact speaks.
//!
//! Native binaries live in `engine/` and take flags; wrapper scripts live in
//! `pythonScripts/` and take positional arguments. An explicit override path
//! is classified by its extension unless the protocol is forced.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::types::{EngineProtocol, Platform, ProtocolChoice};

/// Directory holding the native engine binary
pub const ENGINE_DIR: &str = "engine";
/// Directory holding the wrapper script
pub const WRAPPER_DIR: &str = "pythonScripts";

/// Protocol implied by an artifact's file name
pub fn protocol_for_artifact(path: &Path) -> EngineProtocol {
    match path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("sh") | Some("bat") | Some("cmd") => EngineProtocol::Positional,
        _ => EngineProtocol::Flag,
    }
}

/// Protocol for an explicitly configured artifact
pub fn protocol_for_override(path: &Path, choice: ProtocolChoice) -> EngineProtocol {
    match choice {
        ProtocolChoice::Auto => protocol_for_artifact(path),
        ProtocolChoice::Positional => EngineProtocol::Positional,
        ProtocolChoice::Flag => EngineProtocol::Flag,
    }
}

/// Conventional artifact location for `protocol` under a search root
pub fn artifact_under(root: &Path, platform: Platform, protocol: EngineProtocol) -> PathBuf {
    match protocol {
        EngineProtocol::Flag => root.join(ENGINE_DIR).join(platform.engine_binary_name()),
        EngineProtocol::Positional => root.join(WRAPPER_DIR).join(platform.wrapper_script_name()),
    }
}
