//! Tests for supervised engine execution
//!
//! These tests run small `/bin/sh` programs as stand-in engines and verify:
//! - Exit status mapping (success, failure message precedence)
//! - Output path discovery for both protocols
//! - Live output forwarding and full capture
//! - Spawn failures and child registry bookkeeping

#![cfg(unix)]

use std::cell::RefCell;
use std::path::PathBuf;

use jadwal::engine::runner::{OutputEvent, Stream, run_invocation};
use jadwal::engine::Invocation;
use jadwal::error::JadwalError;
use jadwal::process_guard::ChildRegistry;
use jadwal::types::EngineProtocol;

fn sh(script: &str, protocol: EngineProtocol) -> Invocation {
    Invocation {
        program: PathBuf::from("/bin/sh"),
        args: vec!["-c".to_string(), script.to_string()],
        env: Vec::new(),
        working_dir: std::env::temp_dir(),
        protocol,
        expected_output: None,
    }
}

// =============================================================================
// Exit Status Tests
// =============================================================================

#[test]
fn test_failure_message_is_stderr_verbatim() {
    let inv = sh("echo progress; echo 'Sheet Pegawai not found' >&2; exit 2", EngineProtocol::Flag);

    match run_invocation(&inv, None) {
        Err(JadwalError::EngineExecution {
            message,
            exit_code,
            stdout,
            stderr,
        }) => {
            assert_eq!(message, "Sheet Pegawai not found\n");
            assert_eq!(exit_code, Some(2));
            assert_eq!(stdout, "progress\n");
            assert_eq!(stderr, "Sheet Pegawai not found\n");
        }
        other => panic!("expected EngineExecution, got {:?}", other),
    }
}

#[test]
fn test_failure_message_falls_back_to_stdout() {
    let inv = sh("echo 'bad input'; exit 1", EngineProtocol::Flag);

    let err = run_invocation(&inv, None).unwrap_err();
    assert_eq!(err.to_string(), "bad input\n");
}

#[test]
fn test_failure_message_without_output_names_exit_code() {
    let inv = sh("exit 7", EngineProtocol::Positional);

    let err = run_invocation(&inv, None).unwrap_err();
    assert_eq!(err.to_string(), "Engine exited with code 7");
}

// =============================================================================
// Output Path Tests
// =============================================================================

#[test]
fn test_flag_success_path_from_sentinel() {
    let inv = sh(
        "echo 'Membaca data...'; echo 'SUKSES: /tmp/out/Jadwal Maret.xlsx'",
        EngineProtocol::Flag,
    );

    let result = run_invocation(&inv, None).unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(
        result.output_path,
        Some(PathBuf::from("/tmp/out/Jadwal Maret.xlsx"))
    );
}

#[test]
fn test_flag_success_without_sentinel_has_no_path() {
    let inv = sh("echo done", EngineProtocol::Flag);

    let result = run_invocation(&inv, None).unwrap();
    assert_eq!(result.output_path, None);
    assert_eq!(result.stdout, "done\n");
}

#[test]
fn test_positional_success_uses_expected_output() {
    let mut inv = sh("echo \"$OUTPUT_PATH\"", EngineProtocol::Positional);
    let expected = PathBuf::from("/tmp/output/Jadwal_Bulan_Maret-2024_101500.xlsx");
    inv.env = vec![(
        "OUTPUT_PATH".to_string(),
        expected.to_string_lossy().into_owned(),
    )];
    inv.expected_output = Some(expected.clone());

    let result = run_invocation(&inv, None).unwrap();
    assert_eq!(result.output_path, Some(expected.clone()));
    assert_eq!(result.stdout.trim_end(), expected.to_string_lossy());
}

// =============================================================================
// Output Capture Tests
// =============================================================================

#[test]
fn test_observer_receives_both_streams() {
    let inv = sh("echo one; echo two >&2; echo three", EngineProtocol::Flag);
    let events: RefCell<Vec<OutputEvent>> = RefCell::new(Vec::new());
    let observer = |event: &OutputEvent| events.borrow_mut().push(event.clone());

    run_invocation(&inv, Some(&observer)).unwrap();

    let events = events.into_inner();
    let stdout: Vec<_> = events
        .iter()
        .filter(|e| e.stream == Stream::Stdout)
        .map(|e| e.line.as_str())
        .collect();
    let stderr: Vec<_> = events
        .iter()
        .filter(|e| e.stream == Stream::Stderr)
        .map(|e| e.line.as_str())
        .collect();
    assert_eq!(stdout, vec!["one", "three"]);
    assert_eq!(stderr, vec!["two"]);
}

#[test]
fn test_large_output_is_not_truncated() {
    // ~1.5 MB on stdout, well past any pipe buffer
    let inv = sh(
        "i=0; while [ $i -lt 20000 ]; do echo \"line $i padding padding padding padding padding\"; i=$((i+1)); done",
        EngineProtocol::Flag,
    );

    let result = run_invocation(&inv, None).unwrap();
    assert_eq!(result.stdout.lines().count(), 20000);
    assert!(result.stdout.ends_with("line 19999 padding padding padding padding padding\n"));
}

#[test]
fn test_output_without_trailing_newline_is_kept() {
    let inv = sh("printf 'SUKSES: /tmp/x.xlsx'", EngineProtocol::Flag);

    let result = run_invocation(&inv, None).unwrap();
    assert_eq!(result.stdout, "SUKSES: /tmp/x.xlsx");
    assert_eq!(result.output_path, Some(PathBuf::from("/tmp/x.xlsx")));
}

#[test]
fn test_environment_is_layered_on_parent() {
    let mut inv = sh("echo \"$JADWAL_DATA_FILE:${PATH:+has-path}\"", EngineProtocol::Flag);
    inv.env = vec![("JADWAL_DATA_FILE".to_string(), "/data/Master_Data.xlsx".to_string())];

    let result = run_invocation(&inv, None).unwrap();
    assert_eq!(result.stdout, "/data/Master_Data.xlsx:has-path\n");
}

// =============================================================================
// Spawn and Registry Tests
// =============================================================================

#[test]
fn test_missing_program_is_spawn_error() {
    let inv = Invocation {
        program: PathBuf::from("/nonexistent/jadwal-engine"),
        args: Vec::new(),
        env: Vec::new(),
        working_dir: std::env::temp_dir(),
        protocol: EngineProtocol::Flag,
        expected_output: None,
    };

    match run_invocation(&inv, None) {
        Err(JadwalError::Spawn { program, .. }) => {
            assert_eq!(program, PathBuf::from("/nonexistent/jadwal-engine"));
        }
        other => panic!("expected Spawn error, got {:?}", other),
    }
}

#[test]
fn test_child_is_unregistered_after_run() {
    let inv = sh("echo $$", EngineProtocol::Flag);

    let result = run_invocation(&inv, None).unwrap();
    let pid: u32 = result.stdout.trim().parse().unwrap();

    let registry = ChildRegistry::global();
    assert!(!registry.lock().unwrap().contains(pid));
}

#[test]
fn test_child_is_unregistered_after_failure() {
    let inv = sh("echo $$; exit 3", EngineProtocol::Flag);

    let err = run_invocation(&inv, None).unwrap_err();
    let JadwalError::EngineExecution { stdout, .. } = err else {
        panic!("expected EngineExecution");
    };
    let pid: u32 = stdout.trim().parse().unwrap();

    let registry = ChildRegistry::global();
    assert!(!registry.lock().unwrap().contains(pid));
}
