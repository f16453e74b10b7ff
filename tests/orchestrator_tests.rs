//! End-to-end tests for the orchestration façade
//!
//! Each test builds an explicit `Layout` inside a temporary directory and
//! installs a shell script as the engine, so nothing depends on the host's
//! real documents folder or environment variables.

#![cfg(unix)]

use regex::Regex;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use jadwal::config_file::SettingsPatch;
use jadwal::engine::GenerationResult;
use jadwal::error::{JadwalError, Result};
use jadwal::executor::{Operation, OrchestratorRequest, Outcome, spawn_executor_thread};
use jadwal::orchestrator::{Orchestrator, OrchestratorOptions};
use jadwal::paths::Layout;
use jadwal::shell::{DesktopShell, FileFilter, HeadlessShell};
use jadwal::types::{DeploymentMode, EngineProtocol, GenerationRequest, Platform, ProtocolChoice};

// =============================================================================
// Helpers
// =============================================================================

fn layout(root: &Path) -> Layout {
    Layout {
        resources_dir: root.join("resources"),
        module_dir: root.join("bin"),
        app_root: root.join("app"),
        cwd: root.join("cwd"),
        user_home: root.join("home"),
    }
}

fn options(protocol: ProtocolChoice) -> OrchestratorOptions {
    OrchestratorOptions {
        mode: DeploymentMode::Development,
        platform: Platform::current(),
        protocol,
        engine_override: None,
    }
}

fn orchestrator(root: &Path, shell: Box<dyn DesktopShell>) -> Orchestrator {
    Orchestrator::new(layout(root), options(ProtocolChoice::Auto), shell)
}

fn write_script(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    {
        let mut file = fs::File::create(path).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file.sync_all().unwrap();
    }
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn wrapper_script(root: &Path) -> PathBuf {
    root.join("cwd").join("pythonScripts").join("run.sh")
}

fn flag_engine(root: &Path) -> PathBuf {
    root.join("app").join("engine").join("jadwal-engine")
}

/// `generate`, retrying while another test thread still holds a freshly
/// written script open for writing (ETXTBSY)
fn generate(orchestrator: &Orchestrator, request: &GenerationRequest) -> Result<GenerationResult> {
    for _ in 0..10 {
        match orchestrator.generate(request) {
            Err(JadwalError::Spawn { source, .. }) if source.raw_os_error() == Some(26) => {
                std::thread::sleep(Duration::from_millis(50));
            }
            other => return other,
        }
    }
    orchestrator.generate(request)
}

/// Shell that records reveal calls and always succeeds
#[derive(Clone, Default)]
struct RecordingShell {
    opened: Arc<Mutex<Vec<PathBuf>>>,
}

impl DesktopShell for RecordingShell {
    fn pick_folder(&self, _title: &str) -> Option<PathBuf> {
        None
    }

    fn pick_file(&self, _title: &str, _filters: &[FileFilter]) -> Option<PathBuf> {
        None
    }

    fn open_folder(&self, folder: &Path) -> std::io::Result<()> {
        self.opened.lock().unwrap().push(folder.to_path_buf());
        Ok(())
    }
}

// =============================================================================
// Positional Protocol Tests
// =============================================================================

#[test]
fn test_positional_generation_writes_named_workbook() {
    let dir = TempDir::new().unwrap();
    write_script(
        &wrapper_script(dir.path()),
        "echo \"$1 $2 $3\"\npwd\nprintf workbook > \"$OUTPUT_PATH\"\n",
    );
    let orch = orchestrator(dir.path(), Box::new(HeadlessShell::default()));

    let request = GenerationRequest::month(3, 2024).unwrap();
    let result = generate(&orch, &request).unwrap();

    assert_eq!(result.protocol, EngineProtocol::Positional);
    let output = result.output_path.expect("positional run knows its output");
    let name = output.file_name().unwrap().to_string_lossy().into_owned();
    let pattern = Regex::new(r"^Jadwal_Bulan_Maret-2024_\d{6}\.xlsx$").unwrap();
    assert!(pattern.is_match(&name), "unexpected file name {}", name);
    assert_eq!(output.parent().unwrap(), dir.path().join("app").join("output"));
    assert_eq!(fs::read_to_string(&output).unwrap(), "workbook");

    let mut lines = result.stdout.lines();
    assert_eq!(lines.next(), Some("3 2024 3"));
    let cwd = PathBuf::from(lines.next().unwrap());
    assert_eq!(
        fs::canonicalize(cwd).unwrap(),
        fs::canonicalize(dir.path().join("cwd").join("pythonScripts")).unwrap()
    );
}

#[test]
fn test_positional_extra_param_is_forwarded() {
    let dir = TempDir::new().unwrap();
    write_script(&wrapper_script(dir.path()), "echo \"$3\"\n");
    let orch = orchestrator(dir.path(), Box::new(HeadlessShell::default()));

    let request = GenerationRequest::parse("1", "2025", None, Some("5")).unwrap();
    let result = generate(&orch, &request).unwrap();
    assert_eq!(result.stdout, "5\n");
}

#[test]
fn test_settings_output_dir_is_created_and_used() {
    let dir = TempDir::new().unwrap();
    write_script(&wrapper_script(dir.path()), "printf x > \"$OUTPUT_PATH\"\n");
    let orch = orchestrator(dir.path(), Box::new(HeadlessShell::default()));
    let custom = dir.path().join("custom").join("out");
    orch.save_settings(SettingsPatch {
        output_dir: Some(custom.clone()),
        ..Default::default()
    })
    .unwrap();

    let result = generate(&orch, &GenerationRequest::month(12, 2024).unwrap()).unwrap();

    let output = result.output_path.unwrap();
    assert_eq!(output.parent().unwrap(), custom);
    assert!(output.exists());
}

#[test]
fn test_engine_failure_reports_stderr() {
    let dir = TempDir::new().unwrap();
    write_script(
        &wrapper_script(dir.path()),
        "echo 'Sheet Pegawai tidak ditemukan' >&2\nexit 1\n",
    );
    let orch = orchestrator(dir.path(), Box::new(HeadlessShell::default()));

    let err = generate(&orch, &GenerationRequest::month(3, 2024).unwrap()).unwrap_err();
    match err {
        JadwalError::EngineExecution { message, exit_code, .. } => {
            assert_eq!(message, "Sheet Pegawai tidak ditemukan\n");
            assert_eq!(exit_code, Some(1));
        }
        other => panic!("expected EngineExecution, got {:?}", other),
    }
}

#[test]
fn test_wrapper_without_execute_bit_is_fixed_up() {
    let dir = TempDir::new().unwrap();
    let script = wrapper_script(dir.path());
    write_script(&script, "echo ok\n");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();
    let orch = orchestrator(dir.path(), Box::new(HeadlessShell::default()));

    let result = generate(&orch, &GenerationRequest::month(3, 2024).unwrap()).unwrap();

    assert_eq!(result.stdout, "ok\n");
    let mode = fs::metadata(&script).unwrap().permissions().mode();
    assert_ne!(mode & 0o111, 0);
}

// =============================================================================
// Engine Resolution Tests
// =============================================================================

#[test]
fn test_missing_engine_lists_every_candidate() {
    let dir = TempDir::new().unwrap();
    let orch = orchestrator(dir.path(), Box::new(HeadlessShell::default()));

    let err = generate(&orch, &GenerationRequest::month(3, 2024).unwrap()).unwrap_err();
    match err {
        JadwalError::EngineNotFound { candidates } => {
            // 3 development roots x 2 protocols
            assert_eq!(candidates.len(), 6);
            assert!(candidates.contains(&wrapper_script(dir.path())));
            assert!(candidates.contains(&flag_engine(dir.path())));
        }
        other => panic!("expected EngineNotFound, got {:?}", other),
    }
    // Nothing is created when the engine is missing
    assert!(!dir.path().join("app").join("output").exists());
    assert!(!dir.path().join("home").exists());
}

#[test]
fn test_invalid_request_is_rejected_before_resolution() {
    let dir = TempDir::new().unwrap();
    let orch = orchestrator(dir.path(), Box::new(HeadlessShell::default()));
    let request = GenerationRequest {
        month: 13,
        year: 2024,
        single_day: None,
        extra_param: None,
    };

    assert!(matches!(
        orch.generate(&request),
        Err(JadwalError::InvalidRequest(_))
    ));
}

#[test]
fn test_override_path_wins_and_implies_protocol() {
    let dir = TempDir::new().unwrap();
    let elsewhere = dir.path().join("elsewhere").join("custom.sh");
    write_script(&elsewhere, "echo \"$1/$2\"\n");
    write_script(&flag_engine(dir.path()), "echo should-not-run\n");

    let mut opts = options(ProtocolChoice::Auto);
    opts.engine_override = Some(elsewhere.to_string_lossy().into_owned());
    let orch = Orchestrator::new(layout(dir.path()), opts, Box::new(HeadlessShell::default()));

    let result = generate(&orch, &GenerationRequest::month(4, 2024).unwrap()).unwrap();
    assert_eq!(result.protocol, EngineProtocol::Positional);
    assert_eq!(result.stdout, "4/2024\n");
}

#[test]
fn test_relative_override_runs_from_its_own_folder() {
    let dir = TempDir::new().unwrap();
    let tools = dir.path().join("cwd").join("tools");
    write_script(&tools.join("custom.sh"), "echo \"$1/$2\"\npwd\n");
    write_script(&dir.path().join("cwd").join("bare.sh"), "echo bare\n");

    for (raw, expected_dir) in [
        ("tools/custom.sh", tools.clone()),
        ("./tools/custom.sh", tools.clone()),
        ("bare.sh", dir.path().join("cwd")),
    ] {
        let mut opts = options(ProtocolChoice::Auto);
        opts.engine_override = Some(raw.to_string());
        let orch = Orchestrator::new(layout(dir.path()), opts, Box::new(HeadlessShell::default()));

        let result = generate(&orch, &GenerationRequest::month(5, 2024).unwrap())
            .unwrap_or_else(|e| panic!("override {:?} failed: {}", raw, e));
        assert_eq!(result.protocol, EngineProtocol::Positional);
        let mut lines = result.stdout.lines();
        let first = lines.next().unwrap();
        if raw == "bare.sh" {
            assert_eq!(first, "bare");
            continue;
        }
        assert_eq!(first, "5/2024");
        let cwd = PathBuf::from(lines.next().unwrap());
        assert_eq!(
            fs::canonicalize(cwd).unwrap(),
            fs::canonicalize(&expected_dir).unwrap()
        );
    }
}

// =============================================================================
// Flag Protocol Tests
// =============================================================================

const FLAG_ENGINE: &str = "echo \"ARGS $*\"\necho \"DATA $JADWAL_DATA_FILE\"\necho \"SUKSES: /tmp/Jadwal_Februari_2025.xlsx\"\n";

#[test]
fn test_flag_generation_bootstraps_from_picker() {
    let dir = TempDir::new().unwrap();
    write_script(&flag_engine(dir.path()), FLAG_ENGINE);
    let picked = dir.path().join("Downloads").join("roster.xlsx");
    fs::create_dir_all(picked.parent().unwrap()).unwrap();
    fs::write(&picked, b"roster").unwrap();
    let orch = orchestrator(dir.path(), Box::new(HeadlessShell::with_file(&picked)));

    let result = generate(&orch, &GenerationRequest::month(2, 2025).unwrap()).unwrap();

    let target = orch.layout().data_file_target();
    assert_eq!(fs::read(&target).unwrap(), b"roster");
    assert_eq!(result.protocol, EngineProtocol::Flag);
    assert!(result.stdout.contains("ARGS -bulan 2 -tahun 2025\n"));
    assert!(result.stdout.contains(&format!("DATA {}\n", target.display())));
    assert_eq!(
        result.output_path,
        Some(PathBuf::from("/tmp/Jadwal_Februari_2025.xlsx"))
    );
}

#[test]
fn test_flag_generation_prefers_bundled_data() {
    let dir = TempDir::new().unwrap();
    write_script(&flag_engine(dir.path()), FLAG_ENGINE);
    let bundled = dir.path().join("app").join("data").join("Master_Data.xlsx");
    fs::create_dir_all(bundled.parent().unwrap()).unwrap();
    fs::write(&bundled, b"bundled").unwrap();
    let orch = orchestrator(dir.path(), Box::new(HeadlessShell::default()));

    generate(&orch, &GenerationRequest::month(2, 2025).unwrap()).unwrap();

    let target = orch.layout().data_file_target();
    assert_eq!(fs::read(&target).unwrap(), b"bundled");

    // A later run keeps the user's copy
    fs::write(&target, b"edited").unwrap();
    generate(&orch, &GenerationRequest::month(3, 2025).unwrap()).unwrap();
    assert_eq!(fs::read(&target).unwrap(), b"edited");
}

#[test]
fn test_flag_generation_without_data_does_not_start_engine() {
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("engine-ran");
    write_script(
        &flag_engine(dir.path()),
        &format!("touch \"{}\"\n", marker.display()),
    );
    let orch = orchestrator(dir.path(), Box::new(HeadlessShell::default()));

    let err = generate(&orch, &GenerationRequest::month(2, 2025).unwrap()).unwrap_err();
    assert!(matches!(err, JadwalError::MissingDataFile(_)));
    assert!(!marker.exists());
}

#[test]
fn test_master_override_skips_bootstrap() {
    let dir = TempDir::new().unwrap();
    write_script(&flag_engine(dir.path()), FLAG_ENGINE);
    let orch = orchestrator(dir.path(), Box::new(HeadlessShell::default()));
    orch.save_settings(SettingsPatch {
        master_override: Some(PathBuf::from("/shared/Master.xlsx")),
        verbose: Some(true),
        ..Default::default()
    })
    .unwrap();

    let result = generate(&orch, &GenerationRequest::month(2, 2025).unwrap()).unwrap();

    assert!(result
        .stdout
        .contains("ARGS -bulan 2 -tahun 2025 -v -master /shared/Master.xlsx\n"));
    assert!(result.stdout.contains("DATA \n"));
    assert!(!orch.layout().data_file_target().exists());
}

#[test]
fn test_plan_includes_custom_template_only() {
    let dir = TempDir::new().unwrap();
    write_script(&flag_engine(dir.path()), FLAG_ENGINE);
    let orch = orchestrator(dir.path(), Box::new(HeadlessShell::default()));
    let request = GenerationRequest::parse("3", "2024", Some("15"), None).unwrap();

    let plan = orch.plan(&request).unwrap();
    assert!(!plan.args.contains(&"-template".to_string()));
    assert_eq!(plan.args, vec!["-bulan", "3", "-tahun", "2024", "-tgl", "15"]);

    orch.save_settings(SettingsPatch {
        template_name: Some("Custom.xlsx".to_string()),
        ..Default::default()
    })
    .unwrap();
    let plan = orch.plan(&request).unwrap();
    assert_eq!(
        plan.args,
        vec!["-bulan", "3", "-tahun", "2024", "-template", "Custom.xlsx", "-tgl", "15"]
    );
    // Planning never bootstraps
    assert!(!orch.layout().data_file_target().exists());
}

// =============================================================================
// Reveal Tests
// =============================================================================

#[test]
fn test_reveal_missing_path_fails() {
    let dir = TempDir::new().unwrap();
    let orch = orchestrator(dir.path(), Box::new(RecordingShell::default()));

    let err = orch
        .reveal_output(Some(&dir.path().join("nope.xlsx")))
        .unwrap_err();
    assert!(matches!(err, JadwalError::Reveal(_)));
}

#[test]
fn test_reveal_file_opens_containing_folder() {
    let dir = TempDir::new().unwrap();
    let shell = RecordingShell::default();
    let opened = shell.opened.clone();
    let orch = orchestrator(dir.path(), Box::new(shell));
    let file = dir.path().join("Jadwal.xlsx");
    fs::write(&file, b"x").unwrap();

    let folder = orch.reveal_output(Some(&file)).unwrap();

    assert_eq!(folder, dir.path());
    assert_eq!(*opened.lock().unwrap(), vec![dir.path().to_path_buf()]);
}

#[test]
fn test_reveal_defaults_to_output_dir() {
    let dir = TempDir::new().unwrap();
    let orch = orchestrator(dir.path(), Box::new(RecordingShell::default()));

    let folder = orch.reveal_output(None).unwrap();
    assert_eq!(folder, dir.path().join("app").join("output"));
    assert!(folder.is_dir());
}

#[test]
fn test_reveal_without_file_manager_fails() {
    let dir = TempDir::new().unwrap();
    let orch = orchestrator(dir.path(), Box::new(HeadlessShell::default()));

    let err = orch.reveal_output(Some(dir.path())).unwrap_err();
    assert!(matches!(err, JadwalError::Reveal(_)));
}

// =============================================================================
// Executor Thread Tests
// =============================================================================

#[test]
fn test_executor_answers_in_order_with_ids() {
    let dir = TempDir::new().unwrap();
    let orch = orchestrator(dir.path(), Box::new(HeadlessShell::default()));
    let (request_tx, request_rx) = mpsc::channel();
    let (response_tx, response_rx) = mpsc::channel();
    let handle = spawn_executor_thread(orch, request_rx, response_tx);

    request_tx
        .send(OrchestratorRequest {
            id: 1,
            operation: Operation::SaveSettings(SettingsPatch {
                verbose: Some(true),
                ..Default::default()
            }),
        })
        .unwrap();
    request_tx
        .send(OrchestratorRequest {
            id: 2,
            operation: Operation::LoadSettings,
        })
        .unwrap();
    request_tx
        .send(OrchestratorRequest {
            id: 3,
            operation: Operation::Generate(GenerationRequest::month(3, 2024).unwrap()),
        })
        .unwrap();
    drop(request_tx);

    let responses: Vec<_> = response_rx.iter().collect();
    handle.join().unwrap();

    assert_eq!(responses.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(matches!(&responses[0].outcome, Outcome::Saved(Ok(s)) if s.verbose));
    assert!(matches!(&responses[1].outcome, Outcome::Settings(s) if s.verbose));
    assert!(matches!(
        &responses[2].outcome,
        Outcome::Generated(Err(JadwalError::EngineNotFound { .. }))
    ));
}
