//! Supervised engine execution
//!
//! `run_invocation` is the only place that starts an engine process. It:
//!
//! - Spawns the engine in its own process group and registers its PID
//! - Reads stdout and stderr concurrently, line by line, keeping every byte
//! - Forwards each line to an optional observer for live progress
//! - Waits for exit and maps the outcome onto `GenerationResult` or an error

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tracing::{debug, info, warn};

use super::sentinel::parse_success_path;
use super::{GenerationResult, Invocation};
use crate::error::{JadwalError, Result};
use crate::process_guard::{ChildRegistry, CommandProcessGroup};
use crate::types::EngineProtocol;

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// One line of engine output, newline stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEvent {
    pub stream: Stream,
    pub line: String,
}

/// Callback receiving engine output while it runs
pub type OutputObserver<'a> = &'a dyn Fn(&OutputEvent);

fn spawn_reader<R>(stream: Stream, pipe: R, tx: Sender<(Stream, Vec<u8>)>) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        loop {
            let mut chunk = Vec::new();
            match reader.read_until(b'\n', &mut chunk) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send((stream, chunk)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed reading engine {:?}: {}", stream, e);
                    break;
                }
            }
        }
    })
}

/// Run a planned invocation to completion.
///
/// Returns `Ok` only for exit code 0. A non-zero exit becomes
/// `EngineExecution`; a process that cannot be started becomes `Spawn`.
pub fn run_invocation(
    invocation: &Invocation,
    observer: Option<OutputObserver<'_>>,
) -> Result<GenerationResult> {
    info!(
        "Starting engine: {:?} args={:?} env={:?} cwd={:?}",
        invocation.program, invocation.args, invocation.env, invocation.working_dir
    );

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .current_dir(&invocation.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .in_new_process_group();
    for (key, value) in &invocation.env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(|source| JadwalError::Spawn {
        program: invocation.program.clone(),
        source,
    })?;
    let pid = child.id();

    {
        let registry = ChildRegistry::global();
        let mut guard = registry.lock().expect("ChildRegistry mutex poisoned");
        guard.register(pid);
    }

    let (tx, rx) = mpsc::channel();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(Stream::Stdout, stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(Stream::Stderr, stderr, tx.clone()));
    }
    drop(tx);

    let mut stdout_bytes = Vec::new();
    let mut stderr_bytes = Vec::new();
    for (stream, chunk) in rx {
        let line = String::from_utf8_lossy(&chunk)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        debug!("engine {:?}: {}", stream, line);
        if let Some(observer) = observer {
            observer(&OutputEvent { stream, line });
        }
        match stream {
            Stream::Stdout => stdout_bytes.extend_from_slice(&chunk),
            Stream::Stderr => stderr_bytes.extend_from_slice(&chunk),
        }
    }
    for reader in readers {
        let _ = reader.join();
    }

    let status = child.wait();

    {
        let registry = ChildRegistry::global();
        let mut guard = registry.lock().expect("ChildRegistry mutex poisoned");
        guard.unregister(pid);
    }

    let status = status?;
    let stdout = String::from_utf8_lossy(&stdout_bytes).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();
    let exit_code = status.code();

    if !status.success() {
        warn!("Engine failed with exit code {:?}", exit_code);
        return Err(JadwalError::engine_execution(exit_code, stdout, stderr));
    }

    let output_path = match invocation.protocol {
        EngineProtocol::Positional => invocation.expected_output.clone(),
        EngineProtocol::Flag => parse_success_path(&stdout),
    };
    match &output_path {
        Some(path) => info!("Engine finished, output at {:?}", path),
        None => info!("Engine finished without reporting an output path"),
    }

    Ok(GenerationResult {
        exit_code: exit_code.unwrap_or(0),
        stdout,
        stderr,
        output_path,
        protocol: invocation.protocol,
    })
}
