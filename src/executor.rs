//! executor.rs - Runs orchestrator operations on a dedicated background thread.
//!
//! A UI thread must not block on an engine run or a file dialog. It sends an
//! `OrchestratorRequest` and later picks up the matching `OrchestratorResponse`
//! by id. Requests are handled one at a time, in arrival order.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;
use tracing::{debug, error};

use crate::config_file::{EngineSettings, SettingsPatch};
use crate::engine::GenerationResult;
use crate::error::JadwalError;
use crate::orchestrator::Orchestrator;
use crate::types::GenerationRequest;

/// Unique identifier for each request/response pair.
pub type RequestId = u64;

/// Operation to run on the executor thread
#[derive(Debug, Clone)]
pub enum Operation {
    Generate(GenerationRequest),
    LoadSettings,
    SaveSettings(SettingsPatch),
    RevealOutput(Option<PathBuf>),
}

#[derive(Debug)]
pub struct OrchestratorRequest {
    pub id: RequestId,
    pub operation: Operation,
}

/// Result of one operation
#[derive(Debug)]
pub enum Outcome {
    Generated(Result<GenerationResult, JadwalError>),
    Settings(EngineSettings),
    Saved(Result<EngineSettings, JadwalError>),
    Revealed(Result<PathBuf, JadwalError>),
}

#[derive(Debug)]
pub struct OrchestratorResponse {
    pub id: RequestId,
    pub outcome: Outcome,
}

/// Spawns the thread that owns `orchestrator` and serves requests.
///
/// The thread exits when the request channel closes or the response
/// receiver is dropped.
pub fn spawn_executor_thread(
    orchestrator: Orchestrator,
    request_rx: Receiver<OrchestratorRequest>,
    response_tx: Sender<OrchestratorResponse>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        debug!("Orchestrator executor thread started.");
        while let Ok(request) = request_rx.recv() {
            debug!("Executing request {}: {:?}", request.id, request.operation);
            let outcome = match request.operation {
                Operation::Generate(req) => Outcome::Generated(orchestrator.generate(&req)),
                Operation::LoadSettings => Outcome::Settings(orchestrator.load_settings()),
                Operation::SaveSettings(patch) => Outcome::Saved(orchestrator.save_settings(patch)),
                Operation::RevealOutput(path) => {
                    Outcome::Revealed(orchestrator.reveal_output(path.as_deref()))
                }
            };

            if response_tx
                .send(OrchestratorResponse {
                    id: request.id,
                    outcome,
                })
                .is_err()
            {
                error!("Failed to send orchestrator response. Receiver probably dropped.");
                break;
            }
        }
        debug!("Orchestrator executor thread shut down.");
    })
}
