//! Recognizer sidecar bridge.
//!
//! Camera capture and the face embedding model live in an external process
//! (the "sidecar"). A dedicated OS thread owns that process and talks to it
//! over newline-delimited JSON on stdin/stdout:
//!
//! ```text
//! -> {"cmd":"detect","input_size":416,"score_threshold":0.5}
//! <- {"faces":[{"embedding":[...128 floats...],"box":{"x":..,"y":..,"width":..,"height":..}}]}
//! <- {"error":"model still loading","kind":"not_ready"}
//! ```
//!
//! The sidecar is started on the first request and restarted on the next
//! request after it dies, so a camera that was denied can be retried by the
//! user simply asking again.

use sentinel_core::{DetectOptions, Detection, DetectionEngine, EngineError, EMBEDDING_DIM};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tokio::sync::{mpsc, oneshot};

/// Messages sent from async callers to the engine thread.
enum EngineRequest {
    Detect {
        options: DetectOptions,
        reply: oneshot::Sender<Result<Vec<Detection>, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl DetectionEngine for EngineHandle {
    async fn detect(&self, options: DetectOptions) -> Result<Vec<Detection>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Detect {
                options,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine thread for the sidecar `command` (program + args).
///
/// Only thread creation can fail here; the sidecar itself is started lazily.
pub fn spawn_engine(command: Vec<String>) -> std::io::Result<EngineHandle> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("sentinel-engine".into())
        .spawn(move || {
            tracing::info!(command = ?command, "engine thread started");
            let mut sidecar: Option<Sidecar> = None;

            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Detect { options, reply } => {
                        let result = run_detect(&mut sidecar, &command, options);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

/// Issue one detect request, (re)starting the sidecar if needed.
/// A transport failure or an undecodable reply drops the sidecar so the next
/// call starts a fresh one.
fn run_detect(
    sidecar: &mut Option<Sidecar>,
    command: &[String],
    options: DetectOptions,
) -> Result<Vec<Detection>, EngineError> {
    if sidecar.is_none() {
        *sidecar = Some(Sidecar::start(command)?);
    }
    let Some(running) = sidecar.as_mut() else {
        return Err(EngineError::Unavailable("sidecar not running".into()));
    };

    let result = running.detect(options);
    if running.desynced || matches!(result, Err(EngineError::Unavailable(_))) {
        tracing::warn!("recognizer sidecar lost; will restart on next request");
        *sidecar = None;
    }
    result
}

#[derive(Serialize)]
struct DetectCommand {
    cmd: &'static str,
    input_size: u32,
    score_threshold: f32,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
enum SidecarErrorKind {
    NotReady,
    Camera,
    #[default]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SidecarReply {
    Faces {
        faces: Vec<Detection>,
    },
    Error {
        error: String,
        #[serde(default)]
        kind: SidecarErrorKind,
    },
}

/// Decode one reply line into detections or an engine error.
fn parse_reply(line: &str) -> Result<Vec<Detection>, EngineError> {
    let reply = decode_reply(line)?;
    reply_into_faces(reply)
}

fn decode_reply(line: &str) -> Result<SidecarReply, EngineError> {
    serde_json::from_str(line)
        .map_err(|e| EngineError::Failed(format!("malformed sidecar reply: {e}")))
}

fn reply_into_faces(reply: SidecarReply) -> Result<Vec<Detection>, EngineError> {
    match reply {
        SidecarReply::Faces { faces } => {
            if let Some(bad) = faces.iter().find(|f| f.embedding.dim() != EMBEDDING_DIM) {
                return Err(EngineError::Failed(format!(
                    "expected {EMBEDDING_DIM}-dim embedding, got {}",
                    bad.embedding.dim()
                )));
            }
            Ok(faces)
        }
        SidecarReply::Error { error, kind } => Err(match kind {
            SidecarErrorKind::NotReady => EngineError::NotReady,
            SidecarErrorKind::Camera => EngineError::Unavailable(error),
            SidecarErrorKind::Other => EngineError::Failed(error),
        }),
    }
}

/// A running sidecar process with its pipes.
struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    /// Set after an undecodable reply; request/reply pairing can no longer be trusted.
    desynced: bool,
}

impl Sidecar {
    fn start(command: &[String]) -> Result<Self, EngineError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| EngineError::Unavailable("no recognizer command configured".into()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| EngineError::Unavailable(format!("failed to start {program}: {e}")))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::Unavailable("sidecar pipes unavailable".into()));
        };

        tracing::info!(program = %program, pid = child.id(), "recognizer sidecar started");
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            desynced: false,
        })
    }

    fn detect(&mut self, options: DetectOptions) -> Result<Vec<Detection>, EngineError> {
        let request = DetectCommand {
            cmd: "detect",
            input_size: options.input_size,
            score_threshold: options.score_threshold,
        };
        let mut line = serde_json::to_string(&request)
            .map_err(|e| EngineError::Failed(format!("encode request: {e}")))?;
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .and_then(|_| self.stdin.flush())
            .map_err(|e| EngineError::Unavailable(format!("sidecar write: {e}")))?;

        let mut reply = String::new();
        let read = self
            .stdout
            .read_line(&mut reply)
            .map_err(|e| EngineError::Unavailable(format!("sidecar read: {e}")))?;
        if read == 0 {
            return Err(EngineError::Unavailable("sidecar exited".into()));
        }

        let decoded = decode_reply(reply.trim_end());
        self.desynced = decoded.is_err();
        let faces = reply_into_faces(decoded?)?;
        tracing::trace!(faces = faces.len(), "sidecar detect");
        Ok(faces)
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
