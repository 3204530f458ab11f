use super::session;
use crate::core::config::OrtSessionConfig;
use crate::core::errors::OCRError;
use ort::session::Session;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;

/// A pool of ONNX Runtime sessions for one model file.
///
/// Calls pick a session round-robin and lock it for the duration of the forward
/// pass, so concurrent callers never share a session.
pub struct OrtInfer {
    pub(super) sessions: Vec<Mutex<Session>>,
    pub(super) next_idx: AtomicUsize,
    pub(super) model_path: PathBuf,
    pub(super) model_name: String,
}

impl OrtInfer {
    /// Loads a single session with default settings.
    pub fn new(model_path: impl AsRef<Path>) -> Result<Self, OCRError> {
        let path = model_path.as_ref();
        let session = session::load_session(path)?;
        Ok(Self {
            sessions: vec![Mutex::new(session)],
            next_idx: AtomicUsize::new(0),
            model_path: path.to_path_buf(),
            model_name: model_name_from_path(path),
        })
    }

    /// Loads `config.session_pool_size` sessions with the given settings.
    pub fn from_config(
        model_path: impl AsRef<Path>,
        config: &OrtSessionConfig,
        model_name: Option<&str>,
    ) -> Result<Self, OCRError> {
        let path = model_path.as_ref();
        let pool_size = config.session_pool_size.max(1);
        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let session = session::load_session_with(
                path,
                |builder| session::apply_ort_config(builder, config),
                Some("check device/EP configuration and model file"),
            )?;
            sessions.push(Mutex::new(session));
        }
        let model_name = model_name
            .map(str::to_string)
            .unwrap_or_else(|| model_name_from_path(path));
        tracing::info!(
            "Loaded model '{}' from {} ({} session(s))",
            model_name,
            path.display(),
            pool_size
        );
        Ok(Self {
            sessions,
            next_idx: AtomicUsize::new(0),
            model_path: path.to_path_buf(),
            model_name,
        })
    }
}

impl std::fmt::Debug for OrtInfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtInfer")
            .field("model_name", &self.model_name)
            .field("model_path", &self.model_path)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

fn model_name_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown_model".to_string())
}
