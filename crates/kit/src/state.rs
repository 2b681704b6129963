//! Typed state shared between the host pipeline and the image step.

use serde::Serialize;

use crate::config::ImageConfig;
use crate::error::ImageError;
use crate::ui::Ui;

/// Result of the image step, read back during cleanup.
#[derive(Debug, Clone, Default)]
pub enum PersistOutcome {
    /// The step has not run, was skipped, or succeeded.
    #[default]
    Ok,
    /// Committing the pre-copied image failed.
    CommitFailed(ImageError),
    /// Saving a new image failed.
    SaveFailed(ImageError),
}

impl PersistOutcome {
    /// Whether the commit or save failed.
    pub fn is_failed(&self) -> bool {
        !matches!(self, PersistOutcome::Ok)
    }

    /// The error behind a failed outcome.
    pub fn error(&self) -> Option<&ImageError> {
        match self {
            PersistOutcome::Ok => None,
            PersistOutcome::CommitFailed(e) | PersistOutcome::SaveFailed(e) => Some(e),
        }
    }

    /// Short machine-readable name, used for JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            PersistOutcome::Ok => "ok",
            PersistOutcome::CommitFailed(_) => "commit-failed",
            PersistOutcome::SaveFailed(_) => "save-failed",
        }
    }
}

/// Everything a pipeline step reads from or writes back to the host.
#[derive(Debug)]
pub struct PipelineState {
    /// Image settings for this build
    pub config: ImageConfig,
    /// Sink for operator messages
    pub ui: Box<dyn Ui>,
    /// Identifier of the VM deployed by an earlier step
    pub vmid: String,
    /// Bearer token for the Orka API
    pub token: String,
    /// Error to surface to the operator once the pipeline stops
    pub error: Option<ImageError>,
    /// Set by the host when the run was cancelled
    pub cancelled: bool,
    /// Set by the host when a step halted the run
    pub halted: bool,
    /// Written by the image step, read by its cleanup
    pub image_outcome: PersistOutcome,
}

impl PipelineState {
    /// Fresh state for a run that has not started yet.
    pub fn new(
        config: ImageConfig,
        ui: Box<dyn Ui>,
        vmid: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            config,
            ui,
            vmid: vmid.into(),
            token: token.into(),
            error: None,
            cancelled: false,
            halted: false,
            image_outcome: PersistOutcome::Ok,
        }
    }

    /// Summary of the image step suitable for `--json` output.
    pub fn report(&self) -> PersistReport {
        PersistReport {
            vmid: self.vmid.clone(),
            image_name: (!self.config.use_precopy && !self.config.skip_image_creation)
                .then(|| self.config.image_name.clone()),
            outcome: self.image_outcome.kind(),
            status: self
                .image_outcome
                .error()
                .and_then(|e| e.status())
                .map(|s| s.as_u16()),
            error: self.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Serializable summary of a run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PersistReport {
    /// VM the image was taken from
    pub vmid: String,
    /// Name of the saved image; absent when committing or skipping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    /// `ok`, `commit-failed` or `save-failed`
    pub outcome: &'static str,
    /// HTTP status of a rejected request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Error message, if the step halted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
