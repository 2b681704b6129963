//! The image step: persist the VM's disk as a base image.
//!
//! In pre-copy mode the image was already duplicated when the VM was
//! deployed, so the VM's image is committed back in place. Otherwise the
//! VM's current state is saved under the configured image name.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::api::{
    ImageClient, ImageCommitRequest, ImageOperation, ImageSaveRequest, IMAGE_REQUEST_TIMEOUT,
};
use crate::error::ImageError;
use crate::state::{PersistOutcome, PipelineState};

/// What the host pipeline should do after a step ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Proceed to the next step
    Continue,
    /// Stop the pipeline; the error is in the state
    Halt,
}

/// A unit of work driven by the host pipeline.
pub trait Step {
    /// Run the step. Failures are recorded in `state`.
    fn run(&self, state: &mut PipelineState) -> StepAction;

    /// Called by the host once the run is over, whatever the outcome.
    fn cleanup(&self, state: &PipelineState);
}

/// Commits or saves the VM image through the Orka API.
#[derive(Debug, Clone)]
pub struct CreateImageStep {
    timeout: Duration,
}

impl Default for CreateImageStep {
    fn default() -> Self {
        Self {
            timeout: IMAGE_REQUEST_TIMEOUT,
        }
    }
}

impl CreateImageStep {
    /// Step using the default 30 minute request timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn persist(&self, state: &PipelineState, op: ImageOperation) -> Result<String, ImageError> {
        let ui = &state.ui;
        let client = ImageClient::new(&state.config.endpoint, &state.token, self.timeout)?;
        let (status, message) = match op {
            ImageOperation::Commit => {
                ui.say("Committing existing image since pre-copy is being used");
                ui.say("Please wait as this can take a little while...");
                let req = ImageCommitRequest {
                    vmid: state.vmid.clone(),
                };
                let r = client.commit(&req)?;
                (r.status, r.body.message)
            }
            ImageOperation::Save => {
                ui.say(&format!("Saving new image [{}]", state.config.image_name));
                ui.say("Please wait as this can take a little while...");
                let req = ImageSaveRequest {
                    vmid: state.vmid.clone(),
                    image_name: state.config.image_name.clone(),
                };
                let r = client.save(&req)?;
                (r.status, r.body.message)
            }
        };
        Ok(format!("{} [{status}] [{message}]", op.completed()))
    }
}

impl Step for CreateImageStep {
    #[instrument(skip_all, fields(vmid = %state.vmid))]
    fn run(&self, state: &mut PipelineState) -> StepAction {
        // The state may have been used by an earlier run
        state.image_outcome = PersistOutcome::Ok;
        state.error = None;

        let config = &state.config;
        if config.skip_image_creation {
            state
                .ui
                .say("Skipping image creation because of 'no_create_image' being set");
            return StepAction::Continue;
        }

        state
            .ui
            .say(&format!("Image creation is using VM ID [{}]", state.vmid));
        state
            .ui
            .say(&format!("Image name is [{}]", config.image_name));

        let op = if config.use_precopy {
            ImageOperation::Commit
        } else {
            ImageOperation::Save
        };

        match self.persist(state, op) {
            Ok(msg) => {
                state.ui.say(&msg);
                StepAction::Continue
            }
            Err(e) => {
                state.ui.error(&e.to_string());
                state.image_outcome = match op {
                    ImageOperation::Commit => PersistOutcome::CommitFailed(e.clone()),
                    ImageOperation::Save => PersistOutcome::SaveFailed(e.clone()),
                };
                state.error = Some(e);
                StepAction::Halt
            }
        }
    }

    #[instrument(skip_all, fields(vmid = %state.vmid))]
    fn cleanup(&self, state: &PipelineState) {
        if let Some(e) = state.image_outcome.error() {
            match &state.image_outcome {
                PersistOutcome::CommitFailed(_) => warn!("Image commit failed: {e}"),
                _ => warn!("Image save failed: {e}"),
            }
            state.ui.say(
                "Commit or save failed - please check Orka to see if any artifacts were left behind",
            );
            return;
        }

        if !state.cancelled && !state.halted {
            return;
        }

        if state.vmid.is_empty() {
            return;
        }

        // Removing the VM belongs to the step that deployed it.
        debug!("Run stopped early; nothing to undo for the image step");
    }
}
