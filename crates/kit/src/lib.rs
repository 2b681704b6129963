//! Persist a provisioned Orka VM as a reusable base image.
//!
//! This crate provides the image step of a VM image-build pipeline. After
//! earlier steps have created and customized a VM, [`CreateImageStep`] either
//! commits the VM's attached image back in place (pre-copy mode) or saves the
//! VM's current disk state as a new named image, by issuing a single request
//! against the Orka image API.
//!
//! The host pipeline owns sequencing and cancellation; it hands the step a
//! [`PipelineState`] and calls [`Step::cleanup`] once the run is over.

pub mod api;
pub mod config;
pub mod error;
pub mod state;
pub mod step;
pub mod ui;

pub use api::{ImageClient, ImageOperation};
pub use config::ImageConfig;
pub use error::ImageError;
pub use state::{PersistOutcome, PipelineState};
pub use step::{CreateImageStep, Step, StepAction};
pub use ui::{ConsoleUi, Ui};
