#![deny(warnings)]

//! Project wizard for hospital solar microgrids.
//!
//! Drives the five-step flow (location, project constraints, objective,
//! score review, submission) over a draft persisted in a session medium.
//! Remote lookups and establishment creation go through the async traits
//! in [`collaborators`], so the wizard itself stays transport-agnostic.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod estimation;
pub mod payload;
pub mod wizard;

pub use collaborators::{
    CollaboratorError, EstablishmentId, EstablishmentService, LocationService, ZoneInfo,
};
pub use config::WizardConfig;
pub use error::{ConfigError, SubmissionError, UpstreamError, WizardError};
pub use estimation::{PopulationEstimator, PopulationRequest};
pub use payload::{number_of_beds, CreationPayload};
pub use wizard::{slot, ObjectiveSlot, ProjectDraft, ScoreSlot, Step, SubmissionState, Wizard};
