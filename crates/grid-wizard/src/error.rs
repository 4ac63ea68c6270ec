use crate::Step;
use grid_core::ValidationError;
use thiserror::Error;

/// Failure reported by the establishment-creation endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamError {
    /// HTTP status, `None` when the server could not be reached.
    pub status: Option<u16>,
    /// Message supplied by the server, if any.
    pub message: Option<String>,
}

impl UpstreamError {
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            message: None,
        }
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// User-facing submission failure. The draft is kept so the user can retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmissionError {
    /// Message returned by the server, shown verbatim.
    #[error("{0}")]
    Upstream(String),
    #[error("Données invalides. Veuillez vérifier les informations saisies.")]
    BadRequest,
    #[error("Session expirée. Veuillez vous reconnecter et réessayer.")]
    AuthExpired,
    #[error("Accès refusé. Vérifiez vos permissions ou reconnectez-vous.")]
    Forbidden,
    #[error("Erreur serveur. Veuillez réessayer plus tard.")]
    Server,
    #[error("Impossible de contacter le serveur. Vérifiez votre connexion internet.")]
    Unreachable,
    #[error("Erreur lors de la création de l'établissement.")]
    Unknown,
}

impl From<UpstreamError> for SubmissionError {
    fn from(e: UpstreamError) -> Self {
        if let Some(msg) = e.message.filter(|m| !m.trim().is_empty()) {
            return SubmissionError::Upstream(msg);
        }
        match e.status {
            Some(400) => SubmissionError::BadRequest,
            Some(401) => SubmissionError::AuthExpired,
            Some(403) => SubmissionError::Forbidden,
            Some(500) => SubmissionError::Server,
            None | Some(0) => SubmissionError::Unreachable,
            Some(_) => SubmissionError::Unknown,
        }
    }
}

/// Errors surfaced by the wizard. None of them are fatal: the draft is never
/// discarded because of an error.
#[derive(Debug, Error, PartialEq)]
pub enum WizardError {
    /// The current step cannot be left forward; entered values are kept.
    #[error("{step:?} incomplete: {message}")]
    StepIncomplete { step: Step, message: String },
    /// A later step was requested before its predecessors were complete.
    #[error("{target:?} requires {missing:?} to be completed first")]
    PreconditionFailed { target: Step, missing: Step },
    /// The operation belongs to another step.
    #[error("operation requires step {expected:?}, wizard is at {actual:?}")]
    WrongStep { expected: Step, actual: Step },
    #[error("a population estimate is already in flight")]
    EstimateInFlight,
    #[error("no location available to estimate from")]
    NoLocation,
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    #[error("wizard already completed")]
    Completed,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

impl WizardError {
    pub(crate) fn incomplete(step: Step, message: impl Into<String>) -> Self {
        WizardError::StepIncomplete {
            step,
            message: message.into(),
        }
    }
}

/// Errors loading a [`crate::WizardConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
