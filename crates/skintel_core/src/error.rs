use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("not_found - {0}")]
    NotFound(String),
    #[error("no_active_plan - {0}")]
    NoActivePlan(String),
    #[error("no_plan_found - {0}")]
    NoPlanFound(String),
    #[error("generation_failed - {0}")]
    GenerationFailed(String),
    #[error("invalid_input - {0}")]
    InvalidInput(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
    #[error("io_error - {0}")]
    Io(String),
}

impl EngineError {
    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Self::NotFound(message.into())
    }

    pub fn no_active_plan<M: Into<String>>(message: M) -> Self {
        Self::NoActivePlan(message.into())
    }

    pub fn no_plan_found<M: Into<String>>(message: M) -> Self {
        Self::NoPlanFound(message.into())
    }

    pub fn generation_failed<M: Into<String>>(message: M) -> Self {
        Self::GenerationFailed(message.into())
    }

    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::NoActivePlan(_) => "no_active_plan",
            Self::NoPlanFound(_) => "no_plan_found",
            Self::GenerationFailed(_) => "generation_failed",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(message)
            | Self::NoActivePlan(message)
            | Self::NoPlanFound(message)
            | Self::GenerationFailed(message)
            | Self::InvalidInput(message)
            | Self::InvalidData(message)
            | Self::Io(message) => message,
        }
    }

    /// Plan-availability failures that callers surface as "not available yet".
    pub fn is_plan_unavailable(&self) -> bool {
        matches!(self, Self::NoActivePlan(_) | Self::NoPlanFound(_))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidData(err.to_string())
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
