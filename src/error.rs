use thiserror::Error;

/// Problems with what the caller handed us. Nothing has run yet.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Please provide either text or a file")]
    MissingInput,

    #[error("Unsupported file type: {mimetype}")]
    UnsupportedMimetype { mimetype: String },

    #[error("Invalid file format: {details}")]
    Undecodable { details: String },

    #[error("Invalid option: {option}")]
    InvalidOption { option: String },

    #[error("Input too large: {bytes} bytes (max {max})")]
    TooLarge { bytes: u64, max: u64 },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("{stage} failed: {source:#}")]
    EngineFailure {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    pub fn engine(stage: &'static str, source: anyhow::Error) -> Self {
        PipelineError::EngineFailure { stage, source }
    }

    pub fn is_user_error(&self) -> bool {
        matches!(self, PipelineError::Input(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::Input(InputError::MissingInput) => "INPUT_MISSING",
            PipelineError::Input(InputError::UnsupportedMimetype { .. }) => "INPUT_UNSUPPORTED",
            PipelineError::Input(InputError::Undecodable { .. }) => "INPUT_UNDECODABLE",
            PipelineError::Input(InputError::InvalidOption { .. }) => "INPUT_INVALID_OPTION",
            PipelineError::Input(InputError::TooLarge { .. }) => "INPUT_TOO_LARGE",
            PipelineError::EngineFailure { .. } => "ENGINE_FAILURE",
        }
    }
}
