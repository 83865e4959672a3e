use std::path::PathBuf;

/// Errors raised by the forecasting engine.
///
/// Configuration errors are fatal and raised before any computation starts.
/// Per-region data conditions (unmodeled regions, imputed standard deviations)
/// are not errors; they are surfaced on the outputs instead.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ForecastError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Process-level error carried up to `main` with its exit code.
#[derive(Clone, thiserror::Error)]
#[error("{message}")]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl From<ForecastError> for AppError {
    fn from(err: ForecastError) -> Self {
        let exit_code = match &err {
            ForecastError::Config(_) | ForecastError::Io { .. } | ForecastError::Parse(_) => 2,
            ForecastError::InsufficientData(_) => 3,
        };
        AppError::new(exit_code, err.to_string())
    }
}
