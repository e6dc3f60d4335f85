use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Configuration errors
    ConfigInvalidJson,
    ConfigInvalidRevision,
    ConfigMissingReference,
    ConfigInvalidTrafficAllocation,
    ConfigInvalidAudience,
    ConfigInvalidVariable,
    ConfigDuplicateKey,
    ConfigInvalidOption,

    // Evaluation errors
    EvalFlagNotFound,
    EvalVariationNotFound,
    EvalUserProfileError,

    // Event errors
    EventQueueFull,
    EventInvalidKey,
    EventFlushFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidJson => "CONFIG_INVALID_JSON",
            ErrorCode::ConfigInvalidRevision => "CONFIG_INVALID_REVISION",
            ErrorCode::ConfigMissingReference => "CONFIG_MISSING_REFERENCE",
            ErrorCode::ConfigInvalidTrafficAllocation => "CONFIG_INVALID_TRAFFIC_ALLOCATION",
            ErrorCode::ConfigInvalidAudience => "CONFIG_INVALID_AUDIENCE",
            ErrorCode::ConfigInvalidVariable => "CONFIG_INVALID_VARIABLE",
            ErrorCode::ConfigDuplicateKey => "CONFIG_DUPLICATE_KEY",
            ErrorCode::ConfigInvalidOption => "CONFIG_INVALID_OPTION",
            ErrorCode::EvalFlagNotFound => "EVAL_FLAG_NOT_FOUND",
            ErrorCode::EvalVariationNotFound => "EVAL_VARIATION_NOT_FOUND",
            ErrorCode::EvalUserProfileError => "EVAL_USER_PROFILE_ERROR",
            ErrorCode::EventQueueFull => "EVENT_QUEUE_FULL",
            ErrorCode::EventInvalidKey => "EVENT_INVALID_KEY",
            ErrorCode::EventFlushFailed => "EVENT_FLUSH_FAILED",
        }
    }

    /// Whether the failure stops client construction.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorCode::ConfigInvalidJson
                | ErrorCode::ConfigInvalidRevision
                | ErrorCode::ConfigMissingReference
                | ErrorCode::ConfigInvalidTrafficAllocation
                | ErrorCode::ConfigInvalidAudience
                | ErrorCode::ConfigInvalidVariable
                | ErrorCode::ConfigDuplicateKey
                | ErrorCode::ConfigInvalidOption
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("[{code}] {message}")]
pub struct FlagKitError {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FlagKitError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    /// A rule or flag references an id that the configuration does not define.
    pub fn missing_reference(kind: &str, id: &str, referenced_by: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingReference,
            format!("{} \"{}\" referenced by {} does not exist", kind, id, referenced_by),
        )
    }

    pub fn evaluation_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn is_config_error(&self) -> bool {
        self.code.is_fatal()
    }
}

pub type Result<T> = std::result::Result<T, FlagKitError>;
