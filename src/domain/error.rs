//! Domain error types.

/// A formula error with position information.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,

    #[error("formula is {length} characters long, the limit is {max}")]
    TooLong { length: usize, max: usize },

    #[error("forbidden token '{token}' in formula")]
    ForbiddenToken { token: String },

    #[error("invalid character '{ch}' at position {position}")]
    InvalidCharacter { ch: char, position: usize },

    #[error("unbalanced parentheses at position {position}")]
    UnbalancedParentheses { position: usize },

    #[error("parse error at position {position}: {message}")]
    Syntax { message: String, position: usize },

    #[error("unknown variable '{name}'")]
    UnknownVariable { name: String },

    #[error("formula produced a non-finite result")]
    NonFinite,
}

impl FormulaError {
    pub fn position(&self) -> Option<usize> {
        match self {
            FormulaError::InvalidCharacter { position, .. }
            | FormulaError::UnbalancedParentheses { position }
            | FormulaError::Syntax { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        match self.position() {
            Some(position) => {
                let caret = " ".repeat(position) + "^";
                format!(
                    "{input}\n{caret}\n{err}",
                    input = input,
                    caret = caret,
                    err = self
                )
            }
            None => format!("{input}\n{err}", input = input, err = self),
        }
    }
}

/// Top-level error type for breadthscore.
#[derive(Debug, thiserror::Error)]
pub enum BreadthError {
    #[error("record has no date")]
    MissingDate,

    #[error("insufficient sector data: found {found} of 11 sectors, at least {required} sectors required")]
    InsufficientSectorData { found: usize, required: usize },

    #[error("validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("invalid configuration {version}: {}", .errors.join("; "))]
    ConfigInvalid { version: String, errors: Vec<String> },

    #[error("configuration not found: {version}")]
    ConfigNotFound { version: String },

    #[error("no default configuration for algorithm {algorithm}")]
    NoDefaultConfig { algorithm: String },

    #[error("cannot delete {version}: it is the default configuration for {algorithm}")]
    DefaultDeletion { version: String, algorithm: String },

    #[error("settings parse error in {file}: {reason}")]
    SettingsParse { file: String, reason: String },

    #[error("invalid setting [{section}] {key}: {reason}")]
    SettingsInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&BreadthError> for std::process::ExitCode {
    fn from(err: &BreadthError) -> Self {
        let code: u8 = match err {
            BreadthError::Io(_) => 1,
            BreadthError::SettingsParse { .. } | BreadthError::SettingsInvalid { .. } => 2,
            BreadthError::Storage { .. } | BreadthError::DataSource { .. } => 3,
            BreadthError::ConfigInvalid { .. }
            | BreadthError::ConfigNotFound { .. }
            | BreadthError::NoDefaultConfig { .. }
            | BreadthError::DefaultDeletion { .. }
            | BreadthError::Formula(_)
            | BreadthError::Serialization(_) => 4,
            BreadthError::MissingDate
            | BreadthError::InsufficientSectorData { .. }
            | BreadthError::Validation { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
