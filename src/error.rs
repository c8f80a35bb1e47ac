use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The data store could not supply calls. Extraction and aggregation never
    /// produce this themselves.
    #[error("upstream data unavailable while {context}: {source}")]
    Upstream {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file {path}: {message}")]
    Config { path: String, message: String },

    #[error("invalid {field} pattern '{pattern}': {message}")]
    Pattern {
        field: &'static str,
        pattern: String,
        message: String,
    },

    #[error("client '{0}' not found")]
    UnknownClient(String),
}

impl Error {
    pub fn upstream(context: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Upstream {
            context: context.into(),
            source,
        }
    }

    pub fn pattern(field: &'static str, pattern: impl Into<String>, err: regex::Error) -> Self {
        Self::Pattern {
            field,
            pattern: pattern.into(),
            message: err.to_string(),
        }
    }
}
