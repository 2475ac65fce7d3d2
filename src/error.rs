use thiserror::Error;

/// Errors surfaced by world construction.
///
/// Everything else in the crate treats misuse as a programmer error and
/// panics with a descriptive message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No registered engine implementation matches the requested name.
    #[error("no engine implementation matches `{0}`")]
    UnknownImplementation(String),

    /// An environment override was present but could not be parsed.
    #[error("invalid value `{value}` for {var}")]
    InvalidConfig {
        /// The environment variable that was set.
        var:   &'static str,
        /// The value it carried.
        value: String,
    },
}
