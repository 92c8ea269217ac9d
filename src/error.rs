use std::rc::Rc;
use thiserror::Error;

/// The payload carried by a rejected stage.
///
/// Shared rather than owned so dispatch can hand the same error to a
/// continuation without copying it.
pub type SharedError = Rc<dyn std::error::Error>;

#[derive(Debug, Error)]
pub enum StageError {
    /// A plain rejection carrying a human readable description.
    #[error("{0}")]
    Message(String),
    #[error("stage is still pending")]
    Pending,
    #[error("stage rejected: {0}")]
    Rejected(SharedError),
}

impl StageError {
    /// Build a shared `Message` payload, ready to reject a stage with.
    ///
    /// ```
    /// use promise_stage::StageError;
    /// let e = StageError::msg("NonExcep");
    /// assert_eq!(e.to_string(), "NonExcep");
    /// ```
    pub fn msg(message: impl Into<String>) -> SharedError {
        Rc::new(StageError::Message(message.into()))
    }
}

/// Wrap any concrete error into a [`SharedError`].
pub fn shared<E: std::error::Error + 'static>(err: E) -> SharedError {
    Rc::new(err)
}
