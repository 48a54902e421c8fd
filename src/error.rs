use thiserror::Error;

/// Failure taxonomy shared by composition, resolution, and delivery.
#[derive(Error, Debug)]
pub enum MailerError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("invalid message: {0}")]
    Message(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
