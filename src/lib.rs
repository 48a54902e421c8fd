pub mod attachment;
pub mod config;
pub mod error;
pub mod mailer;
pub mod message;
pub mod remote;

// Re-export commonly used types
pub use attachment::Attachments;
pub use config::MailerConfig;
pub use error::MailerError;
pub use mailer::{AttachmentOutcome, AttachmentReport, Mailer, SendReport};
pub use message::{Body, Recipients, TextKind};
pub use remote::{RemoteSessionOpts, RemoteSessionRegistry};
