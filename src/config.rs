use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MailerError;

pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Sender identity and SMTP endpoint for one mailer instance.
///
/// The defaults point at Gmail's submission endpoint; sender address and
/// password have no usable default and must be non-empty.
#[derive(Clone, Serialize, Deserialize)]
pub struct MailerConfig {
    pub sender_addr: String,
    pub sender_pass: String,
    #[serde(default = "default_smtp_server")]
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
}

fn default_smtp_server() -> String {
    DEFAULT_SMTP_SERVER.to_string()
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl MailerConfig {
    pub fn new(sender_addr: &str, sender_pass: &str) -> Result<Self, MailerError> {
        let config = Self {
            sender_addr: sender_addr.to_string(),
            sender_pass: sender_pass.to_string(),
            smtp_server: default_smtp_server(),
            smtp_port: default_smtp_port(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_server(mut self, server: &str) -> Self {
        self.smtp_server = server.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.smtp_port = port;
        self
    }

    pub fn validate(&self) -> Result<(), MailerError> {
        if self.sender_addr.is_empty() {
            return Err(MailerError::Configuration(
                "sender address cannot be empty".to_string(),
            ));
        }
        if self.sender_pass.is_empty() {
            return Err(MailerError::Configuration(
                "sender password cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a config from a JSON file.
    ///
    /// Unlike optional settings there is no usable default credential, so a
    /// missing or unreadable file is a configuration error rather than a
    /// silent fallback.
    pub fn load(path: &Path) -> Result<Self, MailerError> {
        let content = fs::read_to_string(path).map_err(|e| {
            MailerError::Configuration(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: MailerConfig = serde_json::from_str(&content).map_err(|e| {
            MailerError::Configuration(format!(
                "failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }
}

// Keeps the password out of debug output and logs.
impl fmt::Debug for MailerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailerConfig")
            .field("sender_addr", &self.sender_addr)
            .field("sender_pass", &"*".repeat(self.sender_pass.len()))
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_new_applies_defaults() {
        let config = MailerConfig::new("sender@example.com", "hunter2").unwrap();

        assert_eq!(config.smtp_server, "smtp.gmail.com");
        assert_eq!(config.smtp_port, 587);
    }

    #[test]
    fn test_empty_sender_address_is_rejected() {
        let result = MailerConfig::new("", "hunter2");
        assert!(matches!(result, Err(MailerError::Configuration(_))));
    }

    #[test]
    fn test_empty_password_is_rejected() {
        let result = MailerConfig::new("sender@example.com", "");
        assert!(matches!(result, Err(MailerError::Configuration(_))));
    }

    #[test]
    fn test_with_server_and_port_override_defaults() {
        let config = MailerConfig::new("sender@outlook.com", "hunter2")
            .unwrap()
            .with_server("smtp-mail.outlook.com")
            .with_port(25);

        assert_eq!(config.smtp_server, "smtp-mail.outlook.com");
        assert_eq!(config.smtp_port, 25);
    }

    #[test]
    fn test_load_reads_json_and_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"sender_addr": "sender@example.com", "sender_pass": "hunter2"}}"#
        )
        .unwrap();

        let config = MailerConfig::load(file.path()).unwrap();

        assert_eq!(config.sender_addr, "sender@example.com");
        assert_eq!(config.smtp_server, "smtp.gmail.com");
        assert_eq!(config.smtp_port, 587);
    }

    #[test]
    fn test_load_missing_file_is_a_configuration_error() {
        let result = MailerConfig::load(Path::new("/nonexistent/outmail.json"));
        assert!(matches!(result, Err(MailerError::Configuration(_))));
    }

    #[test]
    fn test_debug_output_masks_the_password() {
        let config = MailerConfig::new("sender@example.com", "hunter2").unwrap();
        let rendered = format!("{:?}", config);

        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("sender@example.com"));
    }
}
