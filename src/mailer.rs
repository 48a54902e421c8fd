use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{SmtpTransport, Transport};

use crate::attachment::{self, Attachments, ResolvedAttachment};
use crate::config::MailerConfig;
use crate::error::MailerError;
use crate::message::{self, Body, Recipients};
use crate::remote::{RemoteSessionOpts, RemoteSessionRegistry};

/// What happened to one attachment reference during a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentOutcome {
    Attached,
    /// Not found on any applicable source; the message went out without it.
    Missing,
}

#[derive(Debug, Clone)]
pub struct AttachmentReport {
    pub locator: String,
    pub filename: String,
    pub outcome: AttachmentOutcome,
}

/// Outcome of a delivered message: the message itself went out, and each
/// attachment reference reports whether it was attached or dropped.
#[derive(Debug, Clone, Default)]
pub struct SendReport {
    pub attachments: Vec<AttachmentReport>,
}

impl SendReport {
    pub fn all_attached(&self) -> bool {
        self.attachments
            .iter()
            .all(|a| a.outcome == AttachmentOutcome::Attached)
    }

    pub fn missing(&self) -> impl Iterator<Item = &AttachmentReport> {
        self.attachments
            .iter()
            .filter(|a| a.outcome == AttachmentOutcome::Missing)
    }
}

/// Composes and delivers messages over an authenticated STARTTLS SMTP
/// session, pulling attachments from HTTP, registered SFTP sources, or the
/// local filesystem.
///
/// Synchronous and blocking throughout; concurrent use from multiple threads
/// needs external synchronization around registry mutation and sends.
pub struct Mailer {
    config: MailerConfig,
    registry: RemoteSessionRegistry,
    http: reqwest::blocking::Client,
}

impl Mailer {
    pub fn new(config: MailerConfig) -> Result<Self, MailerError> {
        config.validate()?;
        log::debug!("mailer instantiated: {:?}", config);

        Ok(Self {
            config,
            registry: RemoteSessionRegistry::new(),
            http: http_client(false)?,
        })
    }

    /// Opt out of TLS certificate verification for HTTP attachment fetches.
    /// Verification is on unless this is called with `true`.
    pub fn accept_invalid_certs(&mut self, accept: bool) -> Result<(), MailerError> {
        if accept {
            log::warn!("certificate verification for HTTP attachment downloads is disabled");
        }
        self.http = http_client(accept)?;
        Ok(())
    }

    /// Register an SFTP server as an attachment source under `label`,
    /// overwriting any previous entry with that label.
    pub fn enable_remote_source(
        &mut self,
        host: &str,
        user: &str,
        password: &str,
        known_hosts_path: &str,
        label: &str,
    ) -> Result<(), MailerError> {
        let opts = RemoteSessionOpts::new(host, user, password, known_hosts_path);
        self.registry.set(label, opts)
    }

    pub fn disable_remote_source(&mut self, label: &str) -> Result<(), MailerError> {
        self.registry.remove(label)
    }

    /// Compose and deliver one message.
    ///
    /// Attachments that no applicable source could provide are dropped with
    /// a warning and reported as `Missing`; a failure to read a local path
    /// (the terminal fallback) aborts the send. The returned report only
    /// exists when the message itself was delivered.
    pub fn send_email(
        &self,
        to: impl Into<Recipients>,
        body: impl Into<Body>,
        subject: Option<&str>,
        attachments: impl Into<Attachments>,
    ) -> Result<SendReport, MailerError> {
        let to = to.into();
        let body = body.into();

        let mut resolved = Vec::new();
        let mut report = SendReport::default();
        for (locator, filename) in attachments.into().into_named() {
            match attachment::resolve_contents(&locator, &self.registry, &self.http)? {
                Some(data) => {
                    let content_type =
                        attachment::content_type_for(&locator).essence_str().to_string();
                    log::debug!(
                        "attaching {} as {} ({}, {} bytes)",
                        locator,
                        filename,
                        content_type,
                        data.len()
                    );
                    resolved.push(ResolvedAttachment {
                        filename: filename.clone(),
                        content_type,
                        data,
                    });
                    report.attachments.push(AttachmentReport {
                        locator,
                        filename,
                        outcome: AttachmentOutcome::Attached,
                    });
                }
                None => {
                    log::warn!("could not attach {} to email", locator);
                    report.attachments.push(AttachmentReport {
                        locator,
                        filename,
                        outcome: AttachmentOutcome::Missing,
                    });
                }
            }
        }

        let message =
            message::build_message(&self.config.sender_addr, &to, subject, &body, &resolved)?;

        let transport = self.transport()?;
        log::debug!("sending email to {:?}", to);
        transport.send(&message).map_err(classify_smtp_error)?;

        Ok(report)
    }

    /// Probe the configured SMTP server: connect, NOOP, disconnect.
    pub fn check_connection(&self) -> bool {
        let transport = match self.transport() {
            Ok(transport) => transport,
            Err(e) => {
                log::warn!("could not set up transport to {}: {}", self.config.smtp_server, e);
                return false;
            }
        };

        match transport.test_connection() {
            Ok(alive) => alive,
            Err(e) => {
                log::warn!(
                    "connection check against {}:{} failed: {}",
                    self.config.smtp_server,
                    self.config.smtp_port,
                    e
                );
                false
            }
        }
    }

    fn transport(&self) -> Result<SmtpTransport, MailerError> {
        let tls = TlsParameters::new(self.config.smtp_server.clone())
            .map_err(|e| MailerError::Transport(e.to_string()))?;
        let credentials = Credentials::new(
            self.config.sender_addr.clone(),
            self.config.sender_pass.clone(),
        );

        Ok(SmtpTransport::relay(&self.config.smtp_server)
            .map_err(|e| MailerError::Transport(e.to_string()))?
            .credentials(credentials)
            .port(self.config.smtp_port)
            .tls(Tls::Required(tls))
            .build())
    }
}

// lettre does not expose the SMTP reply code here; a permanent rejection on
// an otherwise healthy submission path is almost always a credential failure.
fn classify_smtp_error(e: lettre::transport::smtp::Error) -> MailerError {
    if e.is_permanent() {
        MailerError::Authentication(e.to_string())
    } else {
        MailerError::Transport(e.to_string())
    }
}

fn http_client(accept_invalid_certs: bool) -> Result<reqwest::blocking::Client, MailerError> {
    reqwest::blocking::Client::builder()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|e| MailerError::Configuration(format!("failed to build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> Mailer {
        let config = MailerConfig::new("sender@example.com", "hunter2").unwrap();
        Mailer::new(config).unwrap()
    }

    #[test]
    fn test_new_rejects_empty_credentials() {
        let config = MailerConfig {
            sender_addr: "sender@example.com".to_string(),
            sender_pass: String::new(),
            smtp_server: "smtp.example.com".to_string(),
            smtp_port: 587,
        };
        assert!(matches!(
            Mailer::new(config),
            Err(MailerError::Configuration(_))
        ));
    }

    #[test]
    fn test_remote_source_lifecycle() {
        let known_hosts = tempfile::NamedTempFile::new().unwrap();
        let path = known_hosts.path().to_str().unwrap().to_string();
        let mut mailer = mailer();

        mailer
            .enable_remote_source("sftp.example.com", "u", "p", &path, "x")
            .unwrap();
        mailer.disable_remote_source("x").unwrap();

        let result = mailer.disable_remote_source("x");
        assert!(matches!(result, Err(MailerError::NotFound(_))));
    }

    #[test]
    fn test_enable_remote_source_with_unreadable_material_fails() {
        let mut mailer = mailer();
        let result = mailer.enable_remote_source(
            "sftp.example.com",
            "u",
            "p",
            "/nonexistent/known_hosts",
            "default",
        );
        assert!(matches!(result, Err(MailerError::Configuration(_))));
    }

    #[test]
    fn test_send_report_accounting() {
        let report = SendReport {
            attachments: vec![
                AttachmentReport {
                    locator: "a.txt".to_string(),
                    filename: "a.txt".to_string(),
                    outcome: AttachmentOutcome::Attached,
                },
                AttachmentReport {
                    locator: "b.txt".to_string(),
                    filename: "b.txt".to_string(),
                    outcome: AttachmentOutcome::Missing,
                },
            ],
        };

        assert!(!report.all_attached());
        assert_eq!(report.missing().count(), 1);
        assert_eq!(report.missing().next().unwrap().locator, "b.txt");
    }
}
