use std::fmt;
use std::fs;
use std::io::Read;
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use ssh2::{CheckResult, KnownHostFileKind, Session};

use crate::error::MailerError;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_LABEL: &str = "default";

/// Credentials for one SFTP attachment source.
#[derive(Clone)]
pub struct RemoteSessionOpts {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// OpenSSH-format known-hosts file the server's key must match.
    pub known_hosts: PathBuf,
}

impl RemoteSessionOpts {
    pub fn new(
        host: &str,
        username: &str,
        password: &str,
        known_hosts: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host: host.to_string(),
            port: DEFAULT_SSH_PORT,
            username: username.to_string(),
            password: password.to_string(),
            known_hosts: known_hosts.into(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

// Keeps the password out of debug output and logs.
impl fmt::Debug for RemoteSessionOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSessionOpts")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"*".repeat(self.password.len()))
            .field("known_hosts", &self.known_hosts)
            .finish()
    }
}

/// Labeled store of SFTP credentials, tried in registration order when an
/// attachment is resolved. An overwrite keeps the label's original position.
#[derive(Debug, Default)]
pub struct RemoteSessionRegistry {
    sessions: Vec<(String, RemoteSessionOpts)>,
}

impl RemoteSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the entry under `label`.
    ///
    /// The known-hosts file is loaded up front so a bad path fails at
    /// registration time instead of on the first send.
    pub fn set(&mut self, label: &str, opts: RemoteSessionOpts) -> Result<(), MailerError> {
        fs::read(&opts.known_hosts).map_err(|e| {
            MailerError::Configuration(format!(
                "cannot load known hosts file {}: {}",
                opts.known_hosts.display(),
                e
            ))
        })?;

        log::debug!("registering sftp source {:?} as {:?}", opts, label);
        match self.sessions.iter_mut().find(|(l, _)| l == label) {
            Some(entry) => entry.1 = opts,
            None => self.sessions.push((label.to_string(), opts)),
        }
        Ok(())
    }

    pub fn remove(&mut self, label: &str) -> Result<(), MailerError> {
        match self.sessions.iter().position(|(l, _)| l == label) {
            Some(idx) => {
                self.sessions.remove(idx);
                Ok(())
            }
            None => Err(MailerError::NotFound(format!(
                "no remote source registered under label {:?}",
                label
            ))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RemoteSessionOpts)> {
        self.sessions.iter().map(|(label, opts)| (label.as_str(), opts))
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

/// Download one file from an SFTP server.
///
/// The session is scoped to this call: the TCP stream and SSH session are
/// dropped (closed) on every exit path.
pub fn fetch(opts: &RemoteSessionOpts, remote_path: &str) -> Result<Vec<u8>, MailerError> {
    let stream = TcpStream::connect((opts.host.as_str(), opts.port)).map_err(|e| {
        MailerError::Transport(format!(
            "failed to connect to {}:{}: {}",
            opts.host, opts.port, e
        ))
    })?;

    let mut sess = Session::new().map_err(|e| MailerError::Transport(e.to_string()))?;
    sess.set_tcp_stream(stream);
    sess.handshake()
        .map_err(|e| MailerError::Transport(format!("ssh handshake with {} failed: {}", opts.host, e)))?;

    verify_host_key(&sess, opts)?;

    sess.userauth_password(&opts.username, &opts.password)
        .map_err(|e| {
            MailerError::Authentication(format!(
                "login to {} as {} rejected: {}",
                opts.host, opts.username, e
            ))
        })?;

    let sftp = sess
        .sftp()
        .map_err(|e| MailerError::Transport(format!("sftp subsystem on {} failed: {}", opts.host, e)))?;

    let mut remote_file = sftp.open(Path::new(remote_path)).map_err(|e| {
        MailerError::NotFound(format!(
            "{} not available on {}: {}",
            remote_path, opts.host, e
        ))
    })?;

    log::debug!("found {} on {}, downloading", remote_path, opts.host);
    let mut contents = Vec::new();
    remote_file.read_to_end(&mut contents).map_err(|e| {
        MailerError::Transport(format!(
            "reading {} from {} failed: {}",
            remote_path, opts.host, e
        ))
    })?;

    Ok(contents)
}

fn verify_host_key(sess: &Session, opts: &RemoteSessionOpts) -> Result<(), MailerError> {
    let mut known_hosts = sess
        .known_hosts()
        .map_err(|e| MailerError::Transport(e.to_string()))?;
    known_hosts
        .read_file(&opts.known_hosts, KnownHostFileKind::OpenSSH)
        .map_err(|e| {
            MailerError::Configuration(format!(
                "cannot load known hosts file {}: {}",
                opts.known_hosts.display(),
                e
            ))
        })?;

    let (key, _) = sess.host_key().ok_or_else(|| {
        MailerError::Transport(format!("{} presented no host key", opts.host))
    })?;

    match known_hosts.check_port(&opts.host, opts.port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(MailerError::Authentication(format!(
            "{} has no entry in {}",
            opts.host,
            opts.known_hosts.display()
        ))),
        CheckResult::Mismatch => Err(MailerError::Authentication(format!(
            "host key mismatch for {}",
            opts.host
        ))),
        CheckResult::Failure => Err(MailerError::Transport(format!(
            "host key check failed for {}",
            opts.host
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known_hosts_file() -> tempfile::NamedTempFile {
        // Content is only parsed at connection time; registration just loads it
        tempfile::NamedTempFile::new().unwrap()
    }

    fn opts(host: &str, known_hosts: &Path) -> RemoteSessionOpts {
        RemoteSessionOpts::new(host, "user", "secret", known_hosts)
    }

    #[test]
    fn test_set_then_remove() {
        let file = known_hosts_file();
        let mut registry = RemoteSessionRegistry::new();

        registry.set("x", opts("h", file.path())).unwrap();
        assert_eq!(registry.len(), 1);

        registry.remove("x").unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_unknown_label_is_not_found() {
        let file = known_hosts_file();
        let mut registry = RemoteSessionRegistry::new();

        registry.set("x", opts("h", file.path())).unwrap();
        registry.remove("x").unwrap();

        let result = registry.remove("x");
        assert!(matches!(result, Err(MailerError::NotFound(_))));
    }

    #[test]
    fn test_unreadable_known_hosts_fails_registration() {
        let mut registry = RemoteSessionRegistry::new();

        let result = registry.set("x", opts("h", Path::new("/nonexistent/known_hosts")));
        assert!(matches!(result, Err(MailerError::Configuration(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_iteration_follows_registration_order() {
        let file = known_hosts_file();
        let mut registry = RemoteSessionRegistry::new();

        registry.set("a", opts("host-a", file.path())).unwrap();
        registry.set("b", opts("host-b", file.path())).unwrap();
        registry.set("c", opts("host-c", file.path())).unwrap();

        let labels: Vec<&str> = registry.iter().map(|(label, _)| label).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_overwrite_keeps_original_position() {
        let file = known_hosts_file();
        let mut registry = RemoteSessionRegistry::new();

        registry.set("a", opts("host-a", file.path())).unwrap();
        registry.set("b", opts("host-b", file.path())).unwrap();
        registry.set("a", opts("host-a2", file.path())).unwrap();

        let entries: Vec<(&str, &str)> = registry
            .iter()
            .map(|(label, opts)| (label, opts.host.as_str()))
            .collect();
        assert_eq!(entries, vec![("a", "host-a2"), ("b", "host-b")]);
    }

    #[test]
    fn test_debug_output_masks_the_password() {
        let file = known_hosts_file();
        let rendered = format!("{:?}", opts("h", file.path()));

        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("user"));
    }
}
