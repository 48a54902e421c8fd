use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::error;

use outmail::{Attachments, Body, Mailer, MailerConfig, TextKind};

/// Send emails with attachments pulled from local, HTTP, or SFTP sources
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to config file
    #[clap(short, long, default_value = "~/.config/outmail/config.json")]
    config: String,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compose and send an email
    Send {
        /// Recipient address (repeatable)
        #[clap(short, long, required = true)]
        to: Vec<String>,

        /// Plain text body
        #[clap(short, long)]
        body: String,

        /// Optional HTML rendering of the same body
        #[clap(long)]
        html: Option<String>,

        /// Subject line
        #[clap(short, long)]
        subject: Option<String>,

        /// Attachment locator, optionally as locator=name-in-message
        /// (repeatable)
        #[clap(short, long)]
        attach: Vec<String>,

        /// Accept invalid TLS certificates when fetching HTTP attachments
        #[clap(long)]
        insecure: bool,
    },

    /// Check that the configured SMTP server answers
    Check,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    env_logger::Builder::new()
        .filter_level(if args.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    // Load configuration
    let config_path = shellexpand::tilde(&args.config).into_owned();
    let config = MailerConfig::load(Path::new(&config_path))
        .with_context(|| format!("failed to load config from {}", config_path))?;

    let mut mailer = Mailer::new(config)?;

    match args.command {
        Commands::Send {
            to,
            body,
            html,
            subject,
            attach,
            insecure,
        } => {
            if insecure {
                mailer.accept_invalid_certs(true)?;
            }

            let body = match html {
                Some(html) => {
                    Body::Alternatives(vec![(TextKind::Plain, body), (TextKind::Html, html)])
                }
                None => Body::Plain(body),
            };
            let attachments =
                Attachments::Named(attach.iter().map(|arg| parse_attachment_arg(arg)).collect());

            let report = mailer.send_email(to, body, subject.as_deref(), attachments)?;

            for dropped in report.missing() {
                eprintln!("warning: attachment {} was not found and was dropped", dropped.locator);
            }
            if report.all_attached() {
                println!("sent");
            } else {
                println!(
                    "sent with {} of {} attachments dropped",
                    report.missing().count(),
                    report.attachments.len()
                );
            }
        }

        Commands::Check => {
            if mailer.check_connection() {
                println!("connection ok");
            } else {
                error!("could not reach the configured SMTP server");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn parse_attachment_arg(arg: &str) -> (String, String) {
    match arg.split_once('=') {
        Some((locator, name)) => (locator.to_string(), name.to_string()),
        None => (arg.to_string(), arg.to_string()),
    }
}
