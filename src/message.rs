use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::Message;

use crate::attachment::ResolvedAttachment;
use crate::error::MailerError;

/// The duck-typed "string or list" recipient parameter, made explicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    Single(String),
    Many(Vec<String>),
}

impl Recipients {
    pub fn addresses(&self) -> Vec<&str> {
        match self {
            Recipients::Single(addr) => vec![addr.as_str()],
            Recipients::Many(addrs) => addrs.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for Recipients {
    fn from(addr: &str) -> Self {
        Recipients::Single(addr.to_string())
    }
}

impl From<String> for Recipients {
    fn from(addr: String) -> Self {
        Recipients::Single(addr)
    }
}

impl From<Vec<String>> for Recipients {
    fn from(addrs: Vec<String>) -> Self {
        Recipients::Many(addrs)
    }
}

impl From<Vec<&str>> for Recipients {
    fn from(addrs: Vec<&str>) -> Self {
        Recipients::Many(addrs.into_iter().map(str::to_string).collect())
    }
}

/// Textual content subtypes a body representation can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Plain,
    Csv,
    Html,
    Rtf,
}

impl TextKind {
    fn content_type(self) -> ContentType {
        match self {
            TextKind::Plain => ContentType::TEXT_PLAIN,
            TextKind::Html => ContentType::TEXT_HTML,
            TextKind::Csv => {
                ContentType::parse("text/csv; charset=utf-8").unwrap_or(ContentType::TEXT_PLAIN)
            }
            TextKind::Rtf => {
                ContentType::parse("text/rtf; charset=utf-8").unwrap_or(ContentType::TEXT_PLAIN)
            }
        }
    }
}

/// Message body: one plain-text part, or several alternative renderings of
/// the same content. Vector order is caller order; the first entry is the
/// primary representation.
#[derive(Debug, Clone)]
pub enum Body {
    Plain(String),
    Alternatives(Vec<(TextKind, String)>),
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Plain(text.to_string())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Plain(text)
    }
}

impl From<Vec<(TextKind, String)>> for Body {
    fn from(representations: Vec<(TextKind, String)>) -> Self {
        Body::Alternatives(representations)
    }
}

/// Assemble the outgoing message from headers, body, and already-resolved
/// attachments.
pub fn build_message(
    from_addr: &str,
    to: &Recipients,
    subject: Option<&str>,
    body: &Body,
    attachments: &[ResolvedAttachment],
) -> Result<Message, MailerError> {
    let from: Mailbox = from_addr
        .parse()
        .map_err(|e| MailerError::Message(format!("invalid sender address {}: {}", from_addr, e)))?;

    let mut builder = Message::builder().from(from);

    // Each mailbox lands in a single comma-separated To header
    for addr in to.addresses() {
        let mailbox: Mailbox = addr
            .parse()
            .map_err(|e| MailerError::Message(format!("invalid recipient {}: {}", addr, e)))?;
        builder = builder.to(mailbox);
    }

    if let Some(subject) = subject {
        builder = builder.subject(subject);
    }

    let message = match (body, attachments.is_empty()) {
        (Body::Plain(text), true) => builder.singlepart(SinglePart::plain(text.clone())),
        (Body::Plain(text), false) => {
            let mut mixed = MultiPart::mixed().singlepart(SinglePart::plain(text.clone()));
            for attachment in attachments {
                mixed = mixed.singlepart(attachment_part(attachment));
            }
            builder.multipart(mixed)
        }
        (Body::Alternatives(representations), true) => {
            builder.multipart(alternative_part(representations)?)
        }
        (Body::Alternatives(representations), false) => {
            let mut mixed = MultiPart::mixed().multipart(alternative_part(representations)?);
            for attachment in attachments {
                mixed = mixed.singlepart(attachment_part(attachment));
            }
            builder.multipart(mixed)
        }
    };

    message.map_err(|e| MailerError::Message(e.to_string()))
}

/// All representations become siblings under one multipart/alternative, in
/// caller order, so a receiving client picks the richest one it can render.
fn alternative_part(representations: &[(TextKind, String)]) -> Result<MultiPart, MailerError> {
    let (first, rest) = representations
        .split_first()
        .ok_or_else(|| MailerError::Message("body carries no representations".to_string()))?;

    let mut part = MultiPart::alternative().singlepart(text_part(first.0, &first.1));
    for (kind, content) in rest {
        part = part.singlepart(text_part(*kind, content));
    }
    Ok(part)
}

fn text_part(kind: TextKind, content: &str) -> SinglePart {
    SinglePart::builder()
        .header(kind.content_type())
        .body(content.to_string())
}

fn attachment_part(attachment: &ResolvedAttachment) -> SinglePart {
    let content_type = attachment
        .content_type
        .parse()
        .unwrap_or(ContentType::parse("application/octet-stream").unwrap());
    Attachment::new(attachment.filename.clone()).body(attachment.data.clone(), content_type)
}
