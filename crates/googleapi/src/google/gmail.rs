//! Gmail API v1 Client
//!
//! Sends HTML mail on behalf of a Workspace sender, optionally with a
//! `Reply-To` address and file or in-memory attachments.
//!
//! Messages are assembled as RFC 2822 `multipart/mixed` documents and sent
//! base64url encoded through `users.messages.send`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::client::GoogleClient;
use crate::auth::{
    build_service_account_credentials, ServiceAccountKey, ServiceAccountTokenSource, TokenSource,
};
use crate::common::{Error, Result};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

pub const GMAIL_SCOPES: [&str; 1] = ["https://www.googleapis.com/auth/gmail.send"];

/// MIME body lines are wrapped at this width
const LINE_WIDTH: usize = 76;

/// A file to attach to a mail
#[derive(Debug, Clone)]
pub enum Attachment {
    /// Read from disk; the MIME type is guessed from `filename`.
    Path { path: PathBuf, filename: String },
    /// In-memory bytes with an explicit MIME type; `.{subtype}` is appended
    /// to `filename`.
    Bytes {
        data: Vec<u8>,
        filename: String,
        mime_maintype: String,
        mime_subtype: String,
    },
}

impl Attachment {
    pub fn from_path(path: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            filename: filename.into(),
        }
    }

    pub fn from_bytes(
        data: Vec<u8>,
        filename: impl Into<String>,
        mime_maintype: impl Into<String>,
        mime_subtype: impl Into<String>,
    ) -> Self {
        Self::Bytes {
            data,
            filename: filename.into(),
            mime_maintype: mime_maintype.into(),
            mime_subtype: mime_subtype.into(),
        }
    }

    /// Resolve to (content type, file name, payload)
    async fn load(&self) -> Result<(String, String, Vec<u8>)> {
        match self {
            Self::Path { path, filename } => {
                let mime = mime_guess::from_path(filename).first_or_octet_stream();
                let data = tokio::fs::read(path).await.map_err(|e| {
                    Error::invalid(format!("Cannot read attachment {}: {}", path.display(), e))
                })?;
                Ok((mime.essence_str().to_string(), filename.clone(), data))
            }
            Self::Bytes {
                data,
                filename,
                mime_maintype,
                mime_subtype,
            } => Ok((
                format!("{}/{}", mime_maintype, mime_subtype),
                format!("{}.{}", filename, mime_subtype),
                data.clone(),
            )),
        }
    }
}

pub struct GmailApi {
    client: GoogleClient,
    base_url: String,
    sender: String,
    reply_to: Option<String>,
}

super::google_api_wrapper!(GmailApi);

/// Build a Gmail client sending as `mail_sender`.
pub async fn create_gmail(
    service_file: impl AsRef<Path>,
    mail_sender: &str,
    mail_reply_address: Option<&str>,
) -> Result<GmailApi> {
    let key = ServiceAccountKey::from_file(service_file).await?;
    GmailApi::from_service_account(key, mail_sender, mail_reply_address)
}

impl GmailApi {
    pub fn new(tokens: Arc<dyn TokenSource>, sender: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: GoogleClient::new(tokens)?,
            base_url: GMAIL_API_BASE.to_string(),
            sender: sender.into(),
            reply_to: None,
        })
    }

    /// The sender is also the impersonated subject.
    pub fn from_service_account(
        key: ServiceAccountKey,
        mail_sender: &str,
        mail_reply_address: Option<&str>,
    ) -> Result<Self> {
        let credentials = build_service_account_credentials(key, &GMAIL_SCOPES, mail_sender);
        let api = Self::new(Arc::new(ServiceAccountTokenSource::new(credentials)?), mail_sender)?;
        Ok(api.with_reply_to(mail_reply_address.map(str::to_string)))
    }

    pub fn with_reply_to(mut self, reply_to: Option<String>) -> Self {
        self.reply_to = reply_to;
        self
    }

    /// Build the `{"raw": ...}` body for one receiver
    pub async fn build_message(
        &self,
        receiver: &str,
        subject: &str,
        html: &str,
        attachments: &[Attachment],
    ) -> Result<Value> {
        let boundary = boundary();

        let mut message = String::new();
        push_header(&mut message, "MIME-Version", "1.0")?;
        push_header(&mut message, "To", receiver)?;
        push_header(&mut message, "From", &self.sender)?;
        push_header(&mut message, "Subject", &encode_header(subject))?;
        if let Some(reply_to) = &self.reply_to {
            push_header(&mut message, "Reply-To", reply_to)?;
        }
        push_header(
            &mut message,
            "Content-Type",
            &format!("multipart/mixed; boundary=\"{}\"", boundary),
        )?;
        message.push_str("\r\n");

        message.push_str(&format!("--{}\r\n", boundary));
        push_header(&mut message, "Content-Type", "text/html; charset=\"utf-8\"")?;
        push_header(&mut message, "Content-Transfer-Encoding", "base64")?;
        message.push_str("\r\n");
        message.push_str(&wrap_base64(html.as_bytes()));

        for attachment in attachments {
            let (content_type, filename, data) = attachment.load().await?;
            debug!("Attaching {} ({}, {} bytes)", filename, content_type, data.len());

            message.push_str(&format!("--{}\r\n", boundary));
            push_header(&mut message, "Content-Type", &content_type)?;
            push_header(&mut message, "Content-Transfer-Encoding", "base64")?;
            push_header(
                &mut message,
                "Content-Disposition",
                &format!("attachment; filename=\"{}\"", filename.replace('"', "")),
            )?;
            message.push_str("\r\n");
            message.push_str(&wrap_base64(&data));
        }
        message.push_str(&format!("--{}--\r\n", boundary));

        Ok(json!({ "raw": URL_SAFE.encode(message.as_bytes()) }))
    }

    /// Send the mail, one separate message per receiver
    pub async fn send_message(
        &self,
        receivers: &[String],
        subject: &str,
        html: &str,
        attachments: &[Attachment],
    ) -> Result<Vec<Value>> {
        info!("Sending mail '{}' to {} receivers", subject, receivers.len());

        let url = format!("{}/users/me/messages/send", self.base_url);
        let mut sent = Vec::with_capacity(receivers.len());
        for receiver in receivers {
            let message = self.build_message(receiver, subject, html, attachments).await?;
            sent.push(self.client.post(&url, &[], &message).await?);
        }

        info!("Mail sent successfully");
        Ok(sent)
    }
}

/// Header values must stay on one line
fn push_header(message: &mut String, name: &str, value: &str) -> Result<()> {
    if value.contains(|c: char| c == '\r' || c == '\n') {
        return Err(Error::invalid(format!("Line break in {} header", name)));
    }
    message.push_str(name);
    message.push_str(": ");
    message.push_str(value);
    message.push_str("\r\n");
    Ok(())
}

/// RFC 2047 encoded-word for non-ASCII header values
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?b?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

fn wrap_base64(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH * 2 + 2);
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push_str("\r\n");
    }
    out
}

fn boundary() -> String {
    let tail: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    format!("=_{}", tail)
}
