use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    /// Network / TLS / decoding failure talking to the mail API.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The mail API answered with a non-success status.
    #[error("Mail API rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid mail configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, MailError>;
