use thiserror::Error;

/// Longest message written to the sink or carried in an error body; beyond
/// this the text is cut and marked
pub const EVENT_MESSAGE_LIMIT: usize = 1000;

/// Structured chat relay error with a stable code
///
/// The four kinds below abort a session and surface to the caller;
/// malformed stream lines and sink write failures are recovered locally and
/// never reach this type.
#[derive(Error, Debug)]
pub enum ChatRelayError {
    /// Upstream returned a non-success HTTP status. Body is truncated to
    /// [`EVENT_MESSAGE_LIMIT`]; the call-correlation id is kept when the
    /// proxy sent one.
    #[error("upstream proxy request failed ({status}): {body}")]
    UpstreamHttp {
        status: u16,
        body: String,
        call_id: Option<String>,
    },

    /// No data received within the configured transport timeout
    #[error("upstream stream timed out: {0}")]
    UpstreamTimeout(String),

    /// No usable authentication credential at request time
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Any other uncaught failure during streaming, wrapped rather than
    /// propagated raw
    #[error("unexpected streaming failure: {0}")]
    Unexpected(String),
}

impl ChatRelayError {
    /// Stable machine-readable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::UpstreamHttp { .. } => "UPSTREAM_HTTP_ERROR",
            Self::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Unexpected(_) => "UNEXPECTED_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatRelayError>;

/// Cap a message at `limit` characters, marking the cut
///
/// Truncates on a character boundary so multi-byte text never splits.
pub fn truncate_message(message: &str, limit: usize) -> String {
    let trimmed = message.trim();
    match trimmed.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}...<truncated>", &trimmed[..byte_idx]),
        None => trimmed.to_string(),
    }
}
