use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Custom error type for EduGen operations
/// Implements Clone for sending through channels
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error
{   /// API key is missing for a provider
    #[error("Missing API key for: {0}")]
    MissingApiKey(String)
  , /// Request rejected before any provider was called
    #[error("Invalid request: {0}")]
    InvalidRequest(String)
  , /// File extension or upload not supported by the extractor
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String)
  , /// Storage gateway returned a non-success response
    #[error("Storage error: {0}")]
    Storage(String)
  , /// HTTP request error
    #[error("HTTP error: {0}")]
    HttpError(String)
  , /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String)
  , /// Local I/O failure
    #[error("I/O error: {0}")]
    Io(String)
  , /// Backend task is gone
    #[error("Backend error: {0}")]
    Backend(String)
  , /// Generic error
    #[error("Error: {0}")]
    Other(String)
}

impl From<String> for Error
{   fn from(s: String) -> Self
    {   Error::Other(s)
    }
}

impl From<&str> for Error
{   fn from(s: &str) -> Self
    {   Error::Other(s.to_string())
    }
}

impl From<std::io::Error> for Error
{   fn from(e: std::io::Error) -> Self
    {   Error::Io(e.to_string())
    }
}

impl From<reqwest::Error> for Error
{   fn from(e: reqwest::Error) -> Self
    {   Error::HttpError(e.to_string())
    }
}

// ===== Provider attempt errors =====

/// Why a single provider attempt did not yield a usable payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind
{   /// The call never completed with a 2xx response
    TransportFailure
  , /// The reply text was not valid JSON after fence stripping
    MalformedOutput
  , /// The payload itself carried `"error": true`
    ApplicationError
}

impl std::fmt::Display for ProviderErrorKind
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {   match self
        {   ProviderErrorKind::TransportFailure => {
              write!(f, "transport_failure")
            }
          , ProviderErrorKind::MalformedOutput => {
              write!(f, "malformed_output")
            }
          , ProviderErrorKind::ApplicationError => {
              write!(f, "application_error")
            }
        }
    }
}

/// Error value of one provider attempt. Never thrown; carried so both
/// attempts can be reported side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ThisError)]
#[error("{kind}: {message}")]
pub struct ProviderError
{   pub kind: ProviderErrorKind
  , pub message: String
  , pub raw: Option<String>
  , pub details: Option<serde_json::Value>
}

pub const TRANSPORT_FAILURE_MESSAGE: &str = "could not reach provider";
pub const MALFORMED_OUTPUT_MESSAGE: &str = "invalid JSON produced by provider";

impl ProviderError
{   /// Transport failure with the provider's error body as details
    pub fn transport(details: Option<serde_json::Value>) -> Self
    {   ProviderError
        {   kind: ProviderErrorKind::TransportFailure
          , message: TRANSPORT_FAILURE_MESSAGE.to_string()
          , raw: None
          , details
        }
    }

    /// Unparseable reply, keeping the original text
    pub fn malformed(raw: impl Into<String>) -> Self
    {   ProviderError
        {   kind: ProviderErrorKind::MalformedOutput
          , message: MALFORMED_OUTPUT_MESSAGE.to_string()
          , raw: Some(raw.into())
          , details: None
        }
    }

    pub fn application(
      message: impl Into<String>
    , details: serde_json::Value
    ) -> Self
    {   ProviderError
        {   kind: ProviderErrorKind::ApplicationError
          , message: message.into()
          , raw: None
          , details: Some(details)
        }
    }

    /// JSON rendering used at the boundary. Keeps the in-band
    /// `error: true` marker the front end already understands.
    pub fn to_payload(&self) -> serde_json::Value
    {   serde_json::json!({
          "error": true,
          "kind": self.kind,
          "message": self.message,
          "raw": self.raw,
          "details": self.details,
        })
    }
}

/// Outcome of one provider attempt.
pub type ProviderResult = Result<serde_json::Value, ProviderError>;

/// Failure of a whole orchestrated operation.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum OrchestrationError
{   /// Route has no secondary; the primary error is surfaced as is
    #[error("primary provider failed: {0}")]
    PrimaryOnly(ProviderError)
  , /// Both configured providers failed
    #[error("both providers failed (primary: {primary}; secondary: {secondary})")]
    DualFailure
    {   primary: ProviderError
      , secondary: ProviderError
    }
}

/// Reply of a generate command: rejected up front, or failed in flight.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum GenerateError
{   #[error(transparent)]
    Invalid(#[from] Error)
  , #[error(transparent)]
    Orchestration(#[from] OrchestrationError)
}
