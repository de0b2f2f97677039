//! Generative provider implementations

pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use base64::Engine;
use log::{debug, error, trace};
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::{ProviderError, ProviderResult};

// Re-export for convenience
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

/// One backing generative service.
///
/// `call` issues exactly one request to the service (plus one download
/// for URL image references) and never retries. Failures are returned
/// as values.
#[async_trait]
pub trait ProviderClient: Send + Sync
{   fn id(&self) -> crate::ProviderId;

    async fn call(
      &self
    , request: &crate::request::GenerationRequest
    ) -> ProviderResult;
}

/// Build the client for a provider config
pub fn from_config(
  config: &crate::config::ProviderConfig
, default_timeout_secs: u64
) -> Result<std::sync::Arc<dyn ProviderClient>, crate::error::Error>
{   let http = http_client(
      config.timeout_secs.unwrap_or(default_timeout_secs)
    )?;
    let client: std::sync::Arc<dyn ProviderClient> = match config.id
    {   crate::ProviderId::Gemini => {
          std::sync::Arc::new(GeminiClient::new(config, http))
        }
      , crate::ProviderId::OpenAi => {
          std::sync::Arc::new(OpenAiClient::new(config, http))
        }
    };
    Ok(client)
}

pub fn http_client(
  timeout_secs: u64
) -> Result<reqwest::Client, crate::error::Error>
{   reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout_secs))
      .build()
      .map_err(|e| crate::error::Error::HttpError(e.to_string()))
}

/// Transport failure for a request that never completed. The URL is
/// dropped first so query credentials stay out of details and logs.
pub(crate) fn network_failure(
  context: &str
, e: reqwest::Error
) -> ProviderError
{   let e = e.without_url();
    error!("{}: {}", context, e);
    ProviderError::transport(Some(json!({
      "message": e.to_string(),
      "timeout": e.is_timeout(),
    })))
}

/// Failure details from a non-success response: the body as JSON when
/// it parses, as a string otherwise.
pub(crate) async fn status_details(
  response: reqwest::Response
) -> Value
{   let status = response.status().as_u16();
    let body = response.text().await
      .unwrap_or_else(|_| "Unknown error".to_string());
    let body = serde_json::from_str::<Value>(&body)
      .unwrap_or(Value::String(body));
    json!({
      "status": status,
      "body": body,
    })
}

/// How a provider handed back a generated image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference
{   Base64(String)
  , Url(String)
}

/// Normalise an image reference to `{success, image_base64}`. URLs are
/// fetched and their bytes encoded.
pub async fn resolve_image(
  http: &reqwest::Client
, reference: ImageReference
) -> ProviderResult
{   let encoded = match reference
    {   ImageReference::Base64(data) => data
      , ImageReference::Url(url) => {
          debug!("Downloading generated image");
          trace!("Image URL: {}", url);
          let response = http.get(&url).send().await.map_err(|e| {
            let e = e.without_url();
            error!("Image download failed: {}", e);
            ProviderError::transport(Some(json!({
              "message": "could not download generated image",
              "cause": e.to_string(),
            })))
          })?;
          if !response.status().is_success()
          {   error!("Image download returned {}", response.status());
              return Err(ProviderError::transport(Some(
                status_details(response).await
              )));
          }
          let bytes = response.bytes().await.map_err(|e| {
            network_failure("Image body read failed", e)
          })?;
          base64::engine::general_purpose::STANDARD.encode(&bytes)
        }
    };
    Ok(json!({
      "success": true,
      "image_base64": encoded,
    }))
}
