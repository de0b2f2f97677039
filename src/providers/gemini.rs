use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use log::{debug, trace, error};

use crate::error::{ProviderError, ProviderResult};
use crate::request::GenerationRequest;

// ===== Message Types =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part
{   #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content
{   #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>
  , #[serde(default)]
    pub parts: Vec<Part>
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest
{   #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>
  , pub contents: Vec<Content>
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse
{   #[serde(default)]
    pub candidates: Vec<Candidate>
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate
{   pub content: Option<Content>
  , #[serde(default)]
    pub finish_reason: Option<String>
}

impl GenerateContentResponse
{   /// `candidates[0].content.parts[0].text`
    pub fn completion(&self) -> Option<String>
    {   self.candidates.first()
          .and_then(|c| c.content.as_ref())
          .and_then(|c| c.parts.first())
          .and_then(|p| p.text.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictParameters
{   pub sample_count: u32
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictInstance
{   pub prompt: String
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest
{   pub instances: Vec<PredictInstance>
  , pub parameters: PredictParameters
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictResponse
{   #[serde(default)]
    pub predictions: Vec<Prediction>
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction
{   #[serde(default)]
    pub bytes_base64_encoded: Option<String>
  , #[serde(default)]
    pub mime_type: Option<String>
}

// ===== Gemini Client =====

/// Primary provider in the default routes
pub struct GeminiClient
{   api_key: Option<String>
  , model: String
  , image_model: String
  , api_base: String
  , http_client: reqwest::Client
}

impl GeminiClient
{   pub fn new(
      config: &crate::config::ProviderConfig
    , http_client: reqwest::Client
    ) -> Self
    {   debug!("Creating GeminiClient for model: {}", config.model);
        GeminiClient
        {   api_key: config.api_key.clone()
          , model: config.model.clone()
          , image_model: config.image_model.clone()
          , api_base: config.base_url()
          , http_client
        }
    }

    fn get_api_key(&self) -> Result<&str, ProviderError>
    {   self.api_key.as_deref().ok_or_else(|| {
          error!("No API key for Gemini");
          ProviderError::transport(Some(serde_json::json!({
            "message": crate::error::Error::MissingApiKey(
              "Gemini".to_string()
            ).to_string(),
          })))
        })
    }

    /// POST and return the body text of a 2xx response
    async fn post<T: Serialize>(
      &self
    , url: String
    , body: &T
    ) -> Result<String, ProviderError>
    {   let api_key = self.get_api_key()?;

        let response = self.http_client
          .post(url)
          .header("x-goog-api-key", api_key)
          .header("Content-Type", "application/json")
          .json(body)
          .send()
          .await
          .map_err(|e| super::network_failure("HTTP error", e))?;

        let status = response.status();
        trace!("Gemini response status: {}", status);

        if !status.is_success()
        {   error!("Gemini API error: {}", status);
            return Err(ProviderError::transport(Some(
              super::status_details(response).await
            )));
        }

        response.text().await.map_err(|e| {
          super::network_failure("Failed to read Gemini body", e)
        })
    }

    async fn handle_generate_content(
      &self
    , request: &GenerationRequest
    ) -> ProviderResult
    {   let kind = request.kind();
        debug!("Handling {:?} with Gemini model: {}", kind, self.model);

        let prompt = crate::prompt::render(request);
        let body = GenerateContentRequest
        {   system_instruction: prompt.system.map(|s| Content
            {   role: None
              , parts: vec![Part { text: Some(s.to_string()) }]
            })
          , contents: vec![
              Content
              {   role: Some("user".to_string())
                , parts: vec![Part { text: Some(prompt.instruction) }]
              }
            ]
        };

        let raw = self.post(
          format!("{}/models/{}:generateContent", self.api_base, self.model)
        , &body
        ).await?;

        let envelope: GenerateContentResponse
          = serde_json::from_str(&raw).map_err(|e| {
            error!("Parse error: {}", e);
            ProviderError::malformed(raw.clone())
          })?;

        crate::normalize::decode_completion(envelope.completion(), kind)
    }

    async fn handle_generate_image(
      &self
    , request: &GenerationRequest
    ) -> ProviderResult
    {   debug!("Handling image with Imagen model: {}", self.image_model);

        let prompt = crate::prompt::render(request);
        let body = PredictRequest
        {   instances: vec![PredictInstance { prompt: prompt.instruction }]
          , parameters: PredictParameters { sample_count: 1 }
        };

        let raw = self.post(
          format!("{}/models/{}:predict", self.api_base, self.image_model)
        , &body
        ).await?;

        let envelope: PredictResponse
          = serde_json::from_str(&raw).map_err(|e| {
            error!("Parse error: {}", e);
            ProviderError::malformed(raw.clone())
          })?;

        match envelope.predictions.into_iter()
          .find_map(|p| p.bytes_base64_encoded)
        {   Some(data) => {
              super::resolve_image(
                &self.http_client
              , super::ImageReference::Base64(data)
              ).await
            }
          , None => {
              error!("Imagen returned no image");
              Err(ProviderError::malformed(raw))
            }
        }
    }
}

#[async_trait]
impl super::ProviderClient for GeminiClient
{   fn id(&self) -> crate::ProviderId
    {   crate::ProviderId::Gemini
    }

    async fn call(&self, request: &GenerationRequest) -> ProviderResult
    {   match request
        {   GenerationRequest::Image(_) => {
              self.handle_generate_image(request).await
            }
          , _ => self.handle_generate_content(request).await
        }
    }
}
