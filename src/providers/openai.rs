use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use log::{debug, trace, error};

use crate::error::{ProviderError, ProviderResult};
use crate::request::GenerationRequest;

const IMAGE_SIZE: &str = "1024x1024";

// ===== Message Types =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: String
  , #[serde(default)]
    pub content: Option<String>
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest
{   pub model: String
  , pub messages: Vec<ChatMessage>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse
{   #[serde(default)]
    pub choices: Vec<Choice>
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice
{   pub message: Option<ChatMessage>
  , #[serde(default)]
    pub finish_reason: Option<String>
}

impl ChatResponse
{   /// `choices[0].message.content`
    pub fn completion(&self) -> Option<String>
    {   self.choices.first()
          .and_then(|c| c.message.as_ref())
          .and_then(|m| m.content.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageGenerationRequest
{   pub model: String
  , pub prompt: String
  , pub n: u32
  , pub size: String
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageGenerationResponse
{   #[serde(default)]
    pub data: Vec<ImageData>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageData
{   #[serde(default)]
    pub b64_json: Option<String>
  , #[serde(default)]
    pub url: Option<String>
}

impl ImageData
{   /// Inline data wins over a URL
    fn reference(self) -> Option<super::ImageReference>
    {   match (self.b64_json, self.url)
        {   (Some(data), _) => Some(super::ImageReference::Base64(data))
          , (None, Some(url)) => Some(super::ImageReference::Url(url))
          , (None, None) => None
        }
    }
}

// ===== OpenAI Client =====

/// Secondary provider in the default routes
pub struct OpenAiClient
{   api_key: Option<String>
  , model: String
  , image_model: String
  , api_base: String
  , http_client: reqwest::Client
}

impl OpenAiClient
{   pub fn new(
      config: &crate::config::ProviderConfig
    , http_client: reqwest::Client
    ) -> Self
    {   debug!("Creating OpenAiClient for model: {}", config.model);
        OpenAiClient
        {   api_key: config.api_key.clone()
          , model: config.model.clone()
          , image_model: config.image_model.clone()
          , api_base: config.base_url()
          , http_client
        }
    }

    fn get_api_key(&self) -> Result<&str, ProviderError>
    {   self.api_key.as_deref().ok_or_else(|| {
          error!("No API key for OpenAI");
          ProviderError::transport(Some(serde_json::json!({
            "message": crate::error::Error::MissingApiKey(
              "OpenAI".to_string()
            ).to_string(),
          })))
        })
    }

    async fn post<T: Serialize>(
      &self
    , path: &str
    , body: &T
    ) -> Result<String, ProviderError>
    {   let api_key = self.get_api_key()?;

        let response = self.http_client
          .post(format!("{}{}", self.api_base, path))
          .header("Authorization", format!("Bearer {}", api_key))
          .header("Content-Type", "application/json")
          .json(body)
          .send()
          .await
          .map_err(|e| super::network_failure("HTTP error", e))?;

        let status = response.status();
        trace!("OpenAI response status: {}", status);

        if !status.is_success()
        {   error!("OpenAI API error: {}", status);
            return Err(ProviderError::transport(Some(
              super::status_details(response).await
            )));
        }

        response.text().await.map_err(|e| {
          super::network_failure("Failed to read OpenAI body", e)
        })
    }

    async fn handle_chat(
      &self
    , request: &GenerationRequest
    ) -> ProviderResult
    {   let kind = request.kind();
        debug!("Handling {:?} with OpenAI model: {}", kind, self.model);

        let prompt = crate::prompt::render(request);
        let mut messages = vec![];
        if let Some(system) = prompt.system
        {   messages.push(ChatMessage
            {   role: "system".to_string()
              , content: Some(system.to_string())
            });
        }
        messages.push(ChatMessage
        {   role: "user".to_string()
          , content: Some(prompt.instruction)
        });

        let body = ChatRequest
        {   model: self.model.clone()
          , messages
        };

        let raw = self.post("/chat/completions", &body).await?;

        let envelope: ChatResponse
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
    {   debug!("Handling image with model: {}", self.image_model);

        let prompt = crate::prompt::render(request);
        let body = ImageGenerationRequest
        {   model: self.image_model.clone()
          , prompt: prompt.instruction
          , n: 1
          , size: IMAGE_SIZE.to_string()
        };

        let raw = self.post("/images/generations", &body).await?;

        let envelope: ImageGenerationResponse
          = serde_json::from_str(&raw).map_err(|e| {
            error!("Parse error: {}", e);
            ProviderError::malformed(raw.clone())
          })?;

        match envelope.data.into_iter().find_map(ImageData::reference)
        {   Some(reference) => {
              super::resolve_image(&self.http_client, reference).await
            }
          , None => {
              error!("OpenAI returned no image");
              Err(ProviderError::malformed(raw))
            }
        }
    }
}

#[async_trait]
impl super::ProviderClient for OpenAiClient
{   fn id(&self) -> crate::ProviderId
    {   crate::ProviderId::OpenAi
    }

    async fn call(&self, request: &GenerationRequest) -> ProviderResult
    {   match request
        {   GenerationRequest::Image(_) => {
              self.handle_generate_image(request).await
            }
          , _ => self.handle_chat(request).await
        }
    }
}
