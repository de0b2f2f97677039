//! Configuration for EduGen providers, routes and storage

use serde::{Deserialize, Serialize};
use log::{debug, warn};

pub const DEFAULT_GEMINI_API_BASE: &str
  = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_OPENAI_API_BASE: &str
  = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig
{   /// Which backing service this is
    pub id: crate::ProviderId
  , /// API base URL (if custom)
    pub api_base: Option<String>
  , /// Never serialised back out
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>
  , /// Text generation model
    pub model: String
  , /// Image generation model
    pub image_model: String
  , /// Request timeout in seconds, overrides the global one
    pub timeout_secs: Option<u64>
}

impl ProviderConfig
{   pub fn gemini() -> Self
    {   ProviderConfig
        {   id: crate::ProviderId::Gemini
          , api_base: None
          , api_key: None
          , model: "gemini-1.5-pro".to_string()
          , image_model: "imagen-3.0-generate-002".to_string()
          , timeout_secs: None
        }
    }

    pub fn openai() -> Self
    {   ProviderConfig
        {   id: crate::ProviderId::OpenAi
          , api_base: None
          , api_key: None
          , model: "gpt-4.1-mini".to_string()
          , image_model: "gpt-image-1".to_string()
          , timeout_secs: None
        }
    }

    /// Base URL with any trailing slash removed
    pub fn base_url(&self) -> String
    {   let base = match (&self.api_base, self.id)
        {   (Some(base), _) => base.as_str()
          , (None, crate::ProviderId::Gemini) => DEFAULT_GEMINI_API_BASE
          , (None, crate::ProviderId::OpenAi) => DEFAULT_OPENAI_API_BASE
        };
        base.trim_end_matches('/').to_string()
    }
}

/// Providers tried for one operation. `secondary: None` means the
/// primary error is surfaced without fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route
{   pub primary: crate::ProviderId
  , pub secondary: Option<crate::ProviderId>
}

impl Route
{   pub fn with_fallback(
      primary: crate::ProviderId
    , secondary: crate::ProviderId
    ) -> Self
    {   Route { primary, secondary: Some(secondary) }
    }

    pub fn single(primary: crate::ProviderId) -> Self
    {   Route { primary, secondary: None }
    }
}

/// Per-operation capability table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig
{   pub questions: Route
  , pub summary: Route
  , pub evaluation: Route
  , pub topics: Route
  , pub image: Route
}

impl RoutingConfig
{   pub fn route(&self, kind: crate::OperationKind) -> Route
    {   match kind
        {   crate::OperationKind::Questions => self.questions
          , crate::OperationKind::Summary => self.summary
          , crate::OperationKind::Evaluation => self.evaluation
          , crate::OperationKind::Topics => self.topics
          , crate::OperationKind::Image => self.image
        }
    }

    /// Every provider any route may call
    pub fn referenced(&self) -> Vec<crate::ProviderId>
    {   let mut ids = vec![];
        for route in [
          self.questions
        , self.summary
        , self.evaluation
        , self.topics
        , self.image
        ]
        {   for id in std::iter::once(route.primary).chain(route.secondary)
            {   if !ids.contains(&id)
                {   ids.push(id);
                }
            }
        }
        ids
    }
}

impl Default for RoutingConfig
{   fn default() -> Self
    {   use crate::ProviderId::{Gemini, OpenAi};
        RoutingConfig
        {   questions: Route::with_fallback(Gemini, OpenAi)
          , summary: Route::with_fallback(Gemini, OpenAi)
          , evaluation: Route::with_fallback(Gemini, OpenAi)
          , topics: Route::single(OpenAi)
          , image: Route::single(OpenAi)
        }
    }
}

/// Supabase Storage bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig
{   pub url: String
  , #[serde(default, skip_serializing)]
    pub api_key: String
  , pub bucket: String
}

/// EduGen configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EduGenConfig
{   /// Provider configurations
    pub providers: Vec<ProviderConfig>
  , /// Which providers each operation uses
    #[serde(default)]
    pub routing: RoutingConfig
  , /// Material bucket, if materials are enabled
    pub storage: Option<StorageConfig>
  , /// Default request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64
}

fn default_timeout_secs() -> u64
{   DEFAULT_TIMEOUT_SECS
}

impl Default for EduGenConfig
{   fn default() -> Self
    {   EduGenConfig
        {   providers: vec![
              ProviderConfig::gemini()
            , ProviderConfig::openai()
            ]
          , routing: RoutingConfig::default()
          , storage: None
          , timeout_secs: DEFAULT_TIMEOUT_SECS
        }
    }
}

impl EduGenConfig
{   /// Build from the process environment, falling back to defaults
    pub fn from_env() -> Result<Self, crate::error::Error>
    {   debug!("Loading EduGenConfig from environment");
        let mut gemini = ProviderConfig::gemini();
        gemini.api_key = env_opt("GEMINI_API_KEY");
        gemini.api_base = env_opt("GEMINI_API_BASE");
        if let Some(model) = env_opt("GEMINI_MODEL")
        {   gemini.model = model;
        }
        if let Some(model) = env_opt("GEMINI_IMAGE_MODEL")
        {   gemini.image_model = model;
        }

        let mut openai = ProviderConfig::openai();
        openai.api_key = env_opt("OPENAI_API_KEY");
        openai.api_base = env_opt("OPENAI_API_BASE");
        if let Some(model) = env_opt("OPENAI_MODEL")
        {   openai.model = model;
        }
        if let Some(model) = env_opt("OPENAI_IMAGE_MODEL")
        {   openai.image_model = model;
        }

        let storage = match (
          env_opt("SUPABASE_URL")
        , env_opt("SUPABASE_API_KEY")
        , env_opt("SUPABASE_BUCKET")
        )
        {   (Some(url), Some(api_key), Some(bucket)) => {
              Some(StorageConfig { url, api_key, bucket })
            }
          , (None, None, None) => None
          , _ => {
              warn!("Incomplete SUPABASE_* settings, storage disabled");
              None
            }
        };

        let timeout_secs = match env_opt("EDUGEN_TIMEOUT_SECS")
        {   Some(raw) => raw.parse::<u64>().map_err(|_| {
              crate::error::Error::InvalidConfiguration(
                format!("EDUGEN_TIMEOUT_SECS is not a number: {}", raw)
              )
            })?
          , None => DEFAULT_TIMEOUT_SECS
        };

        let config = EduGenConfig
        {   providers: vec![gemini, openai]
          , routing: RoutingConfig::default()
          , storage
          , timeout_secs
        };
        config.validate()?;
        Ok(config)
    }

    /// Read the same structure from a JSON file
    pub fn from_json_file(
      path: impl AsRef<std::path::Path>
    ) -> Result<Self, crate::error::Error>
    {   let raw = std::fs::read_to_string(path.as_ref())?;
        let config: EduGenConfig = serde_json::from_str(&raw)
          .map_err(|e| {
            crate::error::Error::InvalidConfiguration(e.to_string())
          })?;
        config.validate()?;
        Ok(config)
    }

    pub fn provider(
      &self
    , id: crate::ProviderId
    ) -> Option<&ProviderConfig>
    {   self.providers.iter().find(|p| p.id == id)
    }

    /// Every routed provider must be configured
    pub fn validate(&self) -> Result<(), crate::error::Error>
    {   for id in self.routing.referenced()
        {   if self.provider(id).is_none()
            {   return Err(crate::error::Error::InvalidConfiguration(
                  format!("route references unconfigured provider: {}", id)
                ));
            }
        }
        if self.timeout_secs == 0
        {   return Err(crate::error::Error::InvalidConfiguration(
              "timeout_secs must be positive".to_string()
            ));
        }
        Ok(())
    }
}

fn env_opt(name: &str) -> Option<String>
{   std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
