pub mod error;
pub mod config;
pub mod request;
pub mod prompt;
pub mod normalize;
pub mod providers;
pub mod failover;
pub mod material;
pub mod storage;
pub mod client;
use serde::{Deserialize, Serialize};

pub use client::EduGenBackend;
pub use error::{Error, OrchestrationError, ProviderError, ProviderErrorKind};
pub use failover::{FallbackOrchestrator, Orchestrated};
pub use request::GenerationRequest;

/*

edugen: the generation backend of an educational LMS.

Every content request (quiz, summary, answer evaluation, course plan,
image) goes to a primary generative provider and, when the route allows
it, falls back once to a secondary provider. Both replies are normalised
into one contract so the front end never cares who answered.

edugen/
├── src/
│   ├── lib.rs          # Shared vocabulary and backend channel types
│   ├── error.rs        # Crate errors and provider attempt errors
│   ├── config.rs       # Providers, per-operation routes, storage
│   ├── request.rs      # Requests, validation, boundary responses
│   ├── prompt.rs       # Instruction rendering
│   ├── normalize.rs    # Fence stripping, decoding, classification
│   ├── providers/      # ProviderClient + Gemini / OpenAI
│   ├── failover.rs     # Primary -> secondary orchestration
│   ├── material.rs     # pdf / docx / txt text extraction
│   ├── storage.rs      # Supabase Storage gateway
│   ├── client.rs       # Backend task owning everything above
│   └── bin/edugen.rs   # stdin -> JSON response front end
└── tests/

*/

/// EDUGEN API INTERFACE:

// ===== Generate =====

pub type GenerateReply
  = Result<crate::failover::Orchestrated, crate::error::GenerateError>;
pub type GenerateReplySender
  = tokio::sync::mpsc::UnboundedSender<GenerateReply>;

pub struct GenerateArgs
{   pub request: crate::request::GenerationRequest
  , pub reply: GenerateReplySender
}

// ===== ExtractText =====

pub type ExtractTextReply = Result<String, crate::error::Error>;
pub type ExtractTextReplySender
  = tokio::sync::mpsc::UnboundedSender<ExtractTextReply>;

pub struct ExtractTextArgs
{   pub bytes: Vec<u8>
  , pub extension: String
  , pub reply: ExtractTextReplySender
}

// ===== UploadMaterial =====

pub type UploadMaterialReply
  = Result<crate::storage::StoredMaterial, crate::error::Error>;
pub type UploadMaterialReplySender
  = tokio::sync::mpsc::UnboundedSender<UploadMaterialReply>;

pub struct UploadMaterialArgs
{   pub bytes: Vec<u8>
  , pub file_name: String
  , pub path: String
  , pub reply: UploadMaterialReplySender
}

// ===== ListMaterials =====

pub type ListMaterialsReply
  = Result<Vec<crate::storage::MaterialEntry>, crate::error::Error>;
pub type ListMaterialsReplySender
  = tokio::sync::mpsc::UnboundedSender<ListMaterialsReply>;

pub struct ListMaterialsArgs
{   pub prefix: String
  , pub with_content: bool
  , pub reply: ListMaterialsReplySender
}

// ===== DeleteMaterial =====

pub type DeleteMaterialReply = Result<(), crate::error::Error>;
pub type DeleteMaterialReplySender
  = tokio::sync::mpsc::UnboundedSender<DeleteMaterialReply>;

pub struct DeleteMaterialArgs
{   pub name: String
  , pub reply: DeleteMaterialReplySender
}

// ===== KillProcess =====

pub type KillProcessReply = Result<(), crate::error::Error>;
pub type KillProcessReplySender
  = tokio::sync::mpsc::UnboundedSender<KillProcessReply>;

pub struct KillProcessArgs
{   pub reply: KillProcessReplySender
}

// ===== EduGenHand (sender side) =====

pub struct EduGenHand
{   pub generate_tx
      : tokio::sync::mpsc::UnboundedSender<GenerateArgs>
  , pub extract_text_tx
      : tokio::sync::mpsc::UnboundedSender<ExtractTextArgs>
  , pub upload_material_tx
      : tokio::sync::mpsc::UnboundedSender<UploadMaterialArgs>
  , pub list_materials_tx
      : tokio::sync::mpsc::UnboundedSender<ListMaterialsArgs>
  , pub delete_material_tx
      : tokio::sync::mpsc::UnboundedSender<DeleteMaterialArgs>
  , pub kill_process_tx
      : tokio::sync::mpsc::UnboundedSender<KillProcessArgs>
}

// ===== EduGenFoot (receiver side) =====

pub struct EduGenFoot
{   pub generate_rx
      : tokio::sync::mpsc::UnboundedReceiver<GenerateArgs>
  , pub extract_text_rx
      : tokio::sync::mpsc::UnboundedReceiver<ExtractTextArgs>
  , pub upload_material_rx
      : tokio::sync::mpsc::UnboundedReceiver<UploadMaterialArgs>
  , pub list_materials_rx
      : tokio::sync::mpsc::UnboundedReceiver<ListMaterialsArgs>
  , pub delete_material_rx
      : tokio::sync::mpsc::UnboundedReceiver<DeleteMaterialArgs>
  , pub kill_process_rx
      : tokio::sync::mpsc::UnboundedReceiver<KillProcessArgs>
}

/// EDUGEN STRUCTURES:

/// Backing generative services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId
{   /// Google Gemini (generateContent, Imagen predict)
    Gemini
  , /// OpenAI (chat completions, images)
    OpenAi
}

impl std::fmt::Display for ProviderId
{   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {   match self
        {   ProviderId::Gemini => write!(f, "gemini")
          , ProviderId::OpenAi => write!(f, "openai")
        }
    }
}

/// Position a provider held in the route that answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole
{   Primary
  , Secondary
}

impl ProviderRole
{   pub fn as_str(&self) -> &'static str
    {   match self
        {   ProviderRole::Primary => "primary"
          , ProviderRole::Secondary => "secondary"
        }
    }
}

/// The five generation operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind
{   Questions
  , Summary
  , Evaluation
  , Topics
  , Image
}

impl OperationKind
{   /// Text substituted when a provider reply has no completion
    pub fn empty_shape(&self) -> &'static str
    {   match self
        {   OperationKind::Questions => "[]"
          , _ => "{}"
        }
    }
}
