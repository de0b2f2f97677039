use std::sync::Arc;
use tokio::sync::mpsc;
use log::{debug, error, info};
use crate::EduGenFoot;
use crate::storage::ObjectStorageGateway;

/// Everything a command handler may need. Read-only once built, so
/// requests share nothing mutable.
#[derive(Clone)]
pub struct EduGenBackendState
{   pub orchestrator: Arc<crate::failover::FallbackOrchestrator>
  , pub extractor: crate::material::MaterialTextExtractor
  , pub storage: Option<Arc<dyn ObjectStorageGateway>>
}

impl EduGenBackendState
{   /// Create a backend state from configuration
    pub fn from_config(
      config: &crate::config::EduGenConfig
    ) -> Result<Self, crate::error::Error>
    {   debug!("Initializing EduGenBackendState");
        let orchestrator
          = crate::failover::FallbackOrchestrator::from_config(config)?;
        let storage = match &config.storage
        {   Some(storage_config) => {
              let http = crate::providers::http_client(config.timeout_secs)?;
              let gateway: Arc<dyn ObjectStorageGateway> = Arc::new(
                crate::storage::SupabaseStorage::new(storage_config, http)
              );
              Some(gateway)
            }
          , None => None
        };
        Ok(EduGenBackendState
        {   orchestrator: Arc::new(orchestrator)
          , extractor: crate::material::MaterialTextExtractor::new()
          , storage
        })
    }

    fn storage(&self) -> Result<Arc<dyn ObjectStorageGateway>, crate::error::Error>
    {   self.storage.clone().ok_or_else(|| {
          crate::error::Error::InvalidConfiguration(
            "material storage is not configured".to_string()
          )
        })
    }

    /// Validate, then orchestrate
    pub async fn generate(
      &self
    , request: crate::request::GenerationRequest
    ) -> crate::GenerateReply
    {   request.validate()?;
        Ok(self.orchestrator.run(&request).await?)
    }

    pub async fn upload_material(
      &self
    , bytes: Vec<u8>
    , file_name: &str
    , path: &str
    ) -> crate::UploadMaterialReply
    {   let storage = self.storage()?;
        let object_path = storage.upload(bytes, file_name, path).await?;
        Ok(crate::storage::StoredMaterial
        {   public_url: storage.public_url(&object_path)
          , object_path
        })
    }

    pub async fn list_materials(
      &self
    , prefix: &str
    , with_content: bool
    ) -> crate::ListMaterialsReply
    {   let storage = self.storage()?;
        if with_content
        {   crate::storage::list_with_content(storage.as_ref(), prefix).await
        } else
        {   storage.list(prefix).await
        }
    }

    pub async fn delete_material(
      &self
    , name: &str
    ) -> crate::DeleteMaterialReply
    {   self.storage()?.delete(name).await
    }
}

/// Public API for EduGen backend - owns the task
pub struct EduGenBackend
{   hand: crate::EduGenHand
  , _task_handle: tokio::task::JoinHandle<()>
}

fn disconnected() -> crate::error::Error
{   error!("Backend channel closed");
    crate::error::Error::Backend("Backend disconnected".to_string())
}

impl EduGenBackend
{   /// Create and spawn a new EduGen backend
    /// Returns immediately - spawns background task
    pub fn new(
      config: &crate::config::EduGenConfig
    ) -> Result<Self, crate::error::Error>
    {   Ok(EduGenBackend::with_state(EduGenBackendState::from_config(config)?))
    }

    /// Spawn around an already built state (custom providers, tests)
    pub fn with_state(state: EduGenBackendState) -> Self
    {   debug!("Creating EduGenBackend with task ownership");

        let (generate_tx, generate_rx)
          = mpsc::unbounded_channel();
        let (extract_text_tx, extract_text_rx)
          = mpsc::unbounded_channel();
        let (upload_material_tx, upload_material_rx)
          = mpsc::unbounded_channel();
        let (list_materials_tx, list_materials_rx)
          = mpsc::unbounded_channel();
        let (delete_material_tx, delete_material_rx)
          = mpsc::unbounded_channel();
        let (kill_process_tx, kill_process_rx)
          = mpsc::unbounded_channel();

        let hand = crate::EduGenHand
        {   generate_tx
          , extract_text_tx
          , upload_material_tx
          , list_materials_tx
          , delete_material_tx
          , kill_process_tx
        };

        let foot = crate::EduGenFoot
        {   generate_rx
          , extract_text_rx
          , upload_material_rx
          , list_materials_rx
          , delete_material_rx
          , kill_process_rx
        };

        let _task_handle = tokio::spawn(async move {
          run_backend_loop(foot, state).await
        });

        EduGenBackend
        {   hand
          , _task_handle
        }
    }

    /// Queue a generation request - returns almost immediately
    pub async fn generate(
      &self
    , request: crate::request::GenerationRequest
    ) -> Result<
        mpsc::UnboundedReceiver<crate::GenerateReply>,
        crate::error::Error
      >
    {   debug!("generate queuing {:?}", request.kind());
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        self.hand.generate_tx
          .send(crate::GenerateArgs { request, reply: reply_tx })
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Queue a text extraction - returns almost immediately
    pub async fn extract_text(
      &self
    , bytes: Vec<u8>
    , extension: String
    ) -> Result<
        mpsc::UnboundedReceiver<crate::ExtractTextReply>,
        crate::error::Error
      >
    {   debug!("extract_text queuing {} bytes of .{}", bytes.len(), extension);
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        self.hand.extract_text_tx
          .send(crate::ExtractTextArgs { bytes, extension, reply: reply_tx })
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Queue a material upload - returns almost immediately
    pub async fn upload_material(
      &self
    , bytes: Vec<u8>
    , file_name: String
    , path: String
    ) -> Result<
        mpsc::UnboundedReceiver<crate::UploadMaterialReply>,
        crate::error::Error
      >
    {   debug!("upload_material queuing {}", file_name);
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        self.hand.upload_material_tx
          .send(crate::UploadMaterialArgs
          {   bytes
            , file_name
            , path
            , reply: reply_tx
          })
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Queue a material listing - returns almost immediately
    pub async fn list_materials(
      &self
    , prefix: String
    , with_content: bool
    ) -> Result<
        mpsc::UnboundedReceiver<crate::ListMaterialsReply>,
        crate::error::Error
      >
    {   debug!("list_materials queuing '{}'", prefix);
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        self.hand.list_materials_tx
          .send(crate::ListMaterialsArgs
          {   prefix
            , with_content
            , reply: reply_tx
          })
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Queue a material deletion - returns almost immediately
    pub async fn delete_material(
      &self
    , name: String
    ) -> Result<
        mpsc::UnboundedReceiver<crate::DeleteMaterialReply>,
        crate::error::Error
      >
    {   debug!("delete_material queuing {}", name);
        let (reply_tx, reply_rx)
          = mpsc::unbounded_channel();

        self.hand.delete_material_tx
          .send(crate::DeleteMaterialArgs { name, reply: reply_tx })
          .map_err(|_| disconnected())?;

        Ok(reply_rx)
    }

    /// Gracefully shutdown the backend
    pub async fn shutdown(self)
      -> Result<(), crate::error::Error>
    {   debug!("Shutting down EduGenBackend");
        let (reply_tx, mut reply_rx)
          = mpsc::unbounded_channel();

        self.hand.kill_process_tx
          .send(crate::KillProcessArgs { reply: reply_tx })
          .map_err(|_| {
            error!("Backend channel already closed");
            crate::error::Error::Backend(
              "Backend already shutdown".to_string()
            )
          })?;

        // Wait for shutdown confirmation
        if let Some(result) = reply_rx.recv().await
        {   debug!("Backend shutdown confirmed");
            result
        } else
        {   error!("Backend shutdown without confirmation");
            Err(crate::error::Error::Backend(
              "no shutdown confirmation".to_string()
            ))
        }
    }
}

/// Main backend event loop
///
/// tokio::select! is ONLY for fast queueing. Every arm spawns its work
/// and goes straight back to waiting, so one slow provider never holds
/// up another request.
async fn run_backend_loop(
  foot: crate::EduGenFoot
, state: EduGenBackendState
)
{   debug!("Starting EduGenBackend event loop");
    let EduGenFoot
    {   mut generate_rx
      , mut extract_text_rx
      , mut upload_material_rx
      , mut list_materials_rx
      , mut delete_material_rx
      , mut kill_process_rx
    } = foot;

    loop
    { tokio::select!
      { Some(cmd) = generate_rx.recv() => {
          debug!("Received Generate for {:?}", cmd.request.kind());
          let state = state.clone();
          tokio::spawn(async move {
            let result = state.generate(cmd.request).await;
            let _ = cmd.reply.send(result);
          });
        }
      , Some(cmd) = extract_text_rx.recv() => {
          debug!("Received ExtractText");
          let extractor = state.extractor;
          let crate::ExtractTextArgs { bytes, extension, reply } = cmd;
          tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
              extractor.extract(&bytes, &extension)
            })
            .await
            .unwrap_or_else(|e| {
              Err(crate::error::Error::Other(e.to_string()))
            });
            let _ = reply.send(result);
          });
        }
      , Some(cmd) = upload_material_rx.recv() => {
          debug!("Received UploadMaterial");
          let state = state.clone();
          tokio::spawn(async move {
            let result = state
              .upload_material(cmd.bytes, &cmd.file_name, &cmd.path)
              .await;
            let _ = cmd.reply.send(result);
          });
        }
      , Some(cmd) = list_materials_rx.recv() => {
          debug!("Received ListMaterials");
          let state = state.clone();
          tokio::spawn(async move {
            let result = state
              .list_materials(&cmd.prefix, cmd.with_content)
              .await;
            let _ = cmd.reply.send(result);
          });
        }
      , Some(cmd) = delete_material_rx.recv() => {
          debug!("Received DeleteMaterial");
          let state = state.clone();
          tokio::spawn(async move {
            let result = state.delete_material(&cmd.name).await;
            let _ = cmd.reply.send(result);
          });
        }
      , Some(cmd) = kill_process_rx.recv() => {
          debug!("Received KillProcess");
          let _ = cmd.reply.send(Ok(()));
          info!("EduGenBackend shutting down");
          break;
        }
      , else => {
          debug!("All command channels closed");
          break;
        }
      }
    }
}
