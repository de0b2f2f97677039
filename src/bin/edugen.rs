//! Reads one JSON command from stdin and prints the JSON response.
//!
//!   echo '{"operation":"summary","topic":"La célula","paragraphs":3}' | edugen

use std::io::Read;
use std::path::{Path, PathBuf};
use log::{debug, error};
use serde::Deserialize;
use serde_json::json;

use edugen::request::{BoundaryResponse, GenerationRequest};

#[derive(Debug, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
enum MaterialCommand
{   ExtractText
    {   file: PathBuf
    }
  , UploadMaterial
    {   file: PathBuf
      , #[serde(default)]
        path: String
    }
  , ListMaterials
    {   #[serde(default)]
        prefix: String
      , #[serde(default)]
        with_content: bool
    }
  , DeleteMaterial
    {   name: String
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Command
{   Generate(GenerationRequest)
  , Material(MaterialCommand)
}

fn file_name(path: &Path) -> String
{   path.file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default()
}

fn extension(path: &Path) -> String
{   path.extension()
      .map(|e| e.to_string_lossy().into_owned())
      .unwrap_or_default()
}

/// Wait on a reply channel, mapping a dropped sender to an error
async fn recv<T>(
  rx: Result<
    tokio::sync::mpsc::UnboundedReceiver<Result<T, edugen::Error>>,
    edugen::Error
  >
) -> Result<T, edugen::Error>
{   let mut rx = rx?;
    rx.recv().await.unwrap_or_else(|| {
      Err(edugen::Error::Backend("no reply".to_string()))
    })
}

async fn run_material(
  backend: &edugen::EduGenBackend
, command: MaterialCommand
) -> BoundaryResponse
{   let result = match command
    {   MaterialCommand::ExtractText { file } => {
          match tokio::fs::read(&file).await
          {   Ok(bytes) => {
                recv(backend.extract_text(bytes, extension(&file)).await)
                  .await
                  .map(|text| json!({
                    "success": true,
                    "text": text,
                    "filename": file_name(&file),
                  }))
              }
            , Err(e) => Err(edugen::Error::from(e))
          }
        }
      , MaterialCommand::UploadMaterial { file, path } => {
          match tokio::fs::read(&file).await
          {   Ok(bytes) => {
                recv(backend.upload_material(bytes, file_name(&file), path).await)
                  .await
                  .map(|stored| json!({
                    "success": true,
                    "message": "material uploaded",
                    "object_path": stored.object_path,
                    "public_url": stored.public_url,
                  }))
              }
            , Err(e) => Err(edugen::Error::from(e))
          }
        }
      , MaterialCommand::ListMaterials { prefix, with_content } => {
          recv(backend.list_materials(prefix, with_content).await)
            .await
            .map(|files| json!({
              "success": true,
              "files": files,
            }))
        }
      , MaterialCommand::DeleteMaterial { name } => {
          recv(backend.delete_material(name.clone()).await)
            .await
            .map(|()| json!({
              "success": true,
              "message": format!("{} deleted", name),
            }))
        }
    };
    match result
    {   Ok(body) => BoundaryResponse::ok(body)
      , Err(e) => BoundaryResponse::from_error(&e)
    }
}

async fn run_generate(
  backend: &edugen::EduGenBackend
, request: GenerationRequest
) -> BoundaryResponse
{   let reply = match backend.generate(request.clone()).await
    {   Ok(mut rx) => rx.recv().await.unwrap_or_else(|| {
          Err(edugen::Error::Backend("no reply".to_string()).into())
        })
      , Err(e) => Err(e.into())
    };
    edugen::request::respond(&request, &reply)
}

#[tokio::main]
async fn main()
{   dotenvy::dotenv().ok();
    env_logger::init();

    let mut input = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut input)
    {   error!("Could not read stdin: {}", e);
        std::process::exit(2);
    }

    let response = match serde_json::from_str::<Command>(&input)
    {   Err(e) => {
          debug!("Rejected command: {}", e);
          BoundaryResponse::from_error(
            &edugen::Error::InvalidRequest(e.to_string())
          )
        }
      , Ok(command) => {
          let config = match edugen::config::EduGenConfig::from_env()
          {   Ok(config) => config
            , Err(e) => {
                error!("{}", e);
                std::process::exit(2);
              }
          };
          let backend = match edugen::EduGenBackend::new(&config)
          {   Ok(backend) => backend
            , Err(e) => {
                error!("{}", e);
                std::process::exit(2);
              }
          };
          let response = match command
          {   Command::Generate(request) => {
                run_generate(&backend, request).await
              }
            , Command::Material(command) => {
                run_material(&backend, command).await
              }
          };
          let _ = backend.shutdown().await;
          response
        }
    };

    println!("{}", response.body);
    if response.status != edugen::request::ResponseStatus::Ok
    {   std::process::exit(1);
    }
}
