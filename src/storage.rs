//! Course material bucket on Supabase Storage

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use log::{debug, trace, error};

use crate::error::Error;

const LIST_LIMIT: u32 = 100;

/// Where an uploaded material ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMaterial
{   pub object_path: String
  , pub public_url: String
}

/// One listed material, optionally with its text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialEntry
{   pub name: String
  , pub path: String
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>
}

#[derive(Debug, Clone, Serialize)]
struct ListRequest<'a>
{   prefix: &'a str
  , limit: u32
  , offset: u32
}

#[derive(Debug, Clone, Deserialize)]
struct ListedObject
{   name: String
}

#[derive(Debug, Clone, Serialize)]
struct DeleteRequest<'a>
{   prefixes: Vec<&'a str>
}

/// Bucket operations the backend needs
#[async_trait]
pub trait ObjectStorageGateway: Send + Sync
{   /// Store bytes under `logical_path/file_name`, returning the object path
    async fn upload(
      &self
    , bytes: Vec<u8>
    , file_name: &str
    , logical_path: &str
    ) -> Result<String, Error>;

    fn public_url(&self, object_path: &str) -> String;

    /// `.txt` objects under `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<MaterialEntry>, Error>;

    async fn download(&self, object_path: &str) -> Result<Vec<u8>, Error>;

    async fn delete(&self, name: &str) -> Result<(), Error>;
}

/// Supabase Storage REST client
pub struct SupabaseStorage
{   url: String
  , api_key: String
  , bucket: String
  , http_client: reqwest::Client
}

impl SupabaseStorage
{   pub fn new(
      config: &crate::config::StorageConfig
    , http_client: reqwest::Client
    ) -> Self
    {   debug!("Creating SupabaseStorage for bucket: {}", config.bucket);
        SupabaseStorage
        {   url: config.url.trim_end_matches('/').to_string()
          , api_key: config.api_key.clone()
          , bucket: config.bucket.clone()
          , http_client
        }
    }

    fn object_url(&self, object_path: &str) -> String
    {   format!(
          "{}/storage/v1/object/{}/{}",
          self.url,
          self.bucket,
          object_path.trim_start_matches('/')
        )
    }

    fn authorized(
      &self
    , builder: reqwest::RequestBuilder
    ) -> reqwest::RequestBuilder
    {   builder
          .header("apikey", &self.api_key)
          .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Non-success responses become `Error::Storage` with the raw body
    async fn check(
      response: reqwest::Response
    ) -> Result<reqwest::Response, Error>
    {   let status = response.status();
        trace!("Storage response status: {}", status);
        if status.is_success()
        {   return Ok(response);
        }
        let body = response.text().await
          .unwrap_or_else(|_| "Unknown error".to_string());
        error!("Storage error {}: {}", status, body);
        Err(Error::Storage(body))
    }
}

/// `path/file_name`, or just `file_name` for an empty path
pub fn object_path(logical_path: &str, file_name: &str) -> String
{   let folder = logical_path.trim_matches('/');
    if folder.is_empty()
    {   file_name.to_string()
    } else
    {   format!("{}/{}", folder, file_name)
    }
}

fn is_txt(name: &str) -> bool
{   name.to_lowercase().ends_with(".txt")
}

#[async_trait]
impl ObjectStorageGateway for SupabaseStorage
{   async fn upload(
      &self
    , bytes: Vec<u8>
    , file_name: &str
    , logical_path: &str
    ) -> Result<String, Error>
    {   if !is_txt(file_name)
        {   return Err(Error::UnsupportedInput(
              "only .txt files can be stored".to_string()
            ));
        }
        if bytes.len() > crate::material::MAX_MATERIAL_BYTES
        {   return Err(Error::UnsupportedInput(
              format!("file exceeds {} bytes", crate::material::MAX_MATERIAL_BYTES)
            ));
        }
        let path = object_path(logical_path, file_name);
        debug!("Uploading material to {}", path);

        let response = self
          .authorized(self.http_client.post(self.object_url(&path)))
          .header("Content-Type", "text/plain")
          .body(bytes)
          .send()
          .await
          .map_err(|e| Error::Storage(e.to_string()))?;
        Self::check(response).await?;
        Ok(path)
    }

    fn public_url(&self, object_path: &str) -> String
    {   format!(
          "{}/storage/v1/object/public/{}/{}",
          self.url,
          self.bucket,
          object_path.trim_start_matches('/')
        )
    }

    async fn list(&self, prefix: &str) -> Result<Vec<MaterialEntry>, Error>
    {   let prefix = prefix.trim_matches('/');
        debug!("Listing materials under '{}'", prefix);
        let response = self
          .authorized(self.http_client.post(format!(
            "{}/storage/v1/object/list/{}",
            self.url, self.bucket
          )))
          .json(&ListRequest { prefix, limit: LIST_LIMIT, offset: 0 })
          .send()
          .await
          .map_err(|e| Error::Storage(e.to_string()))?;
        let objects: Vec<ListedObject> = Self::check(response).await?
          .json()
          .await
          .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(objects.into_iter()
          .filter(|o| is_txt(&o.name))
          .map(|o| MaterialEntry
          {   path: object_path(prefix, &o.name)
            , name: o.name
            , content: None
          })
          .collect())
    }

    async fn download(&self, object_path: &str) -> Result<Vec<u8>, Error>
    {   debug!("Downloading material {}", object_path);
        let response = self
          .authorized(self.http_client.get(self.object_url(object_path)))
          .send()
          .await
          .map_err(|e| Error::Storage(e.to_string()))?;
        let bytes = Self::check(response).await?
          .bytes()
          .await
          .map_err(|e| Error::Storage(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, name: &str) -> Result<(), Error>
    {   let name = name.trim_start_matches('/');
        if name.is_empty()
        {   return Err(Error::InvalidRequest("name is required".to_string()));
        }
        debug!("Deleting material {}", name);
        let response = self
          .authorized(self.http_client.delete(format!(
            "{}/storage/v1/object/{}",
            self.url, self.bucket
          )))
          .json(&DeleteRequest { prefixes: vec![name] })
          .send()
          .await
          .map_err(|e| Error::Storage(e.to_string()))?;
        Self::check(response).await?;
        Ok(())
    }
}

/// List and attach each object's text
pub async fn list_with_content(
  gateway: &dyn ObjectStorageGateway
, prefix: &str
) -> Result<Vec<MaterialEntry>, Error>
{   let mut entries = gateway.list(prefix).await?;
    for entry in entries.iter_mut()
    {   let bytes = gateway.download(&entry.path).await?;
        entry.content = Some(
          crate::material::MaterialTextExtractor::new().extract(&bytes, "txt")?
        );
    }
    Ok(entries)
}
