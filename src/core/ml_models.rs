// ML model file manager
// Handles model downloading, caching, and path resolution

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model cache I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Model source not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("Model download failed: {0}")]
    Download(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ModelError + '_ {
    move |source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Model source configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Local file path
    LocalFile(PathBuf),
    /// Direct URL
    Url(String),
}

/// ML model metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// File name inside the cache directory
    pub name: String,
    pub source: ModelSource,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>, source: ModelSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

/// Model manager for caching and loading ML models
pub struct ModelManager {
    cache_dir: PathBuf,
    client: reqwest::Client,
}

impl ModelManager {
    /// Create a new model manager with cache directory
    pub fn new(cache_dir: PathBuf) -> ModelResult<Self> {
        fs::create_dir_all(&cache_dir).map_err(io_error(&cache_dir))?;
        Ok(Self {
            cache_dir,
            client: reqwest::Client::new(),
        })
    }

    /// Use a preconfigured HTTP client for downloads
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn is_cached(&self, model: &ModelInfo) -> bool {
        self.model_path(&model.name).is_file()
    }

    /// Get the local path for a model
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.cache_dir.join(model_name)
    }

    /// Make sure the model file is in the cache, copying or downloading it
    /// when missing
    pub async fn ensure_model(&self, model: &ModelInfo) -> ModelResult<PathBuf> {
        let model_path = self.model_path(&model.name);

        if self.is_cached(model) {
            tracing::debug!("Model {} already cached at {}", model.name, model_path.display());
            return Ok(model_path);
        }

        tracing::info!("Fetching model {} from {:?}", model.name, model.source);

        match &model.source {
            ModelSource::LocalFile(path) => {
                if !path.is_file() {
                    return Err(ModelError::SourceMissing(path.clone()));
                }
                fs::copy(path, &model_path).map_err(io_error(&model_path))?;
            }
            ModelSource::Url(url) => {
                self.download(url, &model_path).await?;
            }
        }

        Ok(model_path)
    }

    /// Stream a download to a `.part` file and move it into place when complete
    async fn download(&self, url: &str, target: &Path) -> ModelResult<()> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ModelError::Download(e.to_string()))?;

        let partial = target.with_extension("part");
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(io_error(&partial))?;

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ModelError::Download(e.to_string()))?
        {
            file.write_all(&chunk).await.map_err(io_error(&partial))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error(&partial))?;
        drop(file);

        tokio::fs::rename(&partial, target)
            .await
            .map_err(io_error(target))?;

        tracing::info!("Downloaded {} bytes to {}", written, target.display());
        Ok(())
    }

    /// Clear the model cache
    pub fn clear_cache(&self) -> ModelResult<()> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir).map_err(io_error(&self.cache_dir))?;
            fs::create_dir_all(&self.cache_dir).map_err(io_error(&self.cache_dir))?;
        }
        Ok(())
    }

    /// Get cache size in bytes
    pub fn cache_size(&self) -> ModelResult<u64> {
        let mut total_size = 0u64;

        if self.cache_dir.exists() {
            let entries = fs::read_dir(&self.cache_dir).map_err(io_error(&self.cache_dir))?;
            for entry in entries {
                let metadata = entry
                    .and_then(|e| e.metadata())
                    .map_err(io_error(&self.cache_dir))?;
                if metadata.is_file() {
                    total_size += metadata.len();
                }
            }
        }

        Ok(total_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join("lookbook_test_models").join(name)
    }

    #[test]
    fn test_model_manager_creation() {
        let dir = temp_dir("creation");
        let manager = ModelManager::new(dir.clone()).unwrap();
        assert_eq!(manager.cache_dir(), dir.as_path());
        assert_eq!(manager.model_path("pose.onnx"), dir.join("pose.onnx"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_ensure_local_model() {
        let dir = temp_dir("local");
        let _ = fs::remove_dir_all(&dir);
        let source = temp_dir("local_source.onnx");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"onnx-bytes").unwrap();

        let manager = ModelManager::new(dir.clone()).unwrap();
        let info = ModelInfo::new("pose.onnx", ModelSource::LocalFile(source.clone()));
        assert!(!manager.is_cached(&info));

        let path = manager.ensure_model(&info).await.unwrap();
        assert!(manager.is_cached(&info));
        assert_eq!(fs::read(&path).unwrap(), b"onnx-bytes");
        assert_eq!(manager.cache_size().unwrap(), 10);

        manager.clear_cache().unwrap();
        assert!(!manager.is_cached(&info));
        assert_eq!(manager.cache_size().unwrap(), 0);

        let _ = fs::remove_dir_all(&dir);
        let _ = fs::remove_file(&source);
    }

    #[tokio::test]
    async fn test_missing_local_source() {
        let dir = temp_dir("missing_source");
        let manager = ModelManager::new(dir.clone()).unwrap();
        let info = ModelInfo::new("x.onnx", ModelSource::LocalFile(dir.join("nope.onnx")));
        assert!(matches!(
            manager.ensure_model(&info).await,
            Err(ModelError::SourceMissing(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_download_model() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let body = b"model-weights";
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
        });

        let dir = temp_dir("download");
        let _ = fs::remove_dir_all(&dir);
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let manager = ModelManager::new(dir.clone()).unwrap().with_client(client);
        let info = ModelInfo::new("pose.onnx", ModelSource::Url(format!("http://{}/pose.onnx", addr)));

        let path = manager.ensure_model(&info).await.unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"model-weights");
        assert!(!path.with_extension("part").exists());

        // Second call is served from the cache without touching the network
        assert_eq!(manager.ensure_model(&info).await.unwrap(), path);

        let _ = fs::remove_dir_all(&dir);
    }
}
