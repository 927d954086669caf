use std::path::{Path, PathBuf};

use analysis_core::AnalysisError;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::model::TrainedModel;

/// Where a trained model is kept between process restarts.
#[async_trait]
pub trait ModelRepository: Send + Sync {
    async fn load(&self) -> Result<Option<TrainedModel>, AnalysisError>;

    /// Replaces the stored model. A reader never observes a partial write.
    async fn save(&self, model: &TrainedModel) -> Result<(), AnalysisError>;
}

/// JSON file on local disk, replaced via write-to-temp then rename.
#[derive(Debug, Clone)]
pub struct FileModelRepository {
    path: PathBuf,
}

impl FileModelRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn io_error(path: &Path, err: std::io::Error) -> AnalysisError {
    AnalysisError::Store(format!("{}: {err}", path.display()))
}

#[async_trait]
impl ModelRepository for FileModelRepository {
    async fn load(&self) -> Result<Option<TrainedModel>, AnalysisError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&self.path, e)),
        };
        let model = serde_json::from_slice(&bytes)
            .map_err(|e| AnalysisError::Model(format!("corrupt model file: {e}")))?;
        Ok(Some(model))
    }

    async fn save(&self, model: &TrainedModel) -> Result<(), AnalysisError> {
        let json = serde_json::to_vec(model).map_err(|e| AnalysisError::Model(e.to_string()))?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| io_error(dir, e))?;
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, &json)
            .await
            .map_err(|e| io_error(&temp, e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;
        debug!(path = %self.path.display(), bytes = json.len(), "Model saved");
        Ok(())
    }
}

/// Keeps the model in process memory only.
#[derive(Debug, Default)]
pub struct InMemoryModelRepository {
    model: Mutex<Option<TrainedModel>>,
}

#[async_trait]
impl ModelRepository for InMemoryModelRepository {
    async fn load(&self) -> Result<Option<TrainedModel>, AnalysisError> {
        Ok(self.model.lock().await.clone())
    }

    async fn save(&self, model: &TrainedModel) -> Result<(), AnalysisError> {
        *self.model.lock().await = Some(model.clone());
        Ok(())
    }
}
