use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Result of a successful provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    /// Where the enhanced image was written.
    pub output_path: String,
    /// Free-text description returned by the provider, if any.
    pub analysis: Option<String>,
}

/// An image-generation provider. Implementations read the source image, call
/// the remote API and write the result to disk.
#[async_trait]
pub trait ImageProcessor: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &str;

    async fn process(&self, source_path: &str) -> Result<ProcessedImage, ProcessorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Failed to read or write image: {0}")]
    Io(#[from] std::io::Error),

    #[error("Provider request failed: {0}")]
    Provider(String),

    #[error("Provider returned no image")]
    EmptyResponse,
}

/// Stand-in provider that copies each source unchanged into `output_dir`.
/// Lets the worker run end to end without provider credentials.
pub struct LocalCopyProcessor {
    output_dir: PathBuf,
}

impl LocalCopyProcessor {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn output_path_for(&self, source: &Path) -> Result<PathBuf, ProcessorError> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ProcessorError::Provider(format!("Invalid source path: {}", source.display())))?;
        let file_name = match source.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}_enhanced.{}", stem, ext),
            None => format!("{}_enhanced", stem),
        };
        Ok(self.output_dir.join(file_name))
    }
}

#[async_trait]
impl ImageProcessor for LocalCopyProcessor {
    fn name(&self) -> &str {
        "local-copy"
    }

    async fn process(&self, source_path: &str) -> Result<ProcessedImage, ProcessorError> {
        let output = self.output_path_for(Path::new(source_path))?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let bytes = tokio::fs::copy(source_path, &output).await?;
        if bytes == 0 {
            return Err(ProcessorError::EmptyResponse);
        }

        Ok(ProcessedImage {
            output_path: output.to_string_lossy().into_owned(),
            analysis: None,
        })
    }
}
