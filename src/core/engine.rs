use crate::core::bundle::build_zip;
use crate::core::{Deliverable, Pipeline, Storage};
use crate::utils::error::{HubError, Result};
use std::time::Instant;

pub struct RunReport<P: Pipeline> {
    pub research: P::Research,
    pub plan: P::Plan,
    pub output: P::Output,
    /// Storage-relative path of the written ZIP bundle.
    pub bundle_path: String,
}

/// Runs one feature's research -> plan -> produce -> deliver sequence.
pub struct HubEngine<P: Pipeline, S: Storage> {
    pipeline: P,
    storage: S,
}

impl<P: Pipeline, S: Storage> HubEngine<P, S> {
    pub fn new(pipeline: P, storage: S) -> Self {
        Self { pipeline, storage }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<RunReport<P>> {
        let name = self.pipeline.name().to_string();
        let started = Instant::now();
        tracing::info!("🚀 Starting {} pipeline", name);

        tracing::info!("🔍 Step 1/4: research");
        let research = self.pipeline.research().await?;

        tracing::info!("📋 Step 2/4: plan");
        let plan = self.pipeline.plan(&research).await?;

        tracing::info!("🏗️ Step 3/4: produce");
        let output = self.pipeline.produce(&research, &plan).await?;

        tracing::info!("📦 Step 4/4: deliver");
        let bundle_path = self.deliver(&output).await?;

        tracing::info!(
            "✅ {} pipeline finished in {:?}",
            name,
            started.elapsed()
        );

        Ok(RunReport {
            research,
            plan,
            output,
            bundle_path,
        })
    }

    /// Write the output's ZIP bundle through storage.
    pub async fn deliver(&self, output: &P::Output) -> Result<String> {
        let entries = output.entries();
        if entries.is_empty() {
            return Err(HubError::ProcessingError {
                message: format!("{} produced nothing to deliver", self.pipeline.name()),
            });
        }

        let zip_data = build_zip(&entries)?;
        let bundle_name = output.bundle_name();

        tracing::debug!(
            "Writing {} ({} files, {} bytes) to storage",
            bundle_name,
            entries.len(),
            zip_data.len()
        );
        self.storage.write_file(&bundle_name, &zip_data).await?;

        Ok(bundle_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                HubError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct Notes(Vec<(String, String)>);

    impl Deliverable for Notes {
        fn bundle_name(&self) -> String {
            "notes.zip".to_string()
        }

        fn entries(&self) -> Vec<(String, String)> {
            self.0.clone()
        }
    }

    struct EchoPipeline {
        empty: bool,
    }

    #[async_trait]
    impl Pipeline for EchoPipeline {
        type Research = String;
        type Plan = String;
        type Output = Notes;

        fn name(&self) -> &str {
            "echo"
        }

        async fn research(&self) -> Result<String> {
            Ok("facts".to_string())
        }

        async fn plan(&self, research: &String) -> Result<String> {
            Ok(format!("plan from {}", research))
        }

        async fn produce(&self, _research: &String, plan: &String) -> Result<Notes> {
            if self.empty {
                return Ok(Notes(Vec::new()));
            }
            Ok(Notes(vec![("plan.txt".to_string(), plan.clone())]))
        }
    }

    #[tokio::test]
    async fn test_run_writes_bundle() {
        let storage = MockStorage::default();
        let engine = HubEngine::new(EchoPipeline { empty: false }, storage.clone());

        let report = engine.run().await.unwrap();

        assert_eq!(report.plan, "plan from facts");
        assert_eq!(report.bundle_path, "notes.zip");
        let bytes = storage.read_file("notes.zip").await.unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[tokio::test]
    async fn test_run_fails_without_artifacts() {
        let storage = MockStorage::default();
        let engine = HubEngine::new(EchoPipeline { empty: true }, storage.clone());

        let result = engine.run().await;

        assert!(matches!(result, Err(HubError::ProcessingError { .. })));
        assert!(storage.files.lock().await.is_empty());
    }
}
