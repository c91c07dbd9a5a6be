// Repository trait for tabular dataset access
use crate::domain::dataset::Dataset;
use async_trait::async_trait;

#[async_trait]
pub trait DatasetRepository: Send + Sync {
    /// Fetch and parse the HXL dataset published at `url`
    async fn fetch_dataset(&self, url: &str) -> anyhow::Result<Dataset>;
}
