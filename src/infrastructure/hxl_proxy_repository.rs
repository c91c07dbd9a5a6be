// HXL proxy repository - Datasets fetched as JSON through the HXL proxy
use crate::application::dataset_repository::DatasetRepository;
use crate::domain::dataset::Dataset;
use crate::infrastructure::config::prepare_url;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct HxlProxyRepository {
    client: reqwest::Client,
    url_template: String,
}

impl HxlProxyRepository {
    pub fn new(client: reqwest::Client, url_template: String) -> Self {
        Self {
            client,
            url_template,
        }
    }

    fn build_url(&self, dataset_url: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("url", urlencoding::encode(dataset_url).into_owned());
        prepare_url(&self.url_template, &vars)
    }
}

#[async_trait]
impl DatasetRepository for HxlProxyRepository {
    async fn fetch_dataset(&self, url: &str) -> Result<Dataset> {
        let proxy_url = self.build_url(url);
        tracing::debug!("Fetching dataset via {}", proxy_url);

        let response = self
            .client
            .get(&proxy_url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to the HXL proxy")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("HXL proxy request failed with status {}: {}", status, body);
        }

        let sheet = response
            .json::<Vec<Vec<Value>>>()
            .await
            .context("Failed to parse HXL proxy response")?;

        Ok(Dataset::from_sheet(into_sheet(sheet))?)
    }
}

/// Cells arrive as JSON scalars; numbers keep their JSON spelling and
/// nulls become empty strings.
fn into_sheet(rows: Vec<Vec<Value>>) -> Vec<Vec<String>> {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect()
}
