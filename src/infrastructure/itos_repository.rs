// ITOS repository - Common operational dataset boundaries from the ArcGIS REST service
use crate::application::boundary_repository::{BoundaryRepository, SubLayer};
use crate::domain::geometry::GeoJsonCollection;
use crate::infrastructure::config::prepare_url;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ItosRepository {
    client: reqwest::Client,
    metadata_template: String,
    geometry_template: String,
}

#[derive(Debug, Deserialize)]
struct MapServerInfo {
    #[serde(default)]
    layers: Vec<SubLayer>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct GeometryResponse {
    #[serde(flatten)]
    collection: GeoJsonCollection,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// ArcGIS reports errors inside a 200 response.
fn check_service_error(error: Option<ServiceError>) -> Result<()> {
    match error {
        Some(error) => anyhow::bail!(
            "Boundary service error {}: {}",
            error.code.unwrap_or_default(),
            error.message.unwrap_or_default()
        ),
        None => Ok(()),
    }
}

impl ItosRepository {
    pub fn new(
        client: reqwest::Client,
        metadata_template: String,
        geometry_template: String,
    ) -> Self {
        Self {
            client,
            metadata_template,
            geometry_template,
        }
    }

    fn metadata_url(&self, country: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("country", country.to_uppercase());
        prepare_url(&self.metadata_template, &vars)
    }

    fn geometry_url(&self, country: &str, layer_id: u32) -> String {
        let mut vars = HashMap::new();
        vars.insert("country", country.to_uppercase());
        vars.insert("layer", layer_id.to_string());
        prepare_url(&self.geometry_template, &vars)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to send request to the boundary service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Boundary service request failed with status {}: {}", status, body);
        }

        response
            .json::<T>()
            .await
            .context("Failed to parse boundary service response")
    }
}

#[async_trait]
impl BoundaryRepository for ItosRepository {
    async fn list_sub_layers(&self, country: &str) -> Result<Vec<SubLayer>> {
        let info: MapServerInfo = self.get_json(&self.metadata_url(country)).await?;
        check_service_error(info.error)?;

        tracing::debug!("{} publishes {} boundary layers", country, info.layers.len());
        Ok(info.layers)
    }

    async fn fetch_geometry(&self, country: &str, layer_id: u32) -> Result<GeoJsonCollection> {
        let url = self.geometry_url(country, layer_id);
        let response: GeometryResponse = self.get_json(&url).await?;
        check_service_error(response.error)
            .with_context(|| format!("No geometry for {} layer {}", country, layer_id))?;
        Ok(response.collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> ItosRepository {
        ItosRepository::new(
            reqwest::Client::new(),
            "https://cod.example/${country}_pcode/MapServer?f=json".to_string(),
            "https://cod.example/${country}_pcode/MapServer/${layer}/query?where=1%3D1&outFields=*&f=geojson"
                .to_string(),
        )
    }

    #[test]
    fn test_urls() {
        assert_eq!(repo().metadata_url("mli"), "https://cod.example/MLI_pcode/MapServer?f=json");
        assert_eq!(
            repo().geometry_url("MLI", 2),
            "https://cod.example/MLI_pcode/MapServer/2/query?where=1%3D1&outFields=*&f=geojson"
        );
    }

    #[test]
    fn test_parse_map_server_info() {
        let json = r#"{"currentVersion": 10.5, "layers": [
            {"id": 0, "name": "Admin0", "parentLayerId": -1},
            {"id": 1, "name": "Admin1", "parentLayerId": -1}
        ]}"#;
        let info: MapServerInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.layers[1], SubLayer { id: 1, name: "Admin1".into() });
        assert!(info.error.is_none());

        let json = r#"{"error": {"code": 500, "message": "Service not started"}}"#;
        let failed: MapServerInfo = serde_json::from_str(json).unwrap();
        assert!(failed.layers.is_empty());
        assert_eq!(failed.error.and_then(|e| e.message).as_deref(), Some("Service not started"));
    }

    #[test]
    fn test_geometry_error_in_body() {
        let failed: GeometryResponse = serde_json::from_str(
            r#"{"error": {"code": 400, "message": "Invalid or missing input parameters."}}"#,
        )
        .unwrap();
        assert!(failed.collection.features.is_empty());
        let err = check_service_error(failed.error).unwrap_err();
        assert!(err.to_string().contains("Invalid or missing input parameters"));

        let ok: GeometryResponse = serde_json::from_str(
            r#"{"type": "FeatureCollection", "features": [
                {"properties": {"admin1Pcode": "ML01"},
                 "geometry": {"type": "Polygon",
                              "coordinates": [[[-10.0, 12.0], [-9.0, 14.0], [-8.0, 12.0]]]}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(ok.collection.features.len(), 1);
        assert!(check_service_error(ok.error).is_ok());
    }
}
