// Repository trait for administrative boundary access
use crate::domain::geometry::GeoJsonCollection;
use async_trait::async_trait;
use serde::Deserialize;

/// One entry of a country's boundary metadata document
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubLayer {
    pub id: u32,
    pub name: String,
}

#[async_trait]
pub trait BoundaryRepository: Send + Sync {
    /// List the boundary sub-layers published for an ISO3 country
    async fn list_sub_layers(&self, country: &str) -> anyhow::Result<Vec<SubLayer>>;

    /// Fetch the features of one sub-layer, as served (longitude first)
    async fn fetch_geometry(&self, country: &str, layer_id: u32)
        -> anyhow::Result<GeoJsonCollection>;
}
