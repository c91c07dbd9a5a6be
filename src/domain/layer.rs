// Layer and map configuration, resolved layer settings, and layer lifecycle
use super::admin_level::AdminLevel;
use super::color::{ColorMap, ColorMapError, ColorStopSpec};
use super::dataset::TagPattern;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A layer as written by the user. Everything except `url` may be left
/// out and is inferred from the dataset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub layer_type: Option<String>,
    pub admin_level: Option<String>,
    pub aggregate_column: Option<String>,
    pub aggregate_type: Option<String>,
    pub color_map: Option<Vec<ColorStopSpec>>,
    pub alpha: Option<f64>,
    pub unit: Option<String>,
    pub legend: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub cluster: bool,
    pub style: Option<StyleHint>,
}

impl LayerConfig {
    /// Name used in logs and the layer selector.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.url.clone())
            .unwrap_or_else(|| "(unnamed layer)".to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StyleHint {
    pub stroke: Option<bool>,
    pub opacity: Option<f64>,
}

/// Boundaries drawn as a plain base layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CodLayerConfig {
    pub country: String,
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    pub title: Option<String>,
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
    #[serde(default)]
    pub cod_layers: Vec<CodLayerConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    Count,
    Sum(TagPattern),
}

/// Settings that only apply to choropleth layers.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaSettings {
    pub admin_level: AdminLevel,
    pub aggregate: Aggregate,
    pub color_map: ColorMap,
    pub alpha: f64,
    pub legend: Option<String>,
    pub stroke: bool,
    pub no_data_opacity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    Points { cluster: bool },
    Heat,
    Areas(AreaSettings),
}

impl LayerKind {
    pub fn label(&self) -> &'static str {
        match self {
            LayerKind::Points { .. } => "points",
            LayerKind::Heat => "heat",
            LayerKind::Areas(_) => "areas",
        }
    }
}

/// A fully resolved layer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLayerConfig {
    pub name: String,
    pub url: String,
    pub unit: String,
    pub kind: LayerKind,
}

#[derive(Debug, Error)]
pub enum LayerError {
    #[error("no dataset url for layer '{0}'")]
    MissingUrl(String),
    #[error("unknown layer type '{0}'")]
    UnknownType(String),
    #[error("unknown admin level '{0}'")]
    UnknownAdminLevel(String),
    #[error("unknown aggregate type '{0}'")]
    UnknownAggregateType(String),
    #[error("cannot guess a layer type: no #geo+lat/#geo+lon or admin-level +code columns")]
    NoGeocoding,
    #[error("a {0} layer needs #geo+lat and #geo+lon columns")]
    MissingCoordinates(&'static str),
    #[error("areas layer has no {0}+code column")]
    MissingAdminCode(AdminLevel),
    #[error("sum aggregation needs a numeric column and none was found")]
    NoSumColumn,
    #[error("invalid color map: {0}")]
    ColorMap(#[from] ColorMapError),
    #[error("unable to read dataset {url}: {reason}")]
    Dataset { url: String, reason: String },
}

/// Lifecycle of a single layer load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LayerState {
    Created,
    LoadingDataset,
    TypeResolved,
    Styling,
    Aggregating,
    GeometryLoading,
    Ready,
    Failed,
}

impl LayerState {
    pub fn can_advance_to(self, next: LayerState) -> bool {
        use LayerState::*;
        match (self, next) {
            (Ready | Failed, _) => false,
            (_, Failed) => true,
            (Created, LoadingDataset) => true,
            (LoadingDataset, TypeResolved) => true,
            (TypeResolved, Styling | Aggregating) => true,
            (Aggregating, GeometryLoading) => true,
            (Styling | GeometryLoading, Ready) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
