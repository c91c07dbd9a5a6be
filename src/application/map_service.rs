// Map service - Load every layer, isolate failures, and compose the map
use crate::application::boundary_cache::BoundaryCache;
use crate::application::layer_service::{DegradedCountry, Layer, LayerService};
use crate::application::render_surface::RenderSurface;
use crate::domain::admin_level::AdminLevel;
use crate::domain::codes::iso2_to_iso3;
use crate::domain::geometry::{merge_bounds, Bounds};
use crate::domain::layer::{CodLayerConfig, LayerConfig, LayerError, LayerState, MapConfig};
use crate::domain::render::{AreaPolygon, AreaStyle, LayerControl, TileLayer};
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;

pub const COD_BASE_LAYER: &str = "CODs";
pub const EMPTY_BASE_LAYER: &str = "None";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSummary {
    pub name: String,
    pub kind: &'static str,
    pub state: LayerState,
    pub degraded_countries: Vec<DegradedCountry>,
}

impl LayerSummary {
    pub fn of(layer: &Layer) -> Self {
        Self {
            name: layer.name().to_string(),
            kind: layer.config.kind.label(),
            state: layer.state,
            degraded_countries: layer.degraded_countries.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedLayer {
    pub name: String,
    pub reason: String,
}

impl FailedLayer {
    pub fn new(config: &LayerConfig, error: &LayerError) -> Self {
        Self {
            name: config.display_name(),
            reason: error.to_string(),
        }
    }
}

/// What a map render produced, beyond the drawing calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSummary {
    pub bounds: Bounds,
    pub layers: Vec<LayerSummary>,
    pub failed_layers: Vec<FailedLayer>,
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("no data loaded ({} layer(s) failed)", .failed_layers.len())]
    NoDataLoaded { failed_layers: Vec<FailedLayer> },
}

#[derive(Clone)]
pub struct MapService {
    layers: LayerService,
    boundaries: BoundaryCache,
    basemaps: Vec<TileLayer>,
}

impl MapService {
    pub fn new(layers: LayerService, boundaries: BoundaryCache, basemaps: Vec<TileLayer>) -> Self {
        Self {
            layers,
            boundaries,
            basemaps,
        }
    }

    /// Load every layer concurrently. Results keep configuration order.
    pub async fn load_layers(&self, config: &MapConfig) -> Vec<Result<Layer, LayerError>> {
        join_all(config.layers.iter().map(|layer| self.layers.load(layer))).await
    }

    /// Outline polygons for the configured base boundary layers. Entries
    /// that fail are logged and left out.
    pub async fn load_cod_layers(&self, cod_layers: &[CodLayerConfig]) -> Vec<AreaPolygon> {
        let loads = cod_layers.iter().map(|cod| async move {
            let level = AdminLevel::from_tag(&cod.level)
                .ok_or_else(|| format!("unknown admin level '{}'", cod.level))?;
            let country = iso2_to_iso3(&cod.country).unwrap_or(cod.country.as_str());
            let boundaries = self
                .boundaries
                .load_level(country, level)
                .await
                .map_err(|e| e.to_string())?;

            let property = level.code_property();
            Ok::<_, String>(
                boundaries
                    .features
                    .iter()
                    .map(|feature| AreaPolygon {
                        code: feature.property_str(property),
                        contours: feature.contours.clone(),
                        style: AreaStyle::outline(),
                        tooltip: None,
                    })
                    .collect::<Vec<_>>(),
            )
        });

        let mut polygons = Vec::new();
        for (cod, result) in cod_layers.iter().zip(join_all(loads).await) {
            match result {
                Ok(mut loaded) => polygons.append(&mut loaded),
                Err(reason) => {
                    tracing::warn!("Skipping COD layer {} {}: {}", cod.country, cod.level, reason)
                }
            }
        }
        polygons
    }

    /// Load the map and draw it onto `surface`. Fails only when no layer
    /// produced anything to fit the view to.
    pub async fn render(
        &self,
        config: &MapConfig,
        surface: &mut dyn RenderSurface,
    ) -> Result<MapSummary, MapError> {
        let (results, cod_polygons) = tokio::join!(
            self.load_layers(config),
            self.load_cod_layers(&config.cod_layers)
        );

        let mut loaded = Vec::new();
        let mut failed_layers = Vec::new();
        for (layer_config, result) in config.layers.iter().zip(results) {
            match result {
                Ok(layer) => loaded.push(layer),
                Err(e) => failed_layers.push(FailedLayer::new(layer_config, &e)),
            }
        }

        let bounds = merge_bounds(loaded.iter().map(|l| l.bounds));
        let Some(bounds) = bounds.filter(|_| !loaded.is_empty()) else {
            tracing::error!("No data loaded: {} layer(s) failed", failed_layers.len());
            return Err(MapError::NoDataLoaded { failed_layers });
        };

        surface.set_title(config.title.as_deref());
        for (i, tiles) in self.basemaps.iter().enumerate() {
            surface.add_tile_layer(tiles, i == 0);
        }
        if !cod_polygons.is_empty() {
            surface.add_polygons(COD_BASE_LAYER, &cod_polygons);
        }

        for layer in &loaded {
            surface.add_overlay(layer.name(), &layer.overlay);
            if let Some(legend) = &layer.legend {
                surface.add_legend(layer.name(), legend);
            }
        }

        surface.fit_bounds(bounds);
        surface.add_layer_control(&self.layer_control(&loaded, !cod_polygons.is_empty()));

        tracing::info!(
            "Map ready: {} layer(s) loaded, {} failed",
            loaded.len(),
            failed_layers.len()
        );

        Ok(MapSummary {
            bounds,
            layers: loaded.iter().map(LayerSummary::of).collect(),
            failed_layers,
        })
    }

    fn layer_control(&self, loaded: &[Layer], has_cods: bool) -> LayerControl {
        let mut base_layers: Vec<String> = self.basemaps.iter().map(|t| t.name.clone()).collect();
        if has_cods {
            base_layers.push(COD_BASE_LAYER.to_string());
        }
        base_layers.push(EMPTY_BASE_LAYER.to_string());

        let mut overlays: Vec<String> = loaded.iter().map(|l| l.name().to_string()).collect();
        overlays.sort();

        LayerControl {
            base_layers,
            overlays,
            sort: true,
        }
    }
}
