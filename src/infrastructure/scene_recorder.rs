// Scene recorder - A RenderSurface that records drawing calls as a serializable scene
use crate::application::map_service::{FailedLayer, LayerSummary, MapSummary};
use crate::application::render_surface::RenderSurface;
use crate::domain::geometry::Bounds;
use crate::domain::render::{
    AreaPolygon, HeatLayer, LayerControl, Legend, Marker, Overlay, TileLayer,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneTileLayer {
    #[serde(flatten)]
    pub tiles: TileLayer,
    pub active: bool,
}

/// Everything drawn for one named layer, in drawing order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneLayer {
    pub name: String,
    pub overlays: Vec<Overlay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<Legend>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapScene {
    pub title: Option<String>,
    pub generated_at: String,
    pub tile_layers: Vec<SceneTileLayer>,
    pub layers: Vec<SceneLayer>,
    pub bounds: Option<Bounds>,
    pub layer_control: Option<LayerControl>,
    pub loaded_layers: Vec<LayerSummary>,
    pub failed_layers: Vec<FailedLayer>,
}

pub struct SceneRecorder {
    scene: MapScene,
}

impl SceneRecorder {
    pub fn new() -> Self {
        Self {
            scene: MapScene {
                title: None,
                generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                tile_layers: Vec::new(),
                layers: Vec::new(),
                bounds: None,
                layer_control: None,
                loaded_layers: Vec::new(),
                failed_layers: Vec::new(),
            },
        }
    }

    /// Finish the scene with the outcome of the render.
    pub fn into_scene(self, summary: MapSummary) -> MapScene {
        MapScene {
            loaded_layers: summary.layers,
            failed_layers: summary.failed_layers,
            ..self.scene
        }
    }

    fn layer_mut(&mut self, name: &str) -> &mut SceneLayer {
        let index = match self.scene.layers.iter().position(|l| l.name == name) {
            Some(index) => index,
            None => {
                self.scene.layers.push(SceneLayer {
                    name: name.to_string(),
                    overlays: Vec::new(),
                    legend: None,
                });
                self.scene.layers.len() - 1
            }
        };
        &mut self.scene.layers[index]
    }
}

impl Default for SceneRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSurface for SceneRecorder {
    fn set_title(&mut self, title: Option<&str>) {
        self.scene.title = title.map(str::to_string);
    }

    fn add_tile_layer(&mut self, layer: &TileLayer, active: bool) {
        self.scene.tile_layers.push(SceneTileLayer {
            tiles: layer.clone(),
            active,
        });
    }

    fn add_markers(&mut self, layer: &str, markers: &[Marker], cluster: bool) {
        self.layer_mut(layer).overlays.push(Overlay::Markers {
            markers: markers.to_vec(),
            cluster,
        });
    }

    fn add_polygons(&mut self, layer: &str, polygons: &[AreaPolygon]) {
        self.layer_mut(layer).overlays.push(Overlay::Areas {
            polygons: polygons.to_vec(),
        });
    }

    fn add_heat(&mut self, layer: &str, heat: &HeatLayer) {
        self.layer_mut(layer).overlays.push(Overlay::Heat(heat.clone()));
    }

    fn add_legend(&mut self, layer: &str, legend: &Legend) {
        self.layer_mut(layer).legend = Some(legend.clone());
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.scene.bounds = Some(bounds);
    }

    fn add_layer_control(&mut self, control: &LayerControl) {
        self.scene.layer_control = Some(control.clone());
    }
}
