// Render surface - Port for the map canvas
use crate::domain::geometry::Bounds;
use crate::domain::render::{
    AreaPolygon, HeatLayer, LayerControl, Legend, Marker, Overlay, TileLayer,
};

/// Drawing operations the map orchestrator needs. Overlays are grouped by
/// the name of the layer they belong to.
pub trait RenderSurface: Send {
    fn set_title(&mut self, title: Option<&str>);
    fn add_tile_layer(&mut self, layer: &TileLayer, active: bool);
    fn add_markers(&mut self, layer: &str, markers: &[Marker], cluster: bool);
    fn add_polygons(&mut self, layer: &str, polygons: &[AreaPolygon]);
    fn add_heat(&mut self, layer: &str, heat: &HeatLayer);
    fn add_legend(&mut self, layer: &str, legend: &Legend);
    fn fit_bounds(&mut self, bounds: Bounds);
    fn add_layer_control(&mut self, control: &LayerControl);

    fn add_overlay(&mut self, layer: &str, overlay: &Overlay) {
        match overlay {
            Overlay::Markers { markers, cluster } => self.add_markers(layer, markers, *cluster),
            Overlay::Heat(heat) => self.add_heat(layer, heat),
            Overlay::Areas { polygons } => self.add_polygons(layer, polygons),
        }
    }
}
