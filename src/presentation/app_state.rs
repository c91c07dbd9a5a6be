// Application state for HTTP handlers
use crate::application::boundary_cache::BoundaryCache;
use crate::application::map_service::MapService;
use crate::application::streaming_service::StreamingMapService;

#[derive(Clone)]
pub struct AppState {
    pub map_service: MapService,
    pub streaming_service: StreamingMapService,
    pub boundary_cache: BoundaryCache,
}
