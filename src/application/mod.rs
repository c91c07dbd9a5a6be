// Application layer - Use cases and the ports they depend on
pub mod aggregator;
pub mod boundary_cache;
pub mod boundary_repository;
pub mod config_resolver;
pub mod dataset_repository;
pub mod layer_service;
pub mod map_service;
pub mod render_surface;
pub mod streaming_service;
