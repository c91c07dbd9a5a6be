// Infrastructure layer - External dependencies and adapters
pub mod chunked_json;
pub mod config;
pub mod http_response;
pub mod hxl_proxy_repository;
pub mod itos_repository;
pub mod scene_recorder;
