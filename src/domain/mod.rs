// Domain layer - Map model, independent of transport and storage
pub mod admin_level;
pub mod codes;
pub mod color;
pub mod dataset;
pub mod geometry;
pub mod layer;
pub mod render;
