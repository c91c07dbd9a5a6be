// Streaming map service - Progressive loading, one event per settled layer
use crate::application::layer_service::LayerService;
use crate::application::map_service::{FailedLayer, LayerSummary};
use crate::domain::geometry::{merge_bounds, Bounds};
use crate::domain::layer::MapConfig;
use crate::domain::render::{Legend, Overlay};
use serde::Serialize;
use std::time::Instant;
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MapEvent {
    /// Sent first: what is about to load.
    Skeleton {
        title: Option<String>,
        layers: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    LayerReady {
        index: usize,
        layer: LayerSummary,
        overlay: Overlay,
        legend: Option<Legend>,
        bounds: Option<Bounds>,
    },
    LayerFailed {
        index: usize,
        layer: FailedLayer,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        bounds: Option<Bounds>,
        loaded: usize,
        failed: usize,
        duration_ms: u64,
        error: Option<String>,
    },
}

#[derive(Clone)]
pub struct StreamingMapService {
    layers: LayerService,
}

impl StreamingMapService {
    pub fn new(layers: LayerService) -> Self {
        Self { layers }
    }

    /// Start loading `config` in the background. Layer events arrive in
    /// settlement order; `Complete` is always last.
    pub fn stream_map(&self, config: MapConfig) -> mpsc::Receiver<MapEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let layers = self.layers.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let skeleton = MapEvent::Skeleton {
                title: config.title.clone(),
                layers: config.layers.iter().map(|l| l.display_name()).collect(),
            };
            let _ = tx.send(skeleton).await;

            let mut handles = Vec::with_capacity(config.layers.len());
            for (index, layer_config) in config.layers.into_iter().enumerate() {
                let tx = tx.clone();
                let layers = layers.clone();

                handles.push(tokio::spawn(async move {
                    match layers.load(&layer_config).await {
                        Ok(layer) => {
                            let bounds = layer.bounds;
                            let event = MapEvent::LayerReady {
                                index,
                                layer: LayerSummary::of(&layer),
                                overlay: layer.overlay,
                                legend: layer.legend,
                                bounds,
                            };
                            let _ = tx.send(event).await;
                            Some(bounds)
                        }
                        Err(e) => {
                            let event = MapEvent::LayerFailed {
                                index,
                                layer: FailedLayer::new(&layer_config, &e),
                            };
                            let _ = tx.send(event).await;
                            None
                        }
                    }
                }));
            }

            let total = handles.len();
            let mut settled = Vec::with_capacity(total);
            for handle in handles {
                match handle.await {
                    Ok(outcome) => settled.push(outcome),
                    Err(e) => {
                        tracing::error!("Layer task aborted: {}", e);
                        settled.push(None);
                    }
                }
            }

            let loaded = settled.iter().filter(|o| o.is_some()).count();
            let bounds = merge_bounds(settled.into_iter().flatten());
            let error = match (loaded, bounds) {
                (0, _) | (_, None) => Some("no data loaded".to_string()),
                _ => None,
            };

            let complete = MapEvent::Complete {
                bounds,
                loaded,
                failed: total - loaded,
                duration_ms: start_time.elapsed().as_millis() as u64,
                error,
            };
            let _ = tx.send(complete).await;
        });

        rx
    }
}
