// Boundary cache - At most one fetch per (country, admin level)
use crate::application::boundary_repository::{BoundaryRepository, SubLayer};
use crate::domain::admin_level::AdminLevel;
use crate::domain::geometry::BoundaryCollection;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundaryError {
    #[error("unable to read boundary metadata for {country}: {reason}")]
    Metadata { country: String, reason: String },
    #[error("{country} publishes no {layer_name} boundaries for {level}")]
    LevelNotPublished {
        country: String,
        level: AdminLevel,
        layer_name: &'static str,
    },
    #[error("unable to read {level} boundaries for {country}: {reason}")]
    Geometry {
        country: String,
        level: AdminLevel,
        reason: String,
    },
}

type Pending<T> = Shared<BoxFuture<'static, Result<Arc<T>, BoundaryError>>>;
type SubLayerMap = Arc<Mutex<HashMap<String, Pending<Vec<SubLayer>>>>>;
type LevelMap = Arc<Mutex<HashMap<(String, AdminLevel), Pending<BoundaryCollection>>>>;

/// Process-wide boundary cache. Clones share the same entries.
///
/// Entries hold the shared future itself, so a caller asking for a key that
/// is still loading attaches to the in-flight request. Failures are cached
/// like successes until [`BoundaryCache::clear`].
#[derive(Clone)]
pub struct BoundaryCache {
    repository: Arc<dyn BoundaryRepository>,
    sub_layers: SubLayerMap,
    levels: LevelMap,
}

impl BoundaryCache {
    pub fn new(repository: Arc<dyn BoundaryRepository>) -> Self {
        Self {
            repository,
            sub_layers: Arc::new(Mutex::new(HashMap::new())),
            levels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Render-ready boundaries (latitude first) for one country and level.
    pub async fn load_level(
        &self,
        country: &str,
        level: AdminLevel,
    ) -> Result<Arc<BoundaryCollection>, BoundaryError> {
        let country = country.to_uppercase();
        let key = (country.clone(), level);

        let pending = {
            let mut levels = self.levels.lock().await;
            match levels.get(&key) {
                Some(pending) => {
                    tracing::debug!("Boundary cache hit for {} {}", country, level);
                    pending.clone()
                }
                None => {
                    let pending = fetch_level(
                        self.repository.clone(),
                        self.sub_layers.clone(),
                        country,
                        level,
                    )
                    .boxed()
                    .shared();
                    levels.insert(key, pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Forget every cached entry, including failures.
    pub async fn clear(&self) {
        self.levels.lock().await.clear();
        self.sub_layers.lock().await.clear();
    }
}

async fn fetch_level(
    repository: Arc<dyn BoundaryRepository>,
    sub_layers: SubLayerMap,
    country: String,
    level: AdminLevel,
) -> Result<Arc<BoundaryCollection>, BoundaryError> {
    let available = country_sub_layers(repository.clone(), sub_layers, country.clone()).await?;

    let layer_name = level.layer_name();
    let sub_layer = available
        .iter()
        .find(|l| l.name == layer_name)
        .ok_or_else(|| BoundaryError::LevelNotPublished {
            country: country.clone(),
            level,
            layer_name,
        })?;

    tracing::debug!(
        "Fetching {} boundaries for {} (level {}, sub-layer {})",
        level,
        country,
        level.service_level(),
        sub_layer.id
    );
    let geojson = repository
        .fetch_geometry(&country, sub_layer.id)
        .await
        .map_err(|e| BoundaryError::Geometry {
            country: country.clone(),
            level,
            reason: format!("{:#}", e),
        })?;

    let boundaries = geojson.into_boundaries();
    tracing::info!(
        "Loaded {} {} features for {}",
        boundaries.features.len(),
        level,
        country
    );
    Ok(Arc::new(boundaries))
}

async fn country_sub_layers(
    repository: Arc<dyn BoundaryRepository>,
    sub_layers: SubLayerMap,
    country: String,
) -> Result<Arc<Vec<SubLayer>>, BoundaryError> {
    let pending = {
        let mut cache = sub_layers.lock().await;
        match cache.get(&country) {
            Some(pending) => {
                tracing::debug!("Boundary metadata cache hit for {}", country);
                pending.clone()
            }
            None => {
                let key = country.clone();
                let pending = async move {
                    let listed = repository.list_sub_layers(&country).await;
                    listed.map(Arc::new).map_err(|e| BoundaryError::Metadata {
                        country,
                        reason: format!("{:#}", e),
                    })
                }
                .boxed()
                .shared();
                cache.insert(key, pending.clone());
                pending
            }
        }
    };

    pending.await
}
