// Layer service - Load one configured layer into a render-ready overlay
use crate::application::aggregator::{
    aggregate, parse_number, AggregatedRow, Aggregation, GroupKeys,
};
use crate::application::boundary_cache::BoundaryCache;
use crate::application::config_resolver;
use crate::application::dataset_repository::DatasetRepository;
use crate::domain::codes::{country_for_code, fuzzy_lookup, iso2_to_iso3, iso3_to_iso2};
use crate::domain::color::color_for;
use crate::domain::dataset::{Dataset, Row, TagPattern};
use crate::domain::geometry::{merge_bounds, BoundaryCollection, Bounds, LatLng};
use crate::domain::layer::{
    Aggregate, AreaSettings, LayerConfig, LayerError, LayerKind, LayerState, ResolvedLayerConfig,
};
use crate::domain::render::{
    escape_html, format_number, AreaPolygon, AreaStyle, HeatLayer, Legend, Marker, Overlay,
};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

const NO_DATA_TEXT: &str = "(no data available)";

/// A country whose boundaries could not be loaded for a layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradedCountry {
    pub country: String,
    pub reason: String,
}

/// A loaded layer.
#[derive(Debug, Clone)]
pub struct Layer {
    pub config: ResolvedLayerConfig,
    pub dataset: Arc<Dataset>,
    /// Per-area statistics; only set for areas layers.
    pub aggregation: Option<Aggregation>,
    /// Aggregated rows keyed by upper-cased p-code; empty unless areas.
    pub index: HashMap<String, AggregatedRow>,
    pub bounds: Option<Bounds>,
    pub overlay: Overlay,
    pub legend: Option<Legend>,
    pub degraded_countries: Vec<DegradedCountry>,
    pub state: LayerState,
}

impl Layer {
    pub fn name(&self) -> &str {
        &self.config.name
    }
}

struct Rendered {
    overlay: Overlay,
    bounds: Option<Bounds>,
    aggregation: Option<Aggregation>,
    index: HashMap<String, AggregatedRow>,
    legend: Option<Legend>,
    degraded_countries: Vec<DegradedCountry>,
}

/// Tracks and logs the lifecycle of one layer load.
struct Progress {
    name: String,
    state: LayerState,
}

impl Progress {
    fn new(name: String) -> Self {
        Self {
            name,
            state: LayerState::Created,
        }
    }

    fn advance(&mut self, next: LayerState) {
        if !self.state.can_advance_to(next) {
            tracing::warn!(
                "Layer '{}' made an unexpected transition {} -> {}",
                self.name,
                self.state,
                next
            );
        }
        tracing::debug!("Layer '{}': {} -> {}", self.name, self.state, next);
        self.state = next;
    }
}

#[derive(Clone)]
pub struct LayerService {
    datasets: Arc<dyn DatasetRepository>,
    boundaries: BoundaryCache,
}

impl LayerService {
    pub fn new(datasets: Arc<dyn DatasetRepository>, boundaries: BoundaryCache) -> Self {
        Self {
            datasets,
            boundaries,
        }
    }

    /// Fetch, resolve and render one layer. Any error is fatal to this
    /// layer only.
    pub async fn load(&self, config: &LayerConfig) -> Result<Layer, LayerError> {
        let mut progress = Progress::new(config.display_name());
        match self.load_tracked(config, &mut progress).await {
            Ok(layer) => Ok(layer),
            Err(e) => {
                progress.advance(LayerState::Failed);
                tracing::error!("Layer '{}' failed: {}", progress.name, e);
                Err(e)
            }
        }
    }

    async fn load_tracked(
        &self,
        config: &LayerConfig,
        progress: &mut Progress,
    ) -> Result<Layer, LayerError> {
        let url = config
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| LayerError::MissingUrl(progress.name.clone()))?;

        progress.advance(LayerState::LoadingDataset);
        let dataset = self
            .datasets
            .fetch_dataset(url)
            .await
            .map_err(|e| LayerError::Dataset {
                url: url.to_string(),
                reason: format!("{:#}", e),
            })?;
        let dataset = Arc::new(dataset);
        if dataset.is_empty() {
            tracing::warn!("Layer '{}': {} has no data rows", progress.name, url);
        } else {
            tracing::info!("Layer '{}': {} rows from {}", progress.name, dataset.len(), url);
        }

        let resolved = config_resolver::resolve(config, dataset.columns())?;
        progress.advance(LayerState::TypeResolved);

        let rendered = match &resolved.kind {
            LayerKind::Points { cluster } => {
                progress.advance(LayerState::Styling);
                render_points(&dataset, *cluster)
            }
            LayerKind::Heat => {
                progress.advance(LayerState::Styling);
                render_heat(&dataset)
            }
            LayerKind::Areas(settings) => {
                progress.advance(LayerState::Aggregating);
                let aggregation = aggregate_areas(&dataset, settings);
                progress.advance(LayerState::GeometryLoading);
                self.render_areas(&dataset, &resolved, settings, aggregation).await
            }
        };

        progress.advance(LayerState::Ready);
        Ok(Layer {
            config: resolved,
            dataset,
            aggregation: rendered.aggregation,
            index: rendered.index,
            bounds: rendered.bounds,
            overlay: rendered.overlay,
            legend: rendered.legend,
            degraded_countries: rendered.degraded_countries,
            state: progress.state,
        })
    }

    async fn render_areas(
        &self,
        dataset: &Dataset,
        config: &ResolvedLayerConfig,
        settings: &AreaSettings,
        aggregation: Aggregation,
    ) -> Rendered {
        let level = settings.admin_level;
        let index = aggregation.index_by_code();
        let countries = countries_in(dataset, &GroupKeys::for_level(level));

        // Every country is awaited; one failure only degrades that country
        let loads = countries.iter().map(|c| self.boundaries.load_level(c, level));
        let results = join_all(loads).await;

        let mut collections: Vec<Arc<BoundaryCollection>> = Vec::new();
        let mut degraded_countries = Vec::new();
        for (country, result) in countries.into_iter().zip(results) {
            match result {
                Ok(collection) => collections.push(collection),
                Err(e) => {
                    tracing::warn!("Layer '{}': no boundaries for {}: {}", config.name, country, e);
                    degraded_countries.push(DegradedCountry {
                        country,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let code_property = level.code_property();
        let mut polygons = Vec::new();
        for feature in collections.iter().flat_map(|c| c.features.iter()) {
            let Some(code) = feature.property_str(code_property) else {
                tracing::info!("Feature has no {} property", code_property);
                polygons.push(AreaPolygon {
                    code: None,
                    contours: feature.contours.clone(),
                    style: AreaStyle::unstyled(false),
                    tooltip: None,
                });
                continue;
            };

            let (style, text) = match fuzzy_lookup(&code, &index) {
                Some(row) => {
                    let t = aggregation.normalize(row.value);
                    let color = color_for(t, &settings.color_map, None);
                    (AreaStyle::filled(color, settings.stroke), tooltip(row, &code, &config.unit))
                }
                None => {
                    tracing::debug!("No data for boundary {}", code);
                    (
                        AreaStyle::no_data(settings.stroke, settings.no_data_opacity),
                        NO_DATA_TEXT.to_string(),
                    )
                }
            };

            polygons.push(AreaPolygon {
                code: Some(code),
                contours: feature.contours.clone(),
                style,
                tooltip: Some(escape_html(&text)),
            });
        }

        let bounds = merge_bounds(collections.iter().map(|c| c.bounds()));
        let legend = Legend::new(
            settings.legend.clone(),
            &settings.color_map,
            settings.alpha,
            aggregation.min,
            aggregation.max,
        );

        Rendered {
            overlay: Overlay::Areas { polygons },
            bounds,
            aggregation: Some(aggregation),
            index,
            legend: Some(legend),
            degraded_countries,
        }
    }
}

fn aggregate_areas(dataset: &Dataset, settings: &AreaSettings) -> Aggregation {
    let keys = GroupKeys::for_level(settings.admin_level);
    let value = match &settings.aggregate {
        Aggregate::Count => None,
        Aggregate::Sum(column) => Some(column),
    };
    let aggregation = aggregate(dataset.rows(), &keys, value);
    tracing::debug!(
        "Aggregated {} areas, min {} max {}",
        aggregation.rows.len(),
        aggregation.min,
        aggregation.max
    );
    aggregation
}

/// Distinct ISO3 countries referenced by the dataset, in sorted order.
/// A row's `#country+code` wins; rows without one fall back to their p-code.
fn countries_in(dataset: &Dataset, keys: &GroupKeys) -> Vec<String> {
    let country_column = TagPattern::parse("#country+code");
    let mut countries: Vec<String> = Vec::new();

    for row in dataset.rows() {
        let country = match (row.get(&country_column), row.get(&keys.code)) {
            (Some(code), _) => {
                let iso3 = iso3_to_iso2(code)
                    .and_then(iso2_to_iso3)
                    .or_else(|| iso2_to_iso3(code));
                if iso3.is_none() {
                    tracing::error!("Unknown country code '{}'", code);
                }
                iso3
            }
            (None, Some(pcode)) => {
                let iso3 = country_for_code(pcode);
                if iso3.is_none() {
                    tracing::error!("Cannot guess country for p-code '{}'", pcode);
                }
                iso3
            }
            (None, None) => None,
        };
        if let Some(iso3) = country {
            if !countries.iter().any(|c| c == iso3) {
                countries.push(iso3.to_string());
            }
        }
    }

    countries.sort();
    countries
}

fn tooltip(row: &AggregatedRow, code: &str, unit: &str) -> String {
    let name = row.name.as_deref().unwrap_or(code);
    format!("{}: {} {}", name, format_number(row.value), unit)
}

fn coordinates(row: Row<'_>, lat: &TagPattern, lon: &TagPattern) -> Option<LatLng> {
    let lat = parse_number(row.get(lat)?)?;
    let lng = parse_number(row.get(lon)?)?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return None;
    }
    Some(LatLng::new(lat, lng))
}

fn located_rows(dataset: &Dataset) -> impl Iterator<Item = (Row<'_>, LatLng)> {
    let lat = TagPattern::parse("#geo+lat");
    let lon = TagPattern::parse("#geo+lon");
    dataset.rows().filter_map(move |row| match coordinates(row, &lat, &lon) {
        Some(position) => Some((row, position)),
        None => {
            tracing::debug!("Skipping row without usable #geo+lat/#geo+lon");
            None
        }
    })
}

fn render_points(dataset: &Dataset, cluster: bool) -> Rendered {
    let markers: Vec<Marker> = located_rows(dataset)
        .map(|(row, position)| Marker {
            position,
            popup: popup(row),
        })
        .collect();
    tracing::debug!("{} of {} rows placed as markers", markers.len(), dataset.len());

    Rendered {
        bounds: Bounds::from_points(markers.iter().map(|m| m.position)),
        overlay: Overlay::Markers { markers, cluster },
        aggregation: None,
        index: HashMap::new(),
        legend: None,
        degraded_countries: Vec::new(),
    }
}

fn render_heat(dataset: &Dataset) -> Rendered {
    let points: Vec<LatLng> = located_rows(dataset).map(|(_, position)| position).collect();

    Rendered {
        bounds: Bounds::from_points(points.iter().copied()),
        overlay: Overlay::Heat(HeatLayer::new(points)),
        aggregation: None,
        index: HashMap::new(),
        legend: None,
        degraded_countries: Vec::new(),
    }
}

/// HTML table of every non-empty cell, labelled by header or hashtag.
fn popup(row: Row<'_>) -> String {
    let mut html = String::from("<table>");
    for (column, value) in row.cells() {
        let Some(label) = column.header.clone().or_else(|| column.display_tag()) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        html.push_str(&format!(
            "<tr><th>{}</th><td>{}</td></tr>",
            escape_html(&label),
            escape_html(value)
        ));
    }
    html.push_str("</table>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::boundary_repository::{BoundaryRepository, SubLayer};
    use crate::domain::color::{ColorSpec, ColorStopSpec, Rgb};
    use crate::domain::dataset::Column;
    use crate::domain::geometry::GeoJsonCollection;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeDatasets {
        sheets: HashMap<String, Vec<Vec<String>>>,
        calls: AtomicUsize,
    }

    impl FakeDatasets {
        fn new(sheets: &[(&str, &[&[&str]])]) -> Self {
            Self {
                sheets: sheets
                    .iter()
                    .map(|(url, rows)| {
                        let rows = rows
                            .iter()
                            .map(|r| r.iter().map(|c| c.to_string()).collect())
                            .collect();
                        (url.to_string(), rows)
                    })
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DatasetRepository for FakeDatasets {
        async fn fetch_dataset(&self, url: &str) -> anyhow::Result<Dataset> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.sheets.get(url) {
                Some(sheet) => Ok(Dataset::from_sheet(sheet.clone())?),
                None => anyhow::bail!("404 for {}", url),
            }
        }
    }

    /// Mali has Admin1 boundaries; Niger metadata lists nothing.
    struct FakeBoundaries;

    #[async_trait]
    impl BoundaryRepository for FakeBoundaries {
        async fn list_sub_layers(&self, country: &str) -> anyhow::Result<Vec<SubLayer>> {
            match country {
                "MLI" => Ok(vec![SubLayer { id: 1, name: "Admin1".into() }]),
                "NER" => Ok(vec![]),
                other => anyhow::bail!("unknown country {}", other),
            }
        }

        async fn fetch_geometry(
            &self,
            _country: &str,
            _layer_id: u32,
        ) -> anyhow::Result<GeoJsonCollection> {
            let json = r#"{"features": [
                {"properties": {"admin1Pcode": "MLI001"},
                 "geometry": {"type": "Polygon",
                              "coordinates": [[[-10.0, 12.0], [-9.0, 14.0], [-8.0, 12.0]]]}},
                {"properties": {"admin1Pcode": "ML002"},
                 "geometry": {"type": "Polygon",
                              "coordinates": [[[-5.0, 15.0], [-4.0, 16.0], [-3.0, 15.0]]]}},
                {"properties": {"admin1Pcode": "ML009"},
                 "geometry": {"type": "Polygon",
                              "coordinates": [[[0.0, 20.0], [1.0, 21.0], [2.0, 20.0]]]}},
                {"properties": {},
                 "geometry": {"type": "Polygon",
                              "coordinates": [[[3.0, 18.0], [4.0, 19.0], [3.0, 19.0]]]}}
            ]}"#;
            Ok(serde_json::from_str(json)?)
        }
    }

    fn service(datasets: FakeDatasets) -> LayerService {
        LayerService::new(Arc::new(datasets), BoundaryCache::new(Arc::new(FakeBoundaries)))
    }

    fn layer(url: &str) -> LayerConfig {
        LayerConfig {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    const POINTS: &[&[&str]] = &[
        &["Place", "Latitude", "Longitude", "Notes"],
        &["#loc+name", "#geo+lat", "#geo+lon", "#description"],
        &["Bamako", "12.6", "-8.0", "<capital>"],
        &["Nowhere", "", "", ""],
        &["Gao", "16.3", "-0.05", ""],
    ];

    const AREAS: &[&[&str]] = &[
        &["#adm1+name", "#adm1+code", "#affected"],
        &["Kayes", "ML001", "0"],
        &["Koulikoro", "ML002", "50"],
        &["Sikasso", "ML003", "100"],
    ];

    #[tokio::test]
    async fn test_points_layer() {
        let service = service(FakeDatasets::new(&[("points", POINTS)]));
        let layer = service.load(&layer("points")).await.unwrap();

        assert_eq!(layer.state, LayerState::Ready);
        assert_eq!(layer.config.kind, LayerKind::Points { cluster: false });
        let Overlay::Markers { markers, cluster } = &layer.overlay else {
            panic!("expected markers, got {:?}", layer.overlay);
        };
        assert!(!cluster);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].position, LatLng::new(12.6, -8.0));
        assert_eq!(
            markers[0].popup,
            "<table><tr><th>Place</th><td>Bamako</td></tr>\
             <tr><th>Latitude</th><td>12.6</td></tr>\
             <tr><th>Longitude</th><td>-8.0</td></tr>\
             <tr><th>Notes</th><td>&lt;capital&gt;</td></tr></table>"
        );

        let bounds = layer.bounds.unwrap();
        assert_eq!((bounds.south, bounds.north), (12.6, 16.3));
        assert_eq!((bounds.west, bounds.east), (-8.0, -0.05));
    }

    #[tokio::test]
    async fn test_heat_layer() {
        let service = service(FakeDatasets::new(&[("points", POINTS)]));
        let config = LayerConfig {
            layer_type: Some("heat".into()),
            ..layer("points")
        };
        let layer = service.load(&config).await.unwrap();

        let Overlay::Heat(heat) = &layer.overlay else {
            panic!("expected heat, got {:?}", layer.overlay);
        };
        assert_eq!(heat.points.len(), 2);
        assert_eq!(heat.radius, 15);
        assert!(layer.legend.is_none());
    }

    #[tokio::test]
    async fn test_areas_layer_black_to_white() {
        let service = service(FakeDatasets::new(&[("areas", AREAS)]));
        let config = LayerConfig {
            color_map: Some(vec![
                ColorStopSpec { percentage: 0.0, color: ColorSpec::Rgb(Rgb::new(0, 0, 0)) },
                ColorStopSpec { percentage: 1.0, color: ColorSpec::Rgb(Rgb::new(255, 255, 255)) },
            ]),
            unit: Some("people".into()),
            ..layer("areas")
        };
        let layer = service.load(&config).await.unwrap();

        assert_eq!(layer.state, LayerState::Ready);
        let aggregation = layer.aggregation.as_ref().unwrap();
        assert_eq!((aggregation.min, aggregation.max), (0.0, 100.0));
        assert_eq!(layer.index.len(), 3);
        assert_eq!(layer.index["ML002"].name.as_deref(), Some("Koulikoro"));
        assert!(layer.degraded_countries.is_empty());

        let Overlay::Areas { polygons } = &layer.overlay else {
            panic!("expected areas, got {:?}", layer.overlay);
        };
        assert_eq!(polygons.len(), 4);

        // MLI001 matches ML001 through the prefix swap
        assert_eq!(polygons[0].style.color.unwrap().to_string(), "rgb(0,0,0)");
        assert_eq!(polygons[0].tooltip.as_deref(), Some("Kayes: 0 people"));

        assert_eq!(polygons[1].style.color.unwrap().to_string(), "rgb(127,127,127)");
        assert_eq!(polygons[1].tooltip.as_deref(), Some("Koulikoro: 50 people"));
        assert!(!polygons[1].style.stroke);

        assert_eq!(polygons[2].style, AreaStyle::no_data(false, 0.5));
        assert_eq!(polygons[2].tooltip.as_deref(), Some("(no data available)"));

        assert_eq!(polygons[3].code, None);
        assert_eq!(polygons[3].style, AreaStyle::unstyled(false));

        let legend = layer.legend.as_ref().unwrap();
        assert_eq!(legend.caption.as_deref(), Some("Number of people"));
        assert_eq!(legend.max, "100");

        let bounds = layer.bounds.unwrap();
        assert_eq!((bounds.south, bounds.north), (12.0, 21.0));
    }

    #[tokio::test]
    async fn test_failed_country_degrades_layer() {
        let sheet: &[&[&str]] = &[
            &["#adm1+code", "#country+code"],
            &["ML001", "MLI"],
            &["NE001", "NE"],
        ];
        let service = service(FakeDatasets::new(&[("two", sheet)]));
        let layer = service.load(&layer("two")).await.unwrap();

        assert_eq!(layer.state, LayerState::Ready);
        assert_eq!(layer.degraded_countries.len(), 1);
        assert_eq!(layer.degraded_countries[0].country, "NER");
        assert!(layer.degraded_countries[0].reason.contains("Admin1"));
        let Overlay::Areas { polygons } = &layer.overlay else {
            panic!("expected areas");
        };
        assert_eq!(polygons.len(), 4);
    }

    #[tokio::test]
    async fn test_blank_country_cell_falls_back_to_pcode() {
        let sheet: &[&[&str]] = &[
            &["#adm1+code", "#country+code"],
            &["ML001", ""],
            &["NE001", "NER"],
        ];
        let dataset = Dataset::from_sheet(
            sheet.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect(),
        )
        .unwrap();
        let keys = GroupKeys::for_level(crate::domain::admin_level::AdminLevel::Adm1);
        assert_eq!(countries_in(&dataset, &keys), vec!["MLI", "NER"]);

        let service = service(FakeDatasets::new(&[("mixed", sheet)]));
        let layer = service.load(&layer("mixed")).await.unwrap();

        assert_eq!(layer.degraded_countries.len(), 1);
        assert_eq!(layer.degraded_countries[0].country, "NER");
        let Overlay::Areas { polygons } = &layer.overlay else {
            panic!("expected areas");
        };
        assert_eq!(polygons.len(), 4);
        assert_eq!(polygons[0].tooltip.as_deref(), Some("MLI001: 1 entries"));
    }

    #[tokio::test]
    async fn test_dataset_failure_is_fatal() {
        let service = service(FakeDatasets::new(&[]));
        let err = service.load(&layer("missing")).await.unwrap_err();
        assert!(matches!(err, LayerError::Dataset { ref url, .. } if url == "missing"));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_missing_url_fails_before_fetch() {
        let datasets = Arc::new(FakeDatasets::new(&[]));
        let boundaries = BoundaryCache::new(Arc::new(FakeBoundaries));
        let service = LayerService::new(datasets.clone(), boundaries);
        let config = LayerConfig {
            name: Some("Nothing".into()),
            ..Default::default()
        };

        let err = service.load(&config).await.unwrap_err();
        assert!(matches!(err, LayerError::MissingUrl(ref name) if name == "Nothing"));
        assert_eq!(datasets.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_configuration_error_is_fatal() {
        let service = service(FakeDatasets::new(&[("points", POINTS)]));
        let config = LayerConfig {
            layer_type: Some("hexbin".into()),
            ..layer("points")
        };
        let err = service.load(&config).await.unwrap_err();
        assert!(matches!(err, LayerError::UnknownType(_)));
    }

    #[test]
    fn test_popup_falls_back_to_display_tag() {
        let dataset = Dataset::new(
            vec![Column::parse("#org +impl", None), Column::parse("#sector", Some("Sector"))],
            vec![vec!["MSF & co".into(), "".into()]],
        );
        let row = dataset.rows().next().unwrap();
        assert_eq!(popup(row), "<table><tr><th>#org+impl</th><td>MSF &amp; co</td></tr></table>");
    }
}
