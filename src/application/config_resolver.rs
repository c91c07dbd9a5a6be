// Configuration resolver - Fill unset layer settings from the dataset schema
use crate::domain::admin_level::AdminLevel;
use crate::domain::color::ColorMap;
use crate::domain::dataset::{Column, TagPattern};
use crate::domain::layer::{
    Aggregate, AreaSettings, LayerConfig, LayerError, LayerKind, ResolvedLayerConfig,
};

/// Quantity-like hashtags, in the order they are preferred as a sum column.
const QUANTITY_TAGS: [&str; 7] = [
    "#reached",
    "#targeted",
    "#inneed",
    "#affected",
    "#population",
    "#value",
    "#indicator+num",
];

const LATITUDE_TAG: &str = "#geo+lat";
const LONGITUDE_TAG: &str = "#geo+lon";
const DEFAULT_UNIT: &str = "entries";
const DEFAULT_ALPHA: f64 = 0.5;
const DEFAULT_NO_DATA_OPACITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
enum TypeTag {
    Points,
    Heat,
    Areas,
}

/// Resolve `config` against a dataset's columns. Explicit values always
/// win; only missing ones are inferred or defaulted.
pub fn resolve(
    config: &LayerConfig,
    columns: &[Column],
) -> Result<ResolvedLayerConfig, LayerError> {
    let name = config.display_name();
    let url = config
        .url
        .clone()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| LayerError::MissingUrl(name.clone()))?;

    let explicit_type = config.layer_type.as_deref().map(parse_type).transpose()?;
    let explicit_level = config
        .admin_level
        .as_deref()
        .map(|tag| {
            AdminLevel::from_tag(tag)
                .ok_or_else(|| LayerError::UnknownAdminLevel(tag.to_string()))
        })
        .transpose()?;

    let has_coordinates =
        has_column(columns, LATITUDE_TAG) && has_column(columns, LONGITUDE_TAG);

    let type_tag = match explicit_type {
        Some(TypeTag::Points) | Some(TypeTag::Heat) if !has_coordinates => {
            let label = if explicit_type == Some(TypeTag::Heat) { "heat" } else { "points" };
            return Err(LayerError::MissingCoordinates(label));
        }
        Some(tag) => tag,
        None if has_coordinates => TypeTag::Points,
        None if explicit_level.is_some() || guess_level(columns).is_some() => TypeTag::Areas,
        None => return Err(LayerError::NoGeocoding),
    };

    let kind = match type_tag {
        TypeTag::Points => LayerKind::Points {
            cluster: config.cluster,
        },
        TypeTag::Heat => LayerKind::Heat,
        TypeTag::Areas => LayerKind::Areas(resolve_areas(config, columns, explicit_level)?),
    };

    tracing::debug!("Resolved layer '{}' as {}", name, kind.label());

    Ok(ResolvedLayerConfig {
        name,
        url,
        unit: config.unit.clone().unwrap_or_else(|| DEFAULT_UNIT.to_string()),
        kind,
    })
}

fn resolve_areas(
    config: &LayerConfig,
    columns: &[Column],
    explicit_level: Option<AdminLevel>,
) -> Result<AreaSettings, LayerError> {
    let admin_level = match explicit_level {
        Some(level) if has_column(columns, &format!("{}+code", level.tag())) => level,
        Some(level) => return Err(LayerError::MissingAdminCode(level)),
        None => guess_level(columns).ok_or(LayerError::NoGeocoding)?,
    };

    let aggregate = resolve_aggregate(config, columns)?;

    let color_map = match &config.color_map {
        Some(specs) => ColorMap::from_specs(specs)?,
        None => ColorMap::default(),
    };

    let style = config.style.clone().unwrap_or_default();

    Ok(AreaSettings {
        admin_level,
        aggregate,
        color_map,
        alpha: config.alpha.unwrap_or(DEFAULT_ALPHA),
        legend: config
            .legend
            .clone()
            .or_else(|| config.unit.as_ref().map(|unit| format!("Number of {}", unit))),
        stroke: style.stroke.unwrap_or(false),
        no_data_opacity: style.opacity.unwrap_or(DEFAULT_NO_DATA_OPACITY),
    })
}

fn resolve_aggregate(config: &LayerConfig, columns: &[Column]) -> Result<Aggregate, LayerError> {
    let aggregate_type = config
        .aggregate_type
        .as_deref()
        .map(|t| t.trim().to_lowercase());

    match (aggregate_type.as_deref(), config.aggregate_column.as_deref()) {
        (Some("count"), _) => Ok(Aggregate::Count),
        (Some("sum") | None, Some(column)) => Ok(Aggregate::Sum(TagPattern::parse(column))),
        (Some("sum"), None) => quantity_column(columns)
            .map(Aggregate::Sum)
            .ok_or(LayerError::NoSumColumn),
        (None, None) => Ok(quantity_column(columns)
            .map(Aggregate::Sum)
            .unwrap_or(Aggregate::Count)),
        (Some(other), _) => Err(LayerError::UnknownAggregateType(other.to_string())),
    }
}

fn parse_type(value: &str) -> Result<TypeTag, LayerError> {
    match value.trim().to_lowercase().as_str() {
        "points" => Ok(TypeTag::Points),
        "heat" => Ok(TypeTag::Heat),
        "areas" => Ok(TypeTag::Areas),
        _ => Err(LayerError::UnknownType(value.to_string())),
    }
}

/// Most specific admin level that has a `+code` column.
fn guess_level(columns: &[Column]) -> Option<AdminLevel> {
    AdminLevel::MOST_SPECIFIC_FIRST
        .into_iter()
        .find(|level| has_column(columns, &format!("{}+code", level.tag())))
}

fn quantity_column(columns: &[Column]) -> Option<TagPattern> {
    QUANTITY_TAGS
        .iter()
        .map(|tag| TagPattern::parse(tag))
        .find(|pattern| columns.iter().any(|c| pattern.matches(c)))
}

fn has_column(columns: &[Column], pattern: &str) -> bool {
    let pattern = TagPattern::parse(pattern);
    columns.iter().any(|c| pattern.matches(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::color::{ColorSpec, ColorStopSpec, Rgb};
    use crate::domain::layer::StyleHint;

    fn columns(tags: &[&str]) -> Vec<Column> {
        tags.iter().map(|t| Column::parse(t, None)).collect()
    }

    fn config() -> LayerConfig {
        LayerConfig {
            url: Some("https://example.org/data.csv".into()),
            ..Default::default()
        }
    }

    fn areas(resolved: &ResolvedLayerConfig) -> &AreaSettings {
        match &resolved.kind {
            LayerKind::Areas(settings) => settings,
            other => panic!("expected areas, got {:?}", other),
        }
    }

    #[test]
    fn test_coordinates_make_points() {
        let columns = columns(&["#loc+name", "#geo+lat", "#geo+lon", "#adm1+code"]);
        let resolved = resolve(&config(), &columns).unwrap();
        assert_eq!(resolved.kind, LayerKind::Points { cluster: false });
        assert_eq!(resolved.unit, "entries");
    }

    #[test]
    fn test_admin_codes_make_areas() {
        let resolved = resolve(&config(), &columns(&["#adm1+name", "#adm1+code"])).unwrap();
        let settings = areas(&resolved);
        assert_eq!(settings.admin_level, AdminLevel::Adm1);
        assert_eq!(settings.aggregate, Aggregate::Count);
        assert_eq!(settings.color_map, ColorMap::default());
        assert_eq!(settings.alpha, 0.5);
        assert_eq!(settings.legend, None);
        assert!(!settings.stroke);
    }

    #[test]
    fn test_most_specific_level_wins() {
        let cols = columns(&["#country+code", "#adm1+code", "#adm2+code", "#adm3+name"]);
        let resolved = resolve(&config(), &cols).unwrap();
        assert_eq!(areas(&resolved).admin_level, AdminLevel::Adm2);

        let resolved = resolve(&config(), &columns(&["#country+code", "#country+name"])).unwrap();
        assert_eq!(areas(&resolved).admin_level, AdminLevel::Country);
    }

    #[test]
    fn test_level_needs_code_attribute() {
        let err = resolve(&config(), &columns(&["#adm1+name", "#sector"])).unwrap_err();
        assert!(matches!(err, LayerError::NoGeocoding));
    }

    #[test]
    fn test_explicit_level_must_have_codes() {
        let mut cfg = config();
        cfg.admin_level = Some("#adm2".into());
        let err = resolve(&cfg, &columns(&["#adm1+code"])).unwrap_err();
        assert!(matches!(err, LayerError::MissingAdminCode(AdminLevel::Adm2)));

        let resolved = resolve(&cfg, &columns(&["#adm1+code", "#adm2+code"])).unwrap();
        assert_eq!(areas(&resolved).admin_level, AdminLevel::Adm2);
    }

    #[test]
    fn test_explicit_type_needs_coordinates() {
        let mut cfg = config();
        cfg.layer_type = Some("heat".into());
        let err = resolve(&cfg, &columns(&["#adm1+code"])).unwrap_err();
        assert!(matches!(err, LayerError::MissingCoordinates("heat")));

        let resolved = resolve(&cfg, &columns(&["#geo+lat", "#geo+lon"])).unwrap();
        assert_eq!(resolved.kind, LayerKind::Heat);
    }

    #[test]
    fn test_explicit_areas_over_coordinates() {
        let mut cfg = config();
        cfg.layer_type = Some("Areas".into());
        let resolved = resolve(&cfg, &columns(&["#geo+lat", "#geo+lon", "#adm1+code"])).unwrap();
        assert_eq!(areas(&resolved).admin_level, AdminLevel::Adm1);
    }

    #[test]
    fn test_quantity_priority() {
        let cols = columns(&["#adm1+code", "#population", "#targeted", "#reached+f"]);
        let resolved = resolve(&config(), &cols).unwrap();
        assert_eq!(
            areas(&resolved).aggregate,
            Aggregate::Sum(TagPattern::parse("#reached"))
        );

        let cols = columns(&["#adm1+code", "#indicator+num", "#indicator+text"]);
        let resolved = resolve(&config(), &cols).unwrap();
        assert_eq!(
            areas(&resolved).aggregate,
            Aggregate::Sum(TagPattern::parse("#indicator+num"))
        );
    }

    #[test]
    fn test_explicit_aggregation_wins() {
        let cols = columns(&["#adm1+code", "#population", "#inneed"]);

        let mut cfg = config();
        cfg.aggregate_type = Some("count".into());
        assert_eq!(areas(&resolve(&cfg, &cols).unwrap()).aggregate, Aggregate::Count);

        let mut cfg = config();
        cfg.aggregate_column = Some("#inneed".into());
        assert_eq!(
            areas(&resolve(&cfg, &cols).unwrap()).aggregate,
            Aggregate::Sum(TagPattern::parse("#inneed"))
        );

        let mut cfg = config();
        cfg.aggregate_type = Some("sum".into());
        let err = resolve(&cfg, &columns(&["#adm1+code"])).unwrap_err();
        assert!(matches!(err, LayerError::NoSumColumn));

        cfg.aggregate_type = Some("mean".into());
        let err = resolve(&cfg, &cols).unwrap_err();
        assert!(matches!(err, LayerError::UnknownAggregateType(ref t) if t == "mean"));
    }

    #[test]
    fn test_explicit_display_values_win() {
        let mut cfg = config();
        cfg.name = Some("3W".into());
        cfg.unit = Some("activities".into());
        cfg.alpha = Some(0.8);
        cfg.style = Some(StyleHint {
            stroke: Some(true),
            opacity: Some(0.2),
        });
        cfg.color_map = Some(vec![
            ColorStopSpec { percentage: 0.0, color: ColorSpec::Hex("#000000".into()) },
            ColorStopSpec { percentage: 1.0, color: ColorSpec::Rgb(Rgb::new(255, 255, 255)) },
        ]);

        let resolved = resolve(&cfg, &columns(&["#adm1+code"])).unwrap();
        assert_eq!(resolved.name, "3W");
        assert_eq!(resolved.unit, "activities");
        let settings = areas(&resolved);
        assert_eq!(settings.alpha, 0.8);
        assert_eq!(settings.legend.as_deref(), Some("Number of activities"));
        assert!(settings.stroke);
        assert_eq!(settings.no_data_opacity, 0.2);
        assert_eq!(settings.color_map.stops()[1].color, Rgb::new(255, 255, 255));

        cfg.legend = Some("Activities per region".into());
        let resolved = resolve(&cfg, &columns(&["#adm1+code"])).unwrap();
        assert_eq!(areas(&resolved).legend.as_deref(), Some("Activities per region"));
    }

    #[test]
    fn test_configuration_errors() {
        let cols = columns(&["#adm1+code"]);

        let err = resolve(&LayerConfig::default(), &cols).unwrap_err();
        assert!(matches!(err, LayerError::MissingUrl(_)));

        let mut cfg = config();
        cfg.layer_type = Some("bubbles".into());
        assert!(matches!(resolve(&cfg, &cols), Err(LayerError::UnknownType(_))));

        let mut cfg = config();
        cfg.admin_level = Some("#adm9".into());
        assert!(matches!(resolve(&cfg, &cols), Err(LayerError::UnknownAdminLevel(_))));

        let mut cfg = config();
        cfg.color_map = Some(vec![ColorStopSpec {
            percentage: 0.0,
            color: ColorSpec::Hex("#000000".into()),
        }]);
        assert!(matches!(resolve(&cfg, &cols), Err(LayerError::ColorMap(_))));

        assert!(matches!(resolve(&config(), &columns(&["#sector"])), Err(LayerError::NoGeocoding)));
    }
}
