use crate::domain::render::TileLayer;
use serde::Deserialize;
use std::collections::HashMap;

const ITOS_COD_SERVICE: &str = "https://gistmaps.itos.uga.edu/arcgis/rest/services/COD_External";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub sources: SourceSettings,
    #[serde(default = "default_basemaps")]
    pub basemaps: Vec<BasemapConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind_address: String,
}

/// Upstream URL templates. `${url}`, `${country}` and `${layer}` are
/// filled in per request.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceSettings {
    pub dataset_url: String,
    pub boundary_metadata_url: String,
    pub boundary_geometry_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BasemapConfig {
    pub name: String,
    pub url: String,
    pub attribution: Option<String>,
    pub max_zoom: Option<u8>,
}

impl BasemapConfig {
    pub fn to_tile_layer(&self) -> TileLayer {
        TileLayer {
            name: self.name.clone(),
            url: Some(self.url.clone()),
            attribution: self.attribution.clone(),
            max_zoom: self.max_zoom,
        }
    }
}

fn default_basemaps() -> Vec<BasemapConfig> {
    vec![BasemapConfig {
        name: "OpenStreetMap".to_string(),
        url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
        attribution: Some(
            "Map data &copy; <a href=\"https://www.openstreetmap.org/\">OpenStreetMap</a> contributors"
                .to_string(),
        ),
        max_zoom: Some(19),
    }]
}

/// Built-in defaults, then `config/hxlmaps.toml` if present, then
/// `HXLMAPS__SECTION__KEY` environment variables.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .set_default("server.bind_address", "0.0.0.0:8080")?
        .set_default(
            "sources.dataset_url",
            "https://proxy.hxlstandard.org/data.json?url=${url}",
        )?
        .set_default(
            "sources.boundary_metadata_url",
            format!("{}/${{country}}_pcode/MapServer?f=json", ITOS_COD_SERVICE),
        )?
        .set_default(
            "sources.boundary_geometry_url",
            format!(
                "{}/${{country}}_pcode/MapServer/${{layer}}/query?where=1%3D1&outFields=*&f=geojson",
                ITOS_COD_SERVICE
            ),
        )?
        .set_default("sources.timeout_secs", 30)?
        .add_source(config::File::with_name("config/hxlmaps").required(false))
        .add_source(
            config::Environment::with_prefix("HXLMAPS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace `${name}` placeholders in a URL template
pub fn prepare_url(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}
