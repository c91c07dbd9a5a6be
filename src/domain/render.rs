// Render-ready overlays handed to the map surface
use super::color::{color_for, Color, ColorMap, Rgb};
use super::geometry::{Contour, LatLng};
use serde::Serialize;

/// Legend swatches run from 0% to 100% in 5% steps.
const LEGEND_STEPS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub position: LatLng,
    pub popup: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatLayer {
    pub points: Vec<LatLng>,
    pub radius: u32,
    pub min_opacity: f64,
}

impl HeatLayer {
    pub fn new(points: Vec<LatLng>) -> Self {
        Self {
            points,
            radius: 15,
            min_opacity: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaStyle {
    pub stroke: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

impl AreaStyle {
    pub fn filled(color: Color, stroke: bool) -> Self {
        Self {
            stroke,
            color: Some(color),
            opacity: None,
            weight: None,
        }
    }

    /// Neutral gray for areas with no matching data.
    pub fn no_data(stroke: bool, opacity: f64) -> Self {
        Self {
            stroke,
            color: Some(Color {
                rgb: Rgb::new(128, 128, 128),
                alpha: None,
            }),
            opacity: Some(opacity),
            weight: None,
        }
    }

    /// Thin gray outline for base boundary layers.
    pub fn outline() -> Self {
        Self {
            stroke: true,
            color: Some(Color {
                rgb: Rgb::new(0x88, 0x88, 0x88),
                alpha: None,
            }),
            opacity: None,
            weight: Some(1),
        }
    }

    pub fn unstyled(stroke: bool) -> Self {
        Self {
            stroke,
            color: None,
            opacity: None,
            weight: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaPolygon {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub contours: Vec<Contour>,
    pub style: AreaStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Overlay {
    Markers { markers: Vec<Marker>, cluster: bool },
    Heat(HeatLayer),
    Areas { polygons: Vec<AreaPolygon> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub swatches: Vec<Color>,
    pub min: String,
    pub max: String,
}

impl Legend {
    pub fn new(
        caption: Option<String>,
        color_map: &ColorMap,
        alpha: f64,
        min: f64,
        max: f64,
    ) -> Self {
        let swatches = (0..=LEGEND_STEPS)
            .map(|step| color_for(step as f64 / LEGEND_STEPS as f64, color_map, Some(alpha)))
            .collect();
        Self {
            caption,
            swatches,
            min: format_number(min),
            max: format_number(max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileLayer {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_zoom: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerControl {
    pub base_layers: Vec<String>,
    pub overlays: Vec<String>,
    pub sort: bool,
}

pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Group thousands and keep at most three fraction digits: `12,345.679`.
pub fn format_number(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    let rounded = (n * 1000.0).round() / 1000.0;
    let text = format!("{:.3}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded < 0.0 { "-" } else { "" };
    if fraction.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(1234.0), "1,234");
        assert_eq!(format_number(1234567.891), "1,234,567.891");
        assert_eq!(format_number(-12345.5), "-12,345.5");
        assert_eq!(format_number(0.12345), "0.123");
        assert_eq!(format_number(-0.0001), "0");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &apos;Jerry&apos;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_legend_swatches() {
        let caption = Some("Number of people".into());
        let legend = Legend::new(caption, &ColorMap::default(), 0.5, 0.0, 2500.0);
        assert_eq!(legend.swatches.len(), 21);
        assert_eq!(legend.swatches[0].to_string(), "rgba(128,208,199,0.5)");
        assert_eq!(legend.swatches[20].to_string(), "rgba(19,84,122,0.5)");
        assert_eq!(legend.min, "0");
        assert_eq!(legend.max, "2,500");
    }

    #[test]
    fn test_overlay_serialization() {
        let overlay = Overlay::Areas {
            polygons: vec![AreaPolygon {
                code: Some("ML01".into()),
                contours: vec![vec![LatLng::new(1.0, 2.0)]],
                style: AreaStyle::no_data(false, 0.5),
                tooltip: None,
            }],
        };
        let json = serde_json::to_value(&overlay).unwrap();
        assert_eq!(json["type"], "areas");
        assert_eq!(json["polygons"][0]["style"]["color"], "rgb(128,128,128)");
        assert_eq!(json["polygons"][0]["style"]["opacity"], 0.5);
        assert!(json["polygons"][0].get("tooltip").is_none());
    }
}
