// Color maps and gradient interpolation
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ColorMapError {
    #[error("a color map needs at least 2 stops, got {0}")]
    TooFewStops(usize),
    #[error("color stop {index} has percentage {percentage}, below the previous stop")]
    Unordered { index: usize, percentage: f64 },
    #[error("color stop {index} has a non-finite percentage")]
    NonFinite { index: usize },
    #[error("'{0}' is not a 6-digit hex color")]
    BadHex(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` (the `#` is optional).
    pub fn from_hex(hex: &str) -> Result<Self, ColorMapError> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorMapError::BadHex(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| ColorMapError::BadHex(hex.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// A stop color as written in a layer configuration: either `{r, g, b}` or
/// a hex string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Rgb(Rgb),
    Hex(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColorStopSpec {
    pub percentage: f64,
    pub color: ColorSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorStop {
    pub percentage: f64,
    pub color: Rgb,
}

/// A validated gradient: at least two stops, percentages non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorMap {
    stops: Vec<ColorStop>,
}

impl ColorMap {
    pub fn new(stops: Vec<ColorStop>) -> Result<Self, ColorMapError> {
        if stops.len() < 2 {
            return Err(ColorMapError::TooFewStops(stops.len()));
        }
        for (index, stop) in stops.iter().enumerate() {
            if !stop.percentage.is_finite() {
                return Err(ColorMapError::NonFinite { index });
            }
            if index > 0 && stop.percentage < stops[index - 1].percentage {
                return Err(ColorMapError::Unordered {
                    index,
                    percentage: stop.percentage,
                });
            }
        }
        Ok(Self { stops })
    }

    pub fn from_specs(specs: &[ColorStopSpec]) -> Result<Self, ColorMapError> {
        let stops = specs
            .iter()
            .map(|spec| {
                let color = match &spec.color {
                    ColorSpec::Rgb(rgb) => *rgb,
                    ColorSpec::Hex(hex) => Rgb::from_hex(hex)?,
                };
                Ok(ColorStop {
                    percentage: spec.percentage,
                    color,
                })
            })
            .collect::<Result<Vec<_>, ColorMapError>>()?;
        Self::new(stops)
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }
}

impl Default for ColorMap {
    /// Light teal to dark blue.
    fn default() -> Self {
        Self {
            stops: vec![
                ColorStop {
                    percentage: 0.0,
                    color: Rgb::new(0x80, 0xd0, 0xc7),
                },
                ColorStop {
                    percentage: 1.0,
                    color: Rgb::new(0x13, 0x54, 0x7a),
                },
            ],
        }
    }
}

/// An interpolated color, rendered as CSS `rgb(..)` or `rgba(..)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub rgb: Rgb,
    pub alpha: Option<f64>,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Rgb { r, g, b } = self.rgb;
        match self.alpha {
            Some(alpha) => write!(f, "rgba({},{},{},{})", r, g, b, alpha),
            None => write!(f, "rgb({},{},{})", r, g, b),
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Interpolate a color for `percentage` along `color_map`.
///
/// The segment is the first stop whose percentage exceeds the input and its
/// predecessor, clamped to the first and last segments. Channels are
/// interpolated independently and floored.
pub fn color_for(percentage: f64, color_map: &ColorMap, alpha: Option<f64>) -> Color {
    let stops = color_map.stops();
    let mut i = 1;
    while i < stops.len() - 1 && percentage >= stops[i].percentage {
        i += 1;
    }
    let lower = stops[i - 1];
    let upper = stops[i];

    let range = upper.percentage - lower.percentage;
    let t = if range > 0.0 {
        ((percentage - lower.percentage) / range).clamp(0.0, 1.0)
    } else {
        1.0
    };

    let mix = |a: u8, b: u8| -> u8 {
        (a as f64 * (1.0 - t) + b as f64 * t).floor().clamp(0.0, 255.0) as u8
    };

    Color {
        rgb: Rgb::new(
            mix(lower.color.r, upper.color.r),
            mix(lower.color.g, upper.color.g),
            mix(lower.color.b, upper.color.b),
        ),
        alpha,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn black_to_white() -> ColorMap {
        let specs: Vec<ColorStopSpec> = serde_json::from_str(
            r##"[{"percentage": 0.0, "color": "#000000"},
                 {"percentage": 1.0, "color": "#FFFFFF"}]"##,
        )
        .unwrap();
        ColorMap::from_specs(&specs).unwrap()
    }

    fn three_stops() -> ColorMap {
        ColorMap::new(vec![
            ColorStop { percentage: 0.0, color: Rgb::new(255, 0, 0) },
            ColorStop { percentage: 0.5, color: Rgb::new(0, 255, 0) },
            ColorStop { percentage: 1.0, color: Rgb::new(0, 0, 255) },
        ])
        .unwrap()
    }

    #[test]
    fn test_midpoint_floors() {
        let color = color_for(0.5, &black_to_white(), None);
        assert_eq!(color.to_string(), "rgb(127,127,127)");
    }

    #[test]
    fn test_alpha_renders_rgba() {
        let color = color_for(1.0, &black_to_white(), Some(0.5));
        assert_eq!(color.to_string(), "rgba(255,255,255,0.5)");
    }

    #[test]
    fn test_default_map_endpoints() {
        let map = ColorMap::default();
        assert_eq!(color_for(0.0, &map, None).rgb, Rgb::new(0x80, 0xd0, 0xc7));
        assert_eq!(color_for(1.0, &map, None).rgb, Rgb::new(0x13, 0x54, 0x7a));
    }

    #[test]
    fn test_middle_stop_selects_segment() {
        let map = three_stops();
        assert_eq!(color_for(0.5, &map, None).rgb, Rgb::new(0, 255, 0));
        assert_eq!(color_for(0.25, &map, None).rgb, Rgb::new(127, 127, 0));
        assert_eq!(color_for(0.75, &map, None).rgb, Rgb::new(0, 127, 127));
    }

    #[test]
    fn test_out_of_range_clamps_to_end_segments() {
        let map = three_stops();
        assert_eq!(color_for(-1.0, &map, None).rgb, Rgb::new(255, 0, 0));
        assert_eq!(color_for(2.0, &map, None).rgb, Rgb::new(0, 0, 255));
    }

    #[test]
    fn test_monotonic_within_segments() {
        let map = three_stops();
        let mut previous = color_for(0.0, &map, None).rgb;
        for step in 1..=50 {
            let rgb = color_for(step as f64 / 100.0, &map, None).rgb;
            assert!(rgb.r <= previous.r);
            assert!(rgb.g >= previous.g);
            previous = rgb;
        }
        let mut previous = color_for(0.5, &map, None).rgb;
        for step in 51..=100 {
            let rgb = color_for(step as f64 / 100.0, &map, None).rgb;
            assert!(rgb.g <= previous.g);
            assert!(rgb.b >= previous.b);
            previous = rgb;
        }
    }

    #[test]
    fn test_zero_width_segment() {
        let map = ColorMap::new(vec![
            ColorStop { percentage: 0.0, color: Rgb::new(0, 0, 0) },
            ColorStop { percentage: 0.0, color: Rgb::new(10, 10, 10) },
        ])
        .unwrap();
        assert_eq!(color_for(0.0, &map, None).rgb, Rgb::new(10, 10, 10));
    }

    #[test]
    fn test_malformed_maps_are_errors() {
        let one = vec![ColorStopSpec {
            percentage: 0.0,
            color: ColorSpec::Hex("#000000".into()),
        }];
        assert_eq!(ColorMap::from_specs(&one), Err(ColorMapError::TooFewStops(1)));

        let bad_hex = vec![
            ColorStopSpec { percentage: 0.0, color: ColorSpec::Hex("#00000".into()) },
            ColorStopSpec { percentage: 1.0, color: ColorSpec::Hex("#FFFFFF".into()) },
        ];
        assert_eq!(
            ColorMap::from_specs(&bad_hex),
            Err(ColorMapError::BadHex("#00000".into()))
        );

        let unordered = vec![
            ColorStopSpec { percentage: 0.8, color: ColorSpec::Rgb(Rgb::new(0, 0, 0)) },
            ColorStopSpec { percentage: 0.2, color: ColorSpec::Rgb(Rgb::new(1, 1, 1)) },
        ];
        assert!(matches!(
            ColorMap::from_specs(&unordered),
            Err(ColorMapError::Unordered { index: 1, .. })
        ));
    }

    #[test]
    fn test_hex_parsing() {
        assert_eq!(Rgb::from_hex("#80d0C7").unwrap(), Rgb::new(0x80, 0xd0, 0xc7));
        assert_eq!(Rgb::from_hex("13547a").unwrap(), Rgb::new(0x13, 0x54, 0x7a));
        assert!(Rgb::from_hex("#gg0000").is_err());
        assert!(Rgb::from_hex("#ééé").is_err());
    }
}
