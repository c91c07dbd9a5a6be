// Coordinates, bounding boxes and administrative boundary geometry
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// An axis-aligned latitude/longitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn from_point(point: LatLng) -> Self {
        Self {
            south: point.lat,
            west: point.lng,
            north: point.lat,
            east: point.lng,
        }
    }

    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLng>,
    {
        let mut points = points.into_iter();
        let mut bounds = Self::from_point(points.next()?);
        for point in points {
            bounds.extend(point);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, point: LatLng) {
        self.south = self.south.min(point.lat);
        self.west = self.west.min(point.lng);
        self.north = self.north.max(point.lat);
        self.east = self.east.max(point.lng);
    }

    pub fn merge(&mut self, other: &Bounds) {
        self.extend(LatLng::new(other.south, other.west));
        self.extend(LatLng::new(other.north, other.east));
    }
}

/// Merge optional extents, skipping the missing ones.
pub fn merge_bounds<I>(all: I) -> Option<Bounds>
where
    I: IntoIterator<Item = Option<Bounds>>,
{
    all.into_iter().flatten().reduce(|mut acc, b| {
        acc.merge(&b);
        acc
    })
}

pub type Contour = Vec<LatLng>;

/// A boundary feature in render order (latitude first).
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryFeature {
    pub properties: Map<String, Value>,
    pub contours: Vec<Contour>,
}

impl BoundaryFeature {
    /// String form of a property; numeric codes are stringified.
    pub fn property_str(&self, name: &str) -> Option<String> {
        match self.properties.get(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.contours.iter().flatten().copied())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundaryCollection {
    pub features: Vec<BoundaryFeature>,
}

impl BoundaryCollection {
    pub fn bounds(&self) -> Option<Bounds> {
        merge_bounds(self.features.iter().map(BoundaryFeature::bounds))
    }
}

// GeoJSON as served by the boundary service (longitude first).

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeoJsonCollection {
    #[serde(default)]
    pub features: Vec<GeoJsonFeature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoJsonFeature {
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub geometry: Option<GeoJsonGeometry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
    #[serde(other)]
    Unsupported,
}

impl GeoJsonCollection {
    /// Convert to render order, swapping every (lon, lat) pair.
    pub fn into_boundaries(self) -> BoundaryCollection {
        let features = self
            .features
            .into_iter()
            .map(|feature| BoundaryFeature {
                properties: feature.properties.unwrap_or_default(),
                contours: feature.geometry.map(contours).unwrap_or_default(),
            })
            .collect();
        BoundaryCollection { features }
    }
}

fn contours(geometry: GeoJsonGeometry) -> Vec<Contour> {
    match geometry {
        GeoJsonGeometry::Polygon { coordinates } => {
            coordinates.into_iter().map(swap_ring).collect()
        }
        GeoJsonGeometry::MultiPolygon { coordinates } => coordinates
            .into_iter()
            .flatten()
            .map(swap_ring)
            .collect(),
        GeoJsonGeometry::Unsupported => Vec::new(),
    }
}

fn swap_ring(ring: Vec<Vec<f64>>) -> Contour {
    ring.into_iter()
        .filter_map(|position| match position.as_slice() {
            [lng, lat, ..] => Some(LatLng::new(*lat, *lng)),
            _ => None,
        })
        .collect()
}
