// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Campus Map Contributors

use serde::{Deserialize, Serialize};

use crate::MapError;

/// A longitude/latitude pair. Serialized as `[lon, lat]`, the GeoJSON order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lon: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl From<[f64; 2]> for LngLat {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Self { lon, lat }
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(p: LngLat) -> Self {
        [p.lon, p.lat]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, MapError> {
        let finite = [west, south, east, north].iter().all(|v| v.is_finite());
        if !finite || west >= east || south >= north {
            return Err(MapError::InvalidBounds {
                west,
                south,
                east,
                north,
            });
        }
        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// Key under which fetched data for this box is cached.
    pub fn cache_key(&self) -> String {
        format!(
            "osm_data_{:.6}_{:.6}_{:.6}_{:.6}",
            self.west, self.south, self.east, self.north
        )
    }

    /// Overpass QL bbox filter, which is ordered `(south,west,north,east)`.
    pub fn overpass_filter(&self) -> String {
        format!("({},{},{},{})", self.south, self.west, self.north, self.east)
    }

    pub fn contains(&self, p: LngLat) -> bool {
        p.lon >= self.west && p.lon <= self.east && p.lat >= self.south && p.lat <= self.north
    }

    /// Clamps each coordinate against its own edges. Returns the clamped point
    /// and whether any edge had to be applied.
    pub fn clamp(&self, p: LngLat) -> (LngLat, bool) {
        let mut out = p;
        let mut corrected = false;

        if out.lon < self.west {
            out.lon = self.west;
            corrected = true;
        }
        if out.lon > self.east {
            out.lon = self.east;
            corrected = true;
        }
        if out.lat < self.south {
            out.lat = self.south;
            corrected = true;
        }
        if out.lat > self.north {
            out.lat = self.north;
            corrected = true;
        }

        (out, corrected)
    }

    /// Approximates the area shown by a flat (unpitched) camera over a
    /// `width` x `height` pixel viewport.
    pub fn visible_from(
        center: LngLat,
        zoom: f64,
        width: u32,
        height: u32,
    ) -> Result<Self, MapError> {
        let (cx, cy) = center.to_world(zoom);
        let half_w = f64::from(width) / 2.0;
        let half_h = f64::from(height) / 2.0;

        let south_west = LngLat::from_world(cx - half_w, cy + half_h, zoom);
        let north_east = LngLat::from_world(cx + half_w, cy - half_h, zoom);
        Self::new(
            south_west.lon,
            south_west.lat,
            north_east.lon,
            north_east.lat,
        )
    }
}

/// Web Mercator world size in pixels at zoom 0, matching 512px vector tiles.
const WORLD_PIXELS: f64 = 512.0;

impl LngLat {
    /// Projects to Web Mercator pixel coordinates at `zoom`, origin at the
    /// north-west corner of the world.
    fn to_world(self, zoom: f64) -> (f64, f64) {
        let size = WORLD_PIXELS * zoom.exp2();
        let x = (self.lon + 180.0) / 360.0 * size;
        let merc = self.lat.to_radians().tan().asinh();
        let y = (1.0 - merc / std::f64::consts::PI) / 2.0 * size;
        (x, y)
    }

    fn from_world(x: f64, y: f64, zoom: f64) -> Self {
        let size = WORLD_PIXELS * zoom.exp2();
        let merc = std::f64::consts::PI * (1.0 - 2.0 * y / size);
        LngLat::new(x / size * 360.0 - 180.0, merc.sinh().atan().to_degrees())
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = MapError;

    fn try_from([west, south, east, north]: [f64; 4]) -> Result<Self, Self::Error> {
        Self::new(west, south, east, north)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.west, b.south, b.east, b.north]
    }
}

impl std::str::FromStr for BoundingBox {
    type Err = MapError;

    /// Parses `west,south,east,north`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| MapError::BoundsSyntax(s.to_string()))?;

        match parts[..] {
            [w, s, e, n] => Self::new(w, s, e, n),
            _ => Err(MapError::BoundsSyntax(s.to_string())),
        }
    }
}

/// Mean of all ring vertices, skipping each ring's closing vertex.
/// Holes and every member polygon contribute. Returns `None` for geometry
/// kinds without rings or for empty coordinates.
pub fn centroid(geometry: &geojson::Value) -> Option<LngLat> {
    let mut sum_lon = 0.0;
    let mut sum_lat = 0.0;
    let mut count = 0usize;

    let mut add_ring = |ring: &[Vec<f64>]| {
        let open = match (ring.first(), ring.last()) {
            (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
            _ => ring,
        };
        for position in open {
            if let [lon, lat, ..] = position[..] {
                sum_lon += lon;
                sum_lat += lat;
                count += 1;
            }
        }
    };

    match geometry {
        geojson::Value::Polygon(rings) => rings.iter().for_each(|r| add_ring(r.as_slice())),
        geojson::Value::MultiPolygon(polygons) => polygons
            .iter()
            .flat_map(|rings| rings.iter())
            .for_each(|r| add_ring(r.as_slice())),
        _ => return None,
    }

    if count == 0 {
        return None;
    }
    Some(LngLat::new(sum_lon / count as f64, sum_lat / count as f64))
}
