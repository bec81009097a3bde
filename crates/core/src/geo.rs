//! Geographic shapes for location-aware operators
//!
//! A [`GeoShape`] is a union of latitude/longitude boxes. It answers the two
//! questions geo operators ask: does a point fall inside the shape, and do two
//! shapes overlap.

use crate::series::GeoTimeSeries;

/// A WGS84 position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Closed latitude/longitude rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBox {
    /// Build a box from two opposite corners, in any order
    pub fn new(a: GeoPoint, b: GeoPoint) -> Self {
        Self {
            south: a.lat.min(b.lat),
            north: a.lat.max(b.lat),
            west: a.lon.min(b.lon),
            east: a.lon.max(b.lon),
        }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lon >= self.west
            && point.lon <= self.east
    }

    pub fn overlaps(&self, other: &GeoBox) -> bool {
        self.south <= other.north
            && other.south <= self.north
            && self.west <= other.east
            && other.west <= self.east
    }
}

/// Union of boxes covering an area
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoShape {
    cells: Vec<GeoBox>,
}

impl GeoShape {
    pub fn new(cells: Vec<GeoBox>) -> Self {
        Self { cells }
    }

    /// Shape made of a single box
    pub fn rect(a: GeoPoint, b: GeoPoint) -> Self {
        Self::new(vec![GeoBox::new(a, b)])
    }

    pub fn cells(&self) -> &[GeoBox] {
        &self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.cells.iter().any(|cell| cell.contains(point))
    }

    /// True when any cell of `self` overlaps any cell of `other`
    pub fn intersects(&self, other: &GeoShape) -> bool {
        self.cells
            .iter()
            .any(|a| other.cells.iter().any(|b| a.overlaps(b)))
    }

    /// True when at least one located point of the series falls inside
    pub fn intersects_series(&self, series: &GeoTimeSeries) -> bool {
        series
            .points()
            .iter()
            .filter_map(|p| p.location.as_ref())
            .any(|loc| self.contains(loc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris() -> GeoShape {
        GeoShape::rect(GeoPoint::new(48.80, 2.25), GeoPoint::new(48.90, 2.42))
    }

    #[test]
    fn test_box_corners_are_normalized() {
        let b = GeoBox::new(GeoPoint::new(10.0, 20.0), GeoPoint::new(-5.0, 3.0));
        assert_eq!(b.south, -5.0);
        assert_eq!(b.north, 10.0);
        assert_eq!(b.west, 3.0);
        assert_eq!(b.east, 20.0);
    }

    #[test]
    fn test_contains_includes_edges() {
        let shape = paris();
        assert!(shape.contains(&GeoPoint::new(48.85, 2.35)));
        assert!(shape.contains(&GeoPoint::new(48.80, 2.25)));
        assert!(!shape.contains(&GeoPoint::new(45.76, 4.83)));
    }

    #[test]
    fn test_intersects_is_symmetric() {
        let a = paris();
        let b = GeoShape::rect(GeoPoint::new(48.88, 2.40), GeoPoint::new(49.0, 2.6));
        let c = GeoShape::rect(GeoPoint::new(43.0, 5.0), GeoPoint::new(44.0, 6.0));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
        assert!(!c.intersects(&a));
    }

    #[test]
    fn test_empty_shape_intersects_nothing() {
        let empty = GeoShape::default();
        assert!(empty.is_empty());
        assert!(!empty.intersects(&paris()));
        assert!(!empty.contains(&GeoPoint::new(0.0, 0.0)));
    }
}
