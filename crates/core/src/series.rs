//! Geo time series element model
//!
//! A [`GeoTimeSeries`] is a named, labeled, ordered collection of data points.
//! Each point has a timestamp (platform time units), a numeric value and an
//! optional location.

use crate::geo::GeoPoint;
use std::collections::BTreeMap;

/// A single timestamped measurement
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub timestamp: i64,
    pub value: f64,
    pub location: Option<GeoPoint>,
}

/// Class name, labels and points
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoTimeSeries {
    class: String,
    labels: BTreeMap<String, String>,
    points: Vec<DataPoint>,
}

impl GeoTimeSeries {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            labels: BTreeMap::new(),
            points: Vec::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn push(&mut self, timestamp: i64, value: f64, location: Option<GeoPoint>) {
        self.points.push(DataPoint {
            timestamp,
            value,
            location,
        });
    }

    /// Order points by timestamp (stable, so equal timestamps keep insertion order)
    pub fn sort(&mut self) {
        self.points.sort_by_key(|p| p.timestamp);
    }

    /// Copy of this series keeping class, labels and the points matching `keep`
    pub fn filtered<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&DataPoint) -> bool,
    {
        Self {
            class: self.class.clone(),
            labels: self.labels.clone(),
            points: self.points.iter().filter(|p| keep(p)).cloned().collect(),
        }
    }
}
