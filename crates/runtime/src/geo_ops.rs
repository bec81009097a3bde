//! Location-aware series operators
//!
//! # API
//!
//! ```text
//! gts shape GEO.INTERSECTS      # ( GTS GEOSHAPE -- BOOLEAN ) some point inside
//! shape shape GEO.INTERSECTS    # ( GEOSHAPE GEOSHAPE -- BOOLEAN ) shapes overlap
//! gts shape GEO.WITHIN          # ( GTS GEOSHAPE -- BOOLEAN ) every point inside
//! gts shape GEO.FILTER          # ( GTS GEOSHAPE -- GTS ) points inside only
//! ```
//!
//! Each accepts a list of series in place of a single one (see `mapping`).

use crate::mapping::{ClosureMapper, Mapping, SeriesMapper, apply_mapper};
use std::sync::Arc;
use tempo_core::{GeoShape, GeoTimeSeries, Operator, Result, ScriptError, Stack, Value};

/// Pop the shape parameter, checking its type before consuming it
fn pop_shape(name: &str, stack: &mut Stack) -> Result<Arc<GeoShape>> {
    stack.require(name, 1)?;
    if !matches!(stack.peek()?, Value::Shape(_)) {
        return Err(ScriptError::type_error(
            name,
            "expects a geo shape on top of the stack.",
        ));
    }
    match stack.pop()? {
        Value::Shape(shape) => Ok(shape),
        _ => Err(ScriptError::Underflow),
    }
}

/// Checks whether a series has at least one point within a shape
pub struct GeoIntersects {
    name: String,
}

impl GeoIntersects {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SeriesMapper for GeoIntersects {
    type Params = Arc<GeoShape>;

    fn name(&self) -> &str {
        &self.name
    }

    fn retrieve_parameters(&self, stack: &mut Stack) -> Result<Arc<GeoShape>> {
        pop_shape(&self.name, stack)
    }

    fn series_op(&self, shape: &Arc<GeoShape>, series: &GeoTimeSeries) -> Result<Value> {
        Ok(Value::Bool(shape.intersects_series(series)))
    }
}

impl Operator for GeoIntersects {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, stack: &mut Stack) -> Result<()> {
        // Two shapes: direct overlap test, no parameter retrieval
        let overlap = match (stack.get(1), stack.get(0)) {
            (Ok(Value::Shape(a)), Ok(Value::Shape(b))) => Some(a.intersects(b)),
            _ => None,
        };
        if let Some(overlap) = overlap {
            stack.pop()?;
            stack.pop()?;
            stack.push(overlap);
            return Ok(());
        }
        apply_mapper(self, stack)
    }
}

/// True when the series has points and every one of them lies within the shape
///
/// Points without a location count as outside.
pub fn geo_within(name: impl Into<String>) -> Mapping<ClosureMapper<Arc<GeoShape>>> {
    Mapping(ClosureMapper::new(
        name,
        pop_shape,
        |shape: &Arc<GeoShape>, series: &GeoTimeSeries| {
            let inside = !series.is_empty()
                && series
                    .points()
                    .iter()
                    .all(|p| p.location.as_ref().is_some_and(|loc| shape.contains(loc)));
            Ok(Value::Bool(inside))
        },
    ))
}

/// Keeps only the points located within a shape
///
/// Class, labels and timestamp order are preserved.
pub struct GeoFilter {
    name: String,
}

impl GeoFilter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SeriesMapper for GeoFilter {
    type Params = Arc<GeoShape>;

    fn name(&self) -> &str {
        &self.name
    }

    fn retrieve_parameters(&self, stack: &mut Stack) -> Result<Arc<GeoShape>> {
        pop_shape(&self.name, stack)
    }

    fn series_op(&self, shape: &Arc<GeoShape>, series: &GeoTimeSeries) -> Result<Value> {
        let kept = series.filtered(|p| p.location.as_ref().is_some_and(|loc| shape.contains(loc)));
        Ok(Value::series(kept))
    }
}
