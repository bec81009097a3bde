//! Per-series mapping operators
//!
//! Many analytic operators share one shape: pop a few parameters, then
//! transform every time series beneath them the same way. A [`SeriesMapper`]
//! supplies the two varying parts and [`apply_mapper`] drives them:
//!
//! 1. `retrieve_parameters` pops and validates the non-series arguments once.
//! 2. The series argument is popped: a single series yields a single result,
//!    a list yields a list of results in the same order (nested lists map
//!    recursively).
//! 3. Every result is computed before anything is pushed, so a failure on one
//!    element leaves no partial output behind.
//!
//! ```text
//! gts shape GEO.INTERSECTS       # ( GTS GEOSHAPE -- BOOLEAN )
//! [ gts1 gts2 ] shape GEO.WITHIN # ( LIST GEOSHAPE -- LIST )
//! ```

use tempo_core::{GeoTimeSeries, Operator, Result, ScriptError, Stack, Value};

/// The two varying parts of a per-series operator
pub trait SeriesMapper: Send + Sync {
    /// Parameters extracted from the stack, consumed by every `series_op` call
    type Params;

    fn name(&self) -> &str;

    /// Pop and validate the non-series arguments
    fn retrieve_parameters(&self, stack: &mut Stack) -> Result<Self::Params>;

    /// Transform one series; must not depend on anything but its inputs
    fn series_op(&self, params: &Self::Params, series: &GeoTimeSeries) -> Result<Value>;
}

/// Generic driver: parameters once, then each series beneath them
pub fn apply_mapper<M>(mapper: &M, stack: &mut Stack) -> Result<()>
where
    M: SeriesMapper + ?Sized,
{
    let params = mapper.retrieve_parameters(stack)?;

    if stack.is_empty() {
        return Err(ScriptError::Arity {
            name: mapper.name().to_string(),
            expected: 1,
            found: 0,
        });
    }
    let target = stack.pop()?;
    let result = map_value(mapper, &params, &target)?;
    stack.push(result);
    Ok(())
}

fn map_value<M>(mapper: &M, params: &M::Params, value: &Value) -> Result<Value>
where
    M: SeriesMapper + ?Sized,
{
    match value {
        Value::Series(series) => mapper.series_op(params, series),
        Value::List(items) => items
            .iter()
            .map(|item| map_value(mapper, params, item))
            .collect::<Result<Vec<_>>>()
            .map(Value::list),
        other => Err(ScriptError::type_error(
            mapper.name(),
            format!(
                "operates on a Geo Time Series or a list thereof, got {}.",
                other.type_name()
            ),
        )),
    }
}

/// Operator built from a mapper, with no custom dispatch
pub struct Mapping<M>(pub M);

impl<M: SeriesMapper> Operator for Mapping<M> {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn apply(&self, stack: &mut Stack) -> Result<()> {
        apply_mapper(&self.0, stack)
    }
}

type RetrieveFn<P> = Box<dyn Fn(&str, &mut Stack) -> Result<P> + Send + Sync>;
type SeriesFn<P> = Box<dyn Fn(&P, &GeoTimeSeries) -> Result<Value> + Send + Sync>;

/// Mapper assembled from two closures
///
/// ```ignore
/// let count = ClosureMapper::new(
///     "COUNT.ABOVE",
///     |name, stack| match stack.pop()? {
///         Value::Float(t) => Ok(t),
///         _ => Err(ScriptError::type_error(name, "expects a threshold.")),
///     },
///     |threshold, gts| Ok(Value::Int(gts.points().iter().filter(|p| p.value > *threshold).count() as i64)),
/// );
/// registry.register(Arc::new(Mapping(count)));
/// ```
pub struct ClosureMapper<P> {
    name: String,
    retrieve: RetrieveFn<P>,
    op: SeriesFn<P>,
}

impl<P> ClosureMapper<P> {
    pub fn new<R, F>(name: impl Into<String>, retrieve: R, op: F) -> Self
    where
        R: Fn(&str, &mut Stack) -> Result<P> + Send + Sync + 'static,
        F: Fn(&P, &GeoTimeSeries) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            retrieve: Box::new(retrieve),
            op: Box::new(op),
        }
    }
}

impl<P> SeriesMapper for ClosureMapper<P> {
    type Params = P;

    fn name(&self) -> &str {
        &self.name
    }

    fn retrieve_parameters(&self, stack: &mut Stack) -> Result<P> {
        (self.retrieve)(&self.name, stack)
    }

    fn series_op(&self, params: &P, series: &GeoTimeSeries) -> Result<Value> {
        (self.op)(params, series)
    }
}
