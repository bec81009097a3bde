//! Operator registry
//!
//! Maps operator names to shared [`Operator`] instances. The interpreter
//! resolves each word once, then calls `apply` on the stored instance.

use crate::base58::{B58To, ToB58};
use crate::config::Properties;
use crate::geo_ops::{GeoFilter, GeoIntersects, geo_within};
use crate::mapping::Mapping;
use crate::render::{Snapshot, ToJson};
use crate::timebox::TimeBox;
use std::collections::HashMap;
use std::sync::Arc;
use tempo_core::{Operator, Result, ScriptError, Stack};
use tracing::trace;

#[derive(Default)]
pub struct Registry {
    operators: HashMap<String, Arc<dyn Operator>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in operator, configured from `props`
    pub fn standard(props: &Properties) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(B58To::new("B58->", false)));
        registry.register(Arc::new(B58To::new("B58C->", true)));
        registry.register(Arc::new(ToB58::new("->B58", false)));
        registry.register(Arc::new(ToB58::new("->B58C", true)));
        registry.register(Arc::new(GeoIntersects::new("GEO.INTERSECTS")));
        registry.register(Arc::new(geo_within("GEO.WITHIN")));
        registry.register(Arc::new(Mapping(GeoFilter::new("GEO.FILTER"))));
        registry.register(Arc::new(TimeBox::new("TIMEBOX", props)?));
        registry.register(Arc::new(Snapshot::new("SNAPSHOT", props)));
        registry.register(Arc::new(ToJson::new("->JSON", props)));
        Ok(registry)
    }

    /// Add `op` under its own name, replacing any previous entry
    pub fn register(&mut self, op: Arc<dyn Operator>) {
        let name = op.name().to_string();
        trace!(name = %name, "registering operator");
        self.operators.insert(name, op);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Operator>> {
        self.operators.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Look up `name` and apply it to `stack`
    pub fn invoke(&self, name: &str, stack: &mut Stack) -> Result<()> {
        let op = self
            .operators
            .get(name)
            .ok_or_else(|| ScriptError::UnknownOperator(name.to_string()))?;
        op.apply(stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_core::{FnOperator, Value};

    #[test]
    fn test_standard_names() {
        let registry = Registry::standard(&Properties::new()).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "->B58",
                "->B58C",
                "->JSON",
                "B58->",
                "B58C->",
                "GEO.FILTER",
                "GEO.INTERSECTS",
                "GEO.WITHIN",
                "SNAPSHOT",
                "TIMEBOX",
            ]
        );
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = Registry::new();
        registry.register(Arc::new(FnOperator::new("ONE", |s: &mut Stack| {
            s.push(1);
            Ok(())
        })));
        registry.register(Arc::new(FnOperator::new("ONE", |s: &mut Stack| {
            s.push(2);
            Ok(())
        })));
        assert_eq!(registry.len(), 1);

        let mut stack = Stack::new();
        registry.invoke("ONE", &mut stack).unwrap();
        assert_eq!(stack.pop().unwrap(), Value::Int(2));
    }

    #[test]
    fn test_unknown_operator() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        let err = registry.invoke("NOPE", &mut Stack::new()).unwrap_err();
        assert_eq!(err.to_string(), "unknown operator: NOPE");
    }

    #[test]
    fn test_standard_rejects_bad_time_units() {
        let props = Properties::new().with(crate::config::keys::TIME_UNITS, "weeks");
        assert!(Registry::standard(&props).is_err());
    }
}
