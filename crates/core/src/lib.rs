//! Tempo Core: the foundation every Tempo operator builds on
//!
//! Scripts are sequences of named operators that push and pop values on a
//! shared evaluation stack. This crate defines what they share.
//!
//! Key design principles:
//! - Value: What scripts talk about (closed sum type, cheap to clone)
//! - Stack: Owned by the interpreter loop, lent to operators as `&mut Stack`
//! - Operator: Named, stateless unit of behavior dispatched by name
//!
//! # Modules
//!
//! - `error`: Error taxonomy shared by every operator
//! - `value`: Core Value enum (Int, Float, String, Bytes, Series, Shape, Macro, List)
//! - `stack`: Stack operations and cooperative cancellation
//! - `operator`: The Operator contract and closure-backed operators
//! - `macros`: Executable instruction sequences
//! - `series`: Geo time series element model
//! - `geo`: Geographic shapes

pub mod error;
pub mod geo;
pub mod macros;
pub mod operator;
pub mod series;
pub mod stack;
pub mod value;

// Re-export key types
pub use error::{ErrorKind, Result, ScriptError, format_panic_payload};
pub use geo::{GeoBox, GeoPoint, GeoShape};
pub use macros::{Instruction, Macro, MacroBuilder};
pub use operator::{FnOperator, Operator};
pub use series::{DataPoint, GeoTimeSeries};
pub use stack::{CancelToken, Stack};
pub use value::Value;
