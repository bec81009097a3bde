//! Operator contract
//!
//! Every word the interpreter can dispatch implements [`Operator`]. An
//! operator is built once at registration time and shared (behind `Arc`)
//! across concurrent executions on independent stacks, so it must not hold
//! mutable state between invocations.
//!
//! # Contract
//!
//! - `apply` pops its inputs and pushes its outputs.
//! - Arity and type are checked before the stack is mutated beyond the values
//!   already consumed (`Stack::require` first, then pop).
//! - Every error names the operator through [`Operator::name`].
//! - No reference to the stack is retained after `apply` returns.

use crate::error::Result;
use crate::stack::Stack;
use std::fmt;

pub trait Operator: Send + Sync {
    /// Display name used in diagnostics and error messages
    fn name(&self) -> &str;

    /// Transform the stack in place
    fn apply(&self, stack: &mut Stack) -> Result<()>;
}

impl fmt::Debug for dyn Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<operator {}>", self.name())
    }
}

/// Operator backed by a closure
///
/// ```ignore
/// let dup = FnOperator::new("DUP", |stack| {
///     stack.require("DUP", 1)?;
///     let top = stack.peek()?.clone();
///     stack.push(top);
///     Ok(())
/// });
/// ```
pub struct FnOperator<F> {
    name: String,
    func: F,
}

impl<F> FnOperator<F>
where
    F: Fn(&mut Stack) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Operator for FnOperator<F>
where
    F: Fn(&mut Stack) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, stack: &mut Stack) -> Result<()> {
        (self.func)(stack)
    }
}
