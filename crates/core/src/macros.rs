//! Macros: first-class code blocks
//!
//! A macro is an immutable sequence of instructions produced by the parser
//! (or assembled with [`MacroBuilder`]). The core treats it as an opaque
//! executable unit: run it against a stack, get the stack back or an error.
//!
//! Execution checks the stack's cancellation token before each instruction,
//! which is what lets a timed-out worker stop between operator calls.

use crate::error::{Result, ScriptError};
use crate::operator::Operator;
use crate::stack::Stack;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// One step of a macro
#[derive(Clone)]
pub enum Instruction {
    /// Push a constant
    Push(Value),
    /// Invoke an operator
    Call(Arc<dyn Operator>),
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Push(v) => write!(f, "Push({:?})", v),
            Instruction::Call(op) => write!(f, "Call({})", op.name()),
        }
    }
}

/// Named or anonymous instruction sequence
#[derive(Debug, Clone, Default)]
pub struct Macro {
    name: Option<String>,
    body: Vec<Instruction>,
}

impl Macro {
    pub fn new(name: Option<String>, body: Vec<Instruction>) -> Self {
        Self { name, body }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn body(&self) -> &[Instruction] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Run every instruction against `stack`, stopping at the first error
    pub fn exec(&self, stack: &mut Stack) -> Result<()> {
        for instruction in &self.body {
            if stack.is_cancelled() {
                return Err(ScriptError::Cancelled);
            }
            match instruction {
                Instruction::Push(value) => stack.push(value.clone()),
                Instruction::Call(op) => op.apply(stack)?,
            }
        }
        Ok(())
    }
}

/// Incremental macro assembly
#[derive(Debug, Default)]
pub struct MacroBuilder {
    name: Option<String>,
    body: Vec<Instruction>,
}

impl MacroBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            body: Vec::new(),
        }
    }

    pub fn push(mut self, value: impl Into<Value>) -> Self {
        self.body.push(Instruction::Push(value.into()));
        self
    }

    pub fn call(mut self, op: Arc<dyn Operator>) -> Self {
        self.body.push(Instruction::Call(op));
        self
    }

    pub fn build(self) -> Macro {
        Macro::new(self.name, self.body)
    }
}
