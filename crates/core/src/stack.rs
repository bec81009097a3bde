//! Evaluation stack
//!
//! The stack is owned by the interpreter loop for one script execution.
//! Operators receive `&mut Stack`, pop their inputs and push their outputs.
//!
//! Index convention: `get(0)` is the top of the stack, `get(1)` the value
//! beneath it, and so on.
//!
//! Each stack carries a [`CancelToken`]. Macro execution checks it before
//! every instruction; long-running operators poll [`Stack::is_cancelled`].

use crate::error::{Result, ScriptError};
use crate::macros::Macro;
use crate::value::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    parent: Option<CancelToken>,
}

/// Cooperative cancellation flag shared between a caller and its workers
///
/// A child token reports cancellation when it, or any of its ancestors, has
/// been cancelled. Cancelling a child never affects the parent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<TokenState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a token that is cancelled along with `self`
    pub fn child(&self) -> Self {
        Self {
            state: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        let mut current = Some(self);
        while let Some(token) = current {
            if token.state.cancelled.load(Ordering::Acquire) {
                return true;
            }
            current = token.state.parent.as_ref();
        }
        false
    }
}

/// Ordered, mutable sequence of values
#[derive(Debug, Clone, Default)]
pub struct Stack {
    values: Vec<Value>,
    token: CancelToken,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stack pre-filled with `values`, last element on top
    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            values,
            token: CancelToken::new(),
        }
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.values.push(value.into());
    }

    pub fn pop(&mut self) -> Result<Value> {
        self.values.pop().ok_or(ScriptError::Underflow)
    }

    pub fn peek(&self) -> Result<&Value> {
        self.values.last().ok_or(ScriptError::Underflow)
    }

    /// Value at `index` levels below the top (0 = top)
    pub fn get(&self, index: usize) -> Result<&Value> {
        let len = self.values.len();
        if index >= len {
            return Err(ScriptError::Underflow);
        }
        Ok(&self.values[len - 1 - index])
    }

    pub fn depth(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check that at least `count` values are available before mutating
    ///
    /// Fails with an arity error naming the operator.
    pub fn require(&self, name: &str, count: usize) -> Result<()> {
        if self.values.len() < count {
            return Err(ScriptError::Arity {
                name: name.to_string(),
                expected: count,
                found: self.values.len(),
            });
        }
        Ok(())
    }

    /// Execute a macro against this stack
    pub fn exec(&mut self, code: &Macro) -> Result<()> {
        code.exec(self)
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Independent copy of the values, carrying a different cancellation token
    pub fn fork(&self, token: CancelToken) -> Stack {
        Stack {
            values: self.values.clone(),
            token,
        }
    }

    /// Replace the contents, keeping this stack's token
    pub fn replace_values(&mut self, values: Vec<Value>) {
        self.values = values;
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Values from bottom to top
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_order() {
        let mut stack = Stack::new();
        stack.push(1);
        stack.push("two");
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop().unwrap(), Value::from("two"));
        assert_eq!(stack.pop().unwrap(), Value::Int(1));
        assert!(matches!(stack.pop(), Err(ScriptError::Underflow)));
    }

    #[test]
    fn test_get_counts_from_top() {
        let stack = Stack::from_values(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(stack.get(0).unwrap(), &Value::Int(3));
        assert_eq!(stack.get(2).unwrap(), &Value::Int(1));
        assert!(stack.get(3).is_err());
        assert_eq!(stack.peek().unwrap(), &Value::Int(3));
    }

    #[test]
    fn test_require_reports_arity() {
        let stack = Stack::from_values(vec![Value::Int(1)]);
        assert!(stack.require("SWAP", 1).is_ok());
        match stack.require("SWAP", 2) {
            Err(ScriptError::Arity {
                name,
                expected,
                found,
            }) => {
                assert_eq!(name, "SWAP");
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("Expected arity error, got {:?}", other),
        }
    }

    #[test]
    fn test_child_token_follows_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        let grandchild = child.child();
        assert!(!grandchild.is_cancelled());

        parent.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn test_cancelling_child_leaves_parent_alone() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_fork_is_independent() {
        let mut stack = Stack::from_values(vec![Value::Int(1)]);
        let token = stack.cancel_token().child();
        let mut forked = stack.fork(token);
        forked.push(2);
        forked.cancel_token().cancel();

        assert_eq!(stack.depth(), 1);
        assert!(!stack.is_cancelled());
        assert!(forked.is_cancelled());

        stack.replace_values(forked.into_values());
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn test_fork_shares_large_payloads() {
        let stack = Stack::from_values(vec![
            Value::bytes(vec![7u8; 1 << 20]),
            Value::from("x".repeat(1 << 20)),
        ]);
        let forked = stack.fork(stack.cancel_token().child());
        match (stack.get(1).unwrap(), forked.get(1).unwrap()) {
            (Value::Bytes(a), Value::Bytes(b)) => assert!(Arc::ptr_eq(a, b)),
            other => panic!("Expected BYTES, got {:?}", other),
        }
        match (stack.peek().unwrap(), forked.peek().unwrap()) {
            (Value::String(a), Value::String(b)) => assert!(Arc::ptr_eq(a, b)),
            other => panic!("Expected STRING, got {:?}", other),
        }
    }
}
