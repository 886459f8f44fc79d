//! Containers, including [`BoundedStack`].
use std::error::Error;
use std::fmt::{Display, Formatter};

use super::diagnostic::ErrorKind;

/// Indicates failure of a push or pop on a [`BoundedStack`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) enum StackError {
    /// The stack already holds as many items as it may.
    Overflow,
    /// There is nothing to pop.
    Underflow,
}

impl Display for StackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StackError::Overflow => "stack is full",
            StackError::Underflow => "stack is empty",
        })
    }
}

impl Error for StackError {}

impl From<StackError> for ErrorKind {
    /// Pushing too deep is a nesting error; popping a stack which
    /// holds nothing means the `*` operand was used without a
    /// matching push.
    fn from(e: StackError) -> ErrorKind {
        match e {
            StackError::Overflow => ErrorKind::IllegalNesting,
            StackError::Underflow => ErrorKind::OperandField,
        }
    }
}

/// A LIFO stack with a fixed maximum depth.  The assembler's
/// pseudo-instructions which accept `*` to restore a previous setting
/// (`BASE`, `QUAL`, `SECTION`, `LIST`, `FORMAT`) save the setting
/// being replaced on one of these.
#[derive(Debug, PartialEq, Eq, Clone)]
pub(crate) struct BoundedStack<T> {
    items: Vec<T>,
    limit: usize,
}

impl<T> BoundedStack<T> {
    pub(crate) fn new(limit: usize) -> BoundedStack<T> {
        BoundedStack {
            items: Vec::with_capacity(limit),
            limit,
        }
    }

    pub(crate) fn push(&mut self, item: T) -> Result<(), StackError> {
        if self.items.len() >= self.limit {
            Err(StackError::Overflow)
        } else {
            self.items.push(item);
            Ok(())
        }
    }

    pub(crate) fn pop(&mut self) -> Result<T, StackError> {
        self.items.pop().ok_or(StackError::Underflow)
    }

    pub(crate) fn top(&self) -> Option<&T> {
        self.items.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}
