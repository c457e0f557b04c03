use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Group,
    Unit,
    Row,
    Column,
    Selector,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IndexKind::Group => "group",
            IndexKind::Unit => "unit",
            IndexKind::Row => "row",
            IndexKind::Column => "column",
            IndexKind::Selector => "selector",
        };
        f.write_str(label)
    }
}

/// Index-based lookup outside the live bounds of the model or the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{kind} index {index} out of range (len {len})")]
pub struct OutOfRange {
    pub kind: IndexKind,
    pub index: usize,
    pub len: usize,
}

impl OutOfRange {
    pub fn new(kind: IndexKind, index: usize, len: usize) -> Self {
        Self { kind, index, len }
    }

    /// Returns `Ok(index)` when `index < len`.
    pub fn check(kind: IndexKind, index: usize, len: usize) -> Result<usize, Self> {
        if index < len {
            Ok(index)
        } else {
            Err(Self::new(kind, index, len))
        }
    }
}
