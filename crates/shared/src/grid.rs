//! Fixed coordinate space of the button grid and the device capability the
//! controller renders onto.
//!
//! Output positions are logical ([`Indicator`]); input arrives as raw
//! [`ControlId`]s which the controller decodes itself.

use crate::error::{IndexKind, OutOfRange};

/// Width and height of the data grid, and the length of the selector strip.
pub const GRID_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Indicator {
    /// Top strip, one per group.
    Selector(usize),
    Cell { row: usize, col: usize },
    /// Last position of a row; lit when the row holds a scalable unit.
    RowEnd(usize),
}

impl Indicator {
    pub fn selector(index: usize) -> Result<Self, OutOfRange> {
        OutOfRange::check(IndexKind::Selector, index, GRID_SIZE).map(Indicator::Selector)
    }

    pub fn cell(row: usize, col: usize) -> Result<Self, OutOfRange> {
        let row = OutOfRange::check(IndexKind::Row, row, GRID_SIZE)?;
        let col = OutOfRange::check(IndexKind::Column, col, GRID_SIZE)?;
        Ok(Indicator::Cell { row, col })
    }

    pub fn row_end(row: usize) -> Result<Self, OutOfRange> {
        OutOfRange::check(IndexKind::Row, row, GRID_SIZE).map(Indicator::RowEnd)
    }

    /// Re-checks a position that was built without the checked constructors.
    pub fn validate(self) -> Result<Self, OutOfRange> {
        match self {
            Indicator::Selector(index) => Self::selector(index),
            Indicator::Cell { row, col } => Self::cell(row, col),
            Indicator::RowEnd(row) => Self::row_end(row),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Off,
    DimRed,
    BrightRed,
    DimGreen,
    BrightGreen,
    DimAmber,
    BrightAmber,
    Yellow,
}

/// Raw identifier of a physical control as delivered by the device.
///
/// `Top` carries the controller number of a top-strip button, `Pad` the note
/// number of a square button (`row * 16 + col`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    Top(u8),
    Pad(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEvent {
    pub id: ControlId,
    pub pressed: bool,
}

impl ControlEvent {
    pub fn pressed(id: ControlId) -> Self {
        Self { id, pressed: true }
    }

    pub fn released(id: ControlId) -> Self {
        Self { id, pressed: false }
    }
}

/// Output side of the physical grid.
pub trait GridDevice: Send {
    fn set_indicator(&mut self, indicator: Indicator, color: Color) -> anyhow::Result<()>;
    /// Turns off every cell of `row` and its row-end indicator.
    fn clear_row(&mut self, row: usize) -> anyhow::Result<()>;
    /// Turns off everything.
    fn reset(&mut self) -> anyhow::Result<()>;
}

impl<D: GridDevice + ?Sized> GridDevice for Box<D> {
    fn set_indicator(&mut self, indicator: Indicator, color: Color) -> anyhow::Result<()> {
        (**self).set_indicator(indicator, color)
    }

    fn clear_row(&mut self, row: usize) -> anyhow::Result<()> {
        (**self).clear_row(row)
    }

    fn reset(&mut self) -> anyhow::Result<()> {
        (**self).reset()
    }
}
