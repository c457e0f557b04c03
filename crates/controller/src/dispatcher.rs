//! Turns button presses into selection changes and scale requests.

use shared::grid::{ControlEvent, ControlId, GridDevice, GRID_SIZE};
use tracing::{debug, info, warn};

use crate::{model::WorkloadModel, projection::GridProjection};

const TOP_STRIP_FIRST_CONTROLLER: u8 = 104;
const PAD_ROW_STRIDE: u8 = 16;
const SCALE_TO_ZERO_COLUMN: usize = 8;

/// Semantic meaning of a physical control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Selector(usize),
    ScaleToZero(usize),
    Cell { row: usize, col: usize },
}

impl Control {
    pub fn decode(id: ControlId) -> Option<Self> {
        match id {
            ControlId::Top(number) => {
                let index = usize::from(number.checked_sub(TOP_STRIP_FIRST_CONTROLLER)?);
                (index < GRID_SIZE).then_some(Control::Selector(index))
            }
            ControlId::Pad(note) => {
                let row = usize::from(note / PAD_ROW_STRIDE);
                let col = usize::from(note % PAD_ROW_STRIDE);
                if row >= GRID_SIZE {
                    None
                } else if col == SCALE_TO_ZERO_COLUMN {
                    Some(Control::ScaleToZero(row))
                } else if col < GRID_SIZE {
                    Some(Control::Cell { row, col })
                } else {
                    None
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleRequest {
    pub group: String,
    pub unit: String,
    pub replicas: u32,
}

/// Handles one control event against the live model. Selector presses
/// redraw through `projection`; row presses may yield a scale request for
/// the caller to submit.
pub fn dispatch<D: GridDevice>(
    event: ControlEvent,
    model: &WorkloadModel,
    projection: &mut GridProjection<D>,
) -> Option<ScaleRequest> {
    if !event.pressed {
        return None;
    }
    let Some(control) = Control::decode(event.id) else {
        debug!(id = ?event.id, "ignoring unmapped control");
        return None;
    };
    debug!(?control, "control pressed");

    match control {
        Control::Selector(index) => {
            let Ok(group) = model.group_at(index) else {
                debug!(index, "no group behind selector");
                return None;
            };
            let name = group.name().to_string();
            if let Err(error) = projection.select_group(model, &name) {
                warn!(group = %name, %error, "failed to redraw grid after selection");
            }
            None
        }
        Control::ScaleToZero(row) => scale_request(model, projection.selected_group(), row, 0),
        Control::Cell { row, col } => {
            let group = model.group_by_name(projection.selected_group())?;
            let unit = group.unit_at(row).ok()?;
            let desired = col + 1;
            if desired == unit.instance_count() {
                debug!(unit = %unit.name(), replicas = desired, "already at requested scale");
                return None;
            }
            scale_request(model, group.name(), row, desired as u32)
        }
    }
}

fn scale_request(model: &WorkloadModel, group: &str, row: usize, replicas: u32) -> Option<ScaleRequest> {
    let group = model.group_by_name(group)?;
    let Ok(unit) = group.unit_at(row) else {
        debug!(group = %group.name(), row, "no deployment on row");
        return None;
    };
    info!(group = %group.name(), unit = %unit.name(), replicas, "requesting scale");
    Some(ScaleRequest {
        group: group.name().to_string(),
        unit: unit.name().to_string(),
        replicas,
    })
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
