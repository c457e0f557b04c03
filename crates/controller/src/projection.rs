use shared::{
    domain::InstanceStatus,
    grid::{Color, GridDevice, Indicator, GRID_SIZE},
};
use tracing::{debug, info, warn};

use crate::{
    model::{DeployableUnit, WorkloadModel},
    reconciler::GroupObserver,
};

const SELECTED_COLOR: Color = Color::BrightAmber;
const UNSELECTED_COLOR: Color = Color::DimAmber;
const ROW_END_COLOR: Color = Color::BrightRed;

pub fn status_color(status: &InstanceStatus) -> Color {
    match status {
        InstanceStatus::Running => Color::BrightGreen,
        InstanceStatus::Pending => Color::Yellow,
        InstanceStatus::Succeeded => Color::DimGreen,
        InstanceStatus::Failed => Color::BrightRed,
        InstanceStatus::Unknown | InstanceStatus::Other(_) => Color::DimRed,
    }
}

/// Renders the selected group onto the grid device.
pub struct GridProjection<D: GridDevice> {
    device: D,
    selected: String,
}

impl<D: GridDevice> GridProjection<D> {
    /// Selects `default_group`, or the first group when the model does not
    /// know it.
    pub fn new(device: D, model: &WorkloadModel, default_group: &str) -> Self {
        let selected = match model.group_by_name(default_group) {
            Some(group) => group.name().to_string(),
            None => {
                let fallback = model
                    .groups()
                    .first()
                    .map(|group| group.name().to_string())
                    .unwrap_or_else(|| default_group.to_string());
                warn!(
                    requested = %default_group,
                    selected = %fallback,
                    "default group is not monitored; falling back"
                );
                fallback
            }
        };
        Self { device, selected }
    }

    pub fn selected_group(&self) -> &str {
        &self.selected
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Always redraws, even when `name` is already selected.
    pub fn select_group(&mut self, model: &WorkloadModel, name: &str) -> anyhow::Result<()> {
        info!(group = %name, "selected group");
        self.selected = name.to_string();
        self.render(model)
    }

    pub fn render(&mut self, model: &WorkloadModel) -> anyhow::Result<()> {
        self.render_selectors(model)?;
        self.render_rows(model)
    }

    fn render_selectors(&mut self, model: &WorkloadModel) -> anyhow::Result<()> {
        for (index, group) in model.groups().iter().take(GRID_SIZE).enumerate() {
            let color = if group.name() == self.selected {
                SELECTED_COLOR
            } else {
                UNSELECTED_COLOR
            };
            self.device.set_indicator(Indicator::Selector(index), color)?;
        }
        Ok(())
    }

    fn render_rows(&mut self, model: &WorkloadModel) -> anyhow::Result<()> {
        let units: &[DeployableUnit] = model
            .group_by_name(&self.selected)
            .map(|group| group.units())
            .unwrap_or_default();

        for row in 0..GRID_SIZE {
            self.device.clear_row(row)?;
            let Some(unit) = units.get(row) else {
                continue;
            };
            debug!(unit = %unit.name(), row, "displaying deployment");
            for (col, status) in unit.instances().values().take(GRID_SIZE).enumerate() {
                self.device
                    .set_indicator(Indicator::Cell { row, col }, status_color(status))?;
            }
            self.device.set_indicator(Indicator::RowEnd(row), ROW_END_COLOR)?;
        }
        Ok(())
    }
}

impl<D: GridDevice> GroupObserver for GridProjection<D> {
    fn group_changed(&mut self, model: &WorkloadModel, group: &str) {
        if group != self.selected {
            debug!(%group, "change in unselected group; not redrawing");
            return;
        }
        if let Err(error) = self.render(model) {
            warn!(%group, %error, "failed to redraw grid");
        }
    }
}

#[cfg(test)]
#[path = "tests/projection_tests.rs"]
mod tests;
