use super::*;
use crate::{
    model::{DeployableUnit, Group},
    test_support::{running, RecordingGrid},
};
use shared::domain::GroupMode;

fn pad(row: u8, col: u8) -> ControlId {
    ControlId::Pad(row * 16 + col)
}

fn unit_with(name: &str, count: usize) -> DeployableUnit {
    let names: Vec<String> = (0..count).map(|i| format!("{name}-{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut unit = DeployableUnit::new(name);
    unit.replace_instances(running(&refs));
    unit
}

fn sample_model() -> WorkloadModel {
    WorkloadModel::new(vec![
        Group::new("shop", GroupMode::Static).with_units([unit_with("web", 2), unit_with("api", 0)]),
        Group::new("infra", GroupMode::Dynamic).with_units([unit_with("db", 1)]),
    ])
}

fn setup() -> (WorkloadModel, RecordingGrid, GridProjection<RecordingGrid>) {
    let model = sample_model();
    let grid = RecordingGrid::default();
    let projection = GridProjection::new(grid.clone(), &model, "shop");
    (model, grid, projection)
}

#[test]
fn decodes_physical_controls() {
    assert_eq!(Control::decode(ControlId::Top(104)), Some(Control::Selector(0)));
    assert_eq!(Control::decode(ControlId::Top(111)), Some(Control::Selector(7)));
    assert_eq!(Control::decode(ControlId::Top(103)), None);
    assert_eq!(Control::decode(ControlId::Top(112)), None);
    assert_eq!(Control::decode(pad(3, 5)), Some(Control::Cell { row: 3, col: 5 }));
    assert_eq!(Control::decode(pad(7, 8)), Some(Control::ScaleToZero(7)));
    assert_eq!(Control::decode(pad(2, 9)), None);
    assert_eq!(Control::decode(ControlId::Pad(0x80)), None);
}

#[test]
fn selector_press_switches_group_and_redraws() {
    let (model, grid, mut projection) = setup();

    let request = dispatch(ControlEvent::pressed(ControlId::Top(105)), &model, &mut projection);

    assert_eq!(request, None);
    assert_eq!(projection.selected_group(), "infra");
    assert_eq!(grid.render_count(), 1);
}

#[test]
fn selector_past_last_group_does_nothing() {
    let (model, grid, mut projection) = setup();

    let request = dispatch(ControlEvent::pressed(ControlId::Top(110)), &model, &mut projection);

    assert_eq!(request, None);
    assert_eq!(projection.selected_group(), "shop");
    assert!(grid.ops().is_empty());
}

#[test]
fn cell_press_requests_column_plus_one_replicas() {
    let (model, _grid, mut projection) = setup();

    let request = dispatch(ControlEvent::pressed(pad(0, 4)), &model, &mut projection);

    assert_eq!(
        request,
        Some(ScaleRequest {
            group: "shop".into(),
            unit: "web".into(),
            replicas: 5,
        })
    );
}

#[test]
fn cell_press_matching_current_count_is_ignored() {
    let (model, _grid, mut projection) = setup();

    assert_eq!(dispatch(ControlEvent::pressed(pad(0, 1)), &model, &mut projection), None);
}

#[test]
fn row_end_press_scales_to_zero() {
    let (model, _grid, mut projection) = setup();

    let request = dispatch(ControlEvent::pressed(pad(1, 8)), &model, &mut projection);

    assert_eq!(
        request,
        Some(ScaleRequest {
            group: "shop".into(),
            unit: "api".into(),
            replicas: 0,
        })
    );
}

#[test]
fn presses_on_empty_rows_are_ignored() {
    let (model, grid, mut projection) = setup();

    assert_eq!(dispatch(ControlEvent::pressed(pad(5, 0)), &model, &mut projection), None);
    assert_eq!(dispatch(ControlEvent::pressed(pad(5, 8)), &model, &mut projection), None);
    assert!(grid.ops().is_empty());
}

#[test]
fn releases_are_ignored() {
    let (model, grid, mut projection) = setup();

    assert_eq!(dispatch(ControlEvent::released(pad(0, 4)), &model, &mut projection), None);
    assert_eq!(
        dispatch(ControlEvent::released(ControlId::Top(105)), &model, &mut projection),
        None
    );
    assert_eq!(projection.selected_group(), "shop");
    assert!(grid.ops().is_empty());
}

#[test]
fn scale_targets_the_selected_group() {
    let (model, _grid, mut projection) = setup();
    dispatch(ControlEvent::pressed(ControlId::Top(105)), &model, &mut projection);

    let request = dispatch(ControlEvent::pressed(pad(0, 2)), &model, &mut projection);

    assert_eq!(
        request,
        Some(ScaleRequest {
            group: "infra".into(),
            unit: "db".into(),
            replicas: 3,
        })
    );
}
