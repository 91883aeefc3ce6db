//! Property-based invariant tests for viewshed entities and the manager.
//!
//! 1. Range never drops below the minimum and is kept otherwise
//! 2. Heading is normalised, pitch bounded and roll always zero
//! 3. Any action sequence leaves at most one viewshed bound, and it is the current one

use constants::viewshed::MIN_RANGE;
use proptest::prelude::*;
use viewshed_engine::tools::viewshed_tool::{ViewshedAction, apply_action};
use viewshed_engine::viewshed::{
    Cartographic, PointerEvent, RenderSurface, SurfaceId, ViewshedConfig, ViewshedEntity,
    ViewshedKind, ViewshedManager, ViewshedOptions,
};

// ── Strategies ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Create(bool),
    Tick,
    Click(f64, f64),
    Persist,
    Stop,
    View(usize),
    Edit(usize),
    Toggle(usize),
    Remove(usize),
    Move(bool),
    Select(Vec<usize>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(Op::Create),
        Just(Op::Tick),
        (-0.002f64..0.002, -0.002f64..0.002).prop_map(|(dx, dy)| Op::Click(dx, dy)),
        Just(Op::Persist),
        Just(Op::Stop),
        (0usize..4).prop_map(Op::View),
        (0usize..4).prop_map(Op::Edit),
        (0usize..4).prop_map(Op::Toggle),
        (0usize..4).prop_map(Op::Remove),
        any::<bool>().prop_map(Op::Move),
        prop::collection::vec(0usize..4, 0..3).prop_map(Op::Select),
    ]
}

fn kind(omni: bool) -> ViewshedKind {
    if omni {
        ViewshedKind::Omnidirectional
    } else {
        ViewshedKind::Cone
    }
}

/// Apply one operation; failures of individual actions are part of the exercise.
fn apply(manager: &mut ViewshedManager, op: &Op) {
    let ids = manager
        .collection()
        .iter()
        .map(ViewshedEntity::id)
        .collect::<Vec<_>>();
    let pick = |index: usize| ids.get(index % ids.len().max(1)).copied();

    let action = match op {
        Op::Create(omni) => Some(ViewshedAction::Create(kind(*omni))),
        Op::Tick => {
            let _ = manager.tick();
            None
        }
        Op::Click(dx, dy) => {
            manager.handle_pointer(&PointerEvent::click(Cartographic::new(
                8.54 + dx,
                47.37 + dy,
                400.0,
            )));
            None
        }
        Op::Persist => Some(ViewshedAction::Persist),
        Op::Stop => Some(ViewshedAction::Stop),
        Op::View(index) => pick(*index).map(ViewshedAction::View),
        Op::Edit(index) => pick(*index).map(ViewshedAction::Edit),
        Op::Toggle(index) => pick(*index).map(ViewshedAction::ToggleVisibility),
        Op::Remove(index) => pick(*index).map(ViewshedAction::Remove),
        Op::Move(enable) => Some(ViewshedAction::Move(*enable)),
        Op::Select(indices) => Some(ViewshedAction::Select(
            indices.iter().filter_map(|index| pick(*index)).collect(),
        )),
    };
    if let Some(action) = action {
        let _ = apply_action(manager, action);
    }
}

// ── Properties ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn range_is_clamped(range in -1.0e6f64..1.0e6) {
        let mut entity = ViewshedEntity::new(ViewshedKind::Cone, ViewshedOptions::default()).unwrap();
        entity.set_range(range);
        prop_assert!(entity.range() >= MIN_RANGE);
        if range >= MIN_RANGE {
            prop_assert_eq!(entity.range(), range);
        }
    }

    #[test]
    fn orientation_stays_normalised(heading in -1.0e4f64..1.0e4, pitch in -500.0f64..500.0) {
        let mut entity = ViewshedEntity::new(ViewshedKind::Cone, ViewshedOptions::default()).unwrap();
        entity.set_heading(heading);
        entity.set_pitch(pitch);
        let orientation = entity.orientation();
        prop_assert!((0.0..360.0).contains(&orientation.heading));
        prop_assert!((-90.0..=90.0).contains(&orientation.pitch));
        prop_assert_eq!(orientation.roll, 0.0);
    }

    #[test]
    fn at_most_one_viewshed_is_bound(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut manager =
            ViewshedManager::new(RenderSurface::new(SurfaceId(9)), ViewshedConfig::default());

        for op in &ops {
            apply(&mut manager, op);

            let active = manager
                .collection()
                .iter()
                .filter(|entity| entity.is_active())
                .map(ViewshedEntity::id)
                .collect::<Vec<_>>();
            prop_assert!(active.len() <= 1);
            for id in &active {
                prop_assert_eq!(Some(*id), manager.current_id());
            }
            prop_assert!(manager.surface().markers().len() <= 1);
            if let Some((marker_id, _)) = manager.surface().markers().first() {
                prop_assert_eq!(Some(*marker_id), manager.current_id());
            }
        }
    }
}
