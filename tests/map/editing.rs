//! Integration tests for grid editing and history

use std::rc::Rc;
use std::sync::Arc;

use dmkit_foundation::{LoadConfig, Value};
use dmkit_language::{Environment, MemoryReader};
use dmkit_map::{Coord, Dmm};

fn environment() -> Environment {
    let reader = MemoryReader::new().with_file(
        "game.dme",
        "/turf/floor\n/turf/wall\n\tdensity = 1\n/area/hall\n/obj/crate\n/obj/lamp\n\tvar/on = 0\n\tFASTDMM_PROP(set_instance_vars(icon_state = on ? \"lamp_on\" : \"lamp_off\"))\n",
    );
    Environment::load(Arc::new(reader), "game.dme", &LoadConfig::default(), None).unwrap()
}

fn paths(dmm: &Dmm<'_>, coord: Coord) -> Vec<String> {
    dmm.tile(coord)
        .unwrap()
        .iter()
        .map(|i| i.path().to_string())
        .collect()
}

// =============================================================================
// Placement
// =============================================================================

#[test]
fn new_maps_use_world_defaults() {
    let env = environment();
    let dmm = Dmm::new(&env.types, 3, 2, 1);
    assert_eq!(dmm.size(), (3, 2, 1));
    assert_eq!(dmm.all_coordinates().count(), 6);
    assert_eq!(paths(&dmm, Coord::new(3, 2, 1)), vec!["/turf", "/area"]);
    assert!(!dmm.is_modified());
}

#[test]
fn place_routes_by_type() {
    let env = environment();
    let mut dmm = Dmm::new(&env.types, 2, 2, 1);
    let at = Coord::new(1, 1, 1);
    let floor = dmm.new_instance("/turf/floor");
    dmm.place(at, floor).unwrap();
    let hall = dmm.new_instance("/area/hall");
    dmm.place(at, hall).unwrap();
    let crate_ = dmm.new_instance("/obj/crate");
    dmm.place(at, crate_).unwrap();
    assert_eq!(paths(&dmm, at), vec!["/obj/crate", "/turf/floor", "/area/hall"]);

    let tile = dmm.tile(at).unwrap();
    assert_eq!(tile.get_turf(&env.types).unwrap().path(), "/turf/floor");
    assert_eq!(tile.locate(&env.types, "/obj", false).unwrap().path(), "/obj/crate");
    assert!(dmm.is_modified());
}

#[test]
fn deleting_a_turf_restores_the_default() {
    let env = environment();
    let mut dmm = Dmm::new(&env.types, 1, 1, 1);
    let at = Coord::new(1, 1, 1);
    let wall = dmm.new_instance("/turf/wall");
    dmm.set_turf(at, wall).unwrap();
    let wall = Rc::clone(dmm.tile(at).unwrap().get_turf(&env.types).unwrap());
    assert!(dmm.delete(at, &wall).unwrap());
    assert_eq!(paths(&dmm, at), vec!["/turf", "/area"]);
    assert!(!dmm.delete(at, &wall).unwrap());
}

#[test]
fn out_of_bounds_edits_fail() {
    let env = environment();
    let mut dmm = Dmm::new(&env.types, 2, 2, 1);
    let crate_ = dmm.new_instance("/obj/crate");
    assert!(dmm.add_object(Coord::new(3, 1, 1), crate_).is_err());
    assert!(dmm.pop(Coord::new(1, 1, 2)).is_err());
}

// =============================================================================
// Instances
// =============================================================================

#[test]
fn instance_vars_fall_back_to_the_type() {
    let env = environment();
    let mut dmm = Dmm::new(&env.types, 1, 1, 1);
    let mut wall = dmm.new_instance("/turf/wall");
    assert_eq!(wall.get_var(&env.types, "density"), Some(Value::Number(1.0)));
    wall.set_var("density", Value::from(0));
    assert_eq!(wall.get_var(&env.types, "density"), Some(Value::Number(0.0)));
    assert_eq!(wall.signature(false), "/turf/wall{density = 0}");
}

#[test]
fn set_instance_vars_runs_on_creation() {
    let env = environment();
    let mut dmm = Dmm::new(&env.types, 1, 1, 1);
    let off = dmm.new_instance("/obj/lamp");
    assert_eq!(off.own_var("icon_state"), Some(&Value::from("lamp_off")));
    let on = dmm.instance_from_text("/obj/lamp{on = 1}").unwrap();
    assert_eq!(on.own_var("icon_state"), Some(&Value::from("lamp_on")));
}

#[test]
fn unknown_types_get_the_error_appearance() {
    let env = environment();
    let mut dmm = Dmm::new(&env.types, 1, 1, 1);
    let ghost = dmm.new_instance("/obj/removed_long_ago");
    assert_eq!(ghost.appearance(&env.types).icon_state.as_deref(), Some("error"));
    let crate_ = dmm.new_instance("/obj/crate");
    let look = crate_.appearance(&env.types);
    assert_eq!(look.dir, 2);
    assert_eq!(look.plane, 0);
    assert!((look.alpha - 1.0).abs() < f32::EPSILON);
}

// =============================================================================
// History
// =============================================================================

#[test]
fn undo_and_redo_whole_frames() {
    let env = environment();
    let mut dmm = Dmm::new(&env.types, 2, 1, 1);
    let a = Coord::new(1, 1, 1);
    let b = Coord::new(2, 1, 1);
    let before = (paths(&dmm, a), paths(&dmm, b));

    let crate_ = dmm.new_instance("/obj/crate");
    dmm.add_object(a, crate_).unwrap();
    let wall = dmm.new_instance("/turf/wall");
    dmm.set_turf(b, wall).unwrap();
    dmm.commit();
    let after = (paths(&dmm, a), paths(&dmm, b));

    assert!(dmm.undo().unwrap());
    assert_eq!((paths(&dmm, a), paths(&dmm, b)), before);
    assert!(dmm.can_redo());
    assert!(dmm.redo().unwrap());
    assert_eq!((paths(&dmm, a), paths(&dmm, b)), after);
    assert!(!dmm.redo().unwrap());
}

#[test]
fn new_edits_discard_redo() {
    let env = environment();
    let mut dmm = Dmm::new(&env.types, 1, 1, 1);
    let at = Coord::new(1, 1, 1);
    let crate_ = dmm.new_instance("/obj/crate");
    dmm.add_object(at, crate_).unwrap();
    dmm.commit();
    dmm.undo().unwrap();
    let lamp = dmm.new_instance("/obj/lamp");
    dmm.add_object(at, lamp).unwrap();
    assert!(!dmm.redo().unwrap());
    assert_eq!(paths(&dmm, at), vec!["/obj/lamp", "/turf", "/area"]);
}

#[test]
fn signature_counts_follow_edits() {
    let env = environment();
    let mut dmm = Dmm::new(&env.types, 2, 2, 1);
    assert_eq!(dmm.signature_count("/turf"), 4);
    let wall = dmm.new_instance("/turf/wall");
    dmm.set_turf(Coord::new(1, 1, 1), wall).unwrap();
    assert_eq!(dmm.signature_count("/turf"), 3);
    assert_eq!(dmm.signature_count("/turf/wall"), 1);
    dmm.undo().unwrap();
    assert_eq!(dmm.signature_count("/turf/wall"), 0);
    assert_eq!(dmm.signature_count("/turf"), 4);
}

#[test]
fn resize_keeps_overlap_and_clears_history() {
    let env = environment();
    let mut dmm = Dmm::new(&env.types, 2, 2, 1);
    let wall = dmm.new_instance("/turf/wall");
    dmm.set_turf(Coord::new(2, 2, 1), wall).unwrap();
    dmm.resize(3, 3, 2);
    assert_eq!(dmm.size(), (3, 3, 2));
    assert_eq!(paths(&dmm, Coord::new(2, 2, 1))[0], "/turf/wall");
    assert_eq!(paths(&dmm, Coord::new(3, 3, 2)), vec!["/turf", "/area"]);
    assert!(!dmm.can_undo());
    dmm.resize(1, 1, 1);
    assert_eq!(dmm.signature_count("/turf/wall"), 0);
}
