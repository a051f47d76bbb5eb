//! A small project on disk, from environment file to converted map.

use std::fs;
use std::path::{Path, PathBuf};

use dmkit_foundation::{LoadConfig, MapConfig, Value};
use dmkit_language::Environment;
use dmkit_map::{Coord, Dmm, MapFormat, is_loader_compatible};
use dmkit_runtime::{convert_map, load_environment, read_map, save_text};
use tempfile::{TempDir, tempdir};

struct Project {
    root: TempDir,
}

impl Project {
    fn new() -> Self {
        let project = Self { root: tempdir().unwrap() };
        project.write("station.dme", DME);
        project.write("code/__defines.dm", DEFINES);
        project.write("code/turfs.dm", TURFS);
        project.write("code/objects.dm", OBJECTS);
        project.write("maps/station.dmm", MAP);
        project
    }

    fn write(&self, path: &str, text: &str) {
        let full = self.root.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, text).unwrap();
    }

    fn path(&self, path: &str) -> PathBuf {
        self.root.path().join(path)
    }

    fn load(&self) -> Environment {
        load_environment(&self.path("station.dme"), &LoadConfig::default()).unwrap()
    }
}

const DME: &str = "\
// station.dme
#include \"code\\\\__defines.dm\"
#include \"code\\\\turfs.dm\"
#include \"code\\\\objects.dm\"
#include \"maps\\\\station.dmm\"
";

const DEFINES: &str = "#define LOCKER_CAPACITY (10 * 3)\n";

const TURFS: &str = "\
/turf/floor
\tname = \"floor\"
/turf/wall
\tdensity = 1
/area/bridge
/area/hall
";

const OBJECTS: &str = "\
/obj/locker
\tvar/capacity = LOCKER_CAPACITY
/obj/locker/secure
\tname = \"secure locker\"
";

const MAP: &str = "\
\"a\" = (/turf/wall,/area/hall)
\"b\" = (/turf/floor,/area/hall)
\"c\" = (/obj/locker/secure{dir = 4},/turf/floor,/area/bridge)
\"d\" = (/turf/floor,/area/bridge)

(1,1,1) = {\"
aaaaa
abbda
abcda
aaaaa
\"}
";

fn grid(dmm: &Dmm<'_>) -> Vec<String> {
    dmm.tiles().map(|t| t.signature(false)).collect()
}

fn parse<'t>(env: &'t Environment, path: &Path) -> Dmm<'t> {
    Dmm::parse(&env.types, "map", &read_map(path).unwrap()).unwrap()
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn project_loads_from_disk() {
    let project = Project::new();
    let env = project.load();

    assert_eq!(env.files.len(), 3);
    assert!(env.defines.contains("LOCKER_CAPACITY"));
    let secure = env.lookup("/obj/locker/secure").unwrap();
    assert_eq!(env.types.get_var(secure, "capacity"), Some(Value::Number(30.0)));
    assert_eq!(env.types.get_var(secure, "name"), Some(Value::from("secure locker")));
    // builtin library
    assert!(env.lookup("/datum").is_some());
    assert!(env.types.is_a(secure, "/atom/movable"));
}

// =============================================================================
// Maps
// =============================================================================

#[test]
fn placed_instances_resolve_against_the_tree() {
    let project = Project::new();
    let env = project.load();
    let dmm = parse(&env, &project.path("maps/station.dmm"));

    assert_eq!(dmm.size(), (5, 4, 1));
    let tile = dmm.tile(Coord::new(3, 2, 1)).unwrap();
    let locker = &tile.contents()[0];
    assert_eq!(locker.get_var(&env.types, "dir"), Some(Value::Number(4.0)));
    assert_eq!(locker.get_var(&env.types, "capacity"), Some(Value::Number(30.0)));
    assert!(locker.is_a(&env.types, "/obj/locker", false));
    assert_eq!(tile.get_area(&env.types).unwrap().path(), "/area/bridge");
    assert_eq!(dmm.signature_count("/turf/wall"), 14);
}

#[test]
fn maps_survive_a_tour_of_every_format() {
    let project = Project::new();
    let env = project.load();
    let original = project.path("maps/station.dmm");
    let config = MapConfig::default();

    let mut current = original.clone();
    for (step, format) in [MapFormat::Tgm, MapFormat::Maphash, MapFormat::Standard]
        .into_iter()
        .enumerate()
    {
        let text = convert_map(&env, &current, Some(format), &config).unwrap();
        let next = project.path(&format!("maps/step{step}.dmm"));
        save_text(&next, &text).unwrap();
        current = next;
        assert_eq!(parse(&env, &current).format(), format);
    }

    assert_eq!(grid(&parse(&env, &current)), grid(&parse(&env, &original)));
}

#[test]
fn conversion_without_a_format_keeps_the_file() {
    let project = Project::new();
    let env = project.load();
    let text = convert_map(&env, &project.path("maps/station.dmm"), None, &MapConfig::default()).unwrap();
    assert_eq!(text, MAP);
}

#[test]
fn edits_are_saved_and_reloaded() {
    let project = Project::new();
    let env = project.load();
    let path = project.path("maps/station.dmm");
    let mut dmm = parse(&env, &path);

    let locker = dmm.instance_from_text("/obj/locker{capacity = 5}").unwrap();
    dmm.place(Coord::new(2, 2, 1), locker).unwrap();
    dmm.commit();
    save_text(&path, &dmm.to_text(&MapConfig::default()).unwrap()).unwrap();

    let again = parse(&env, &path);
    let tile = again.tile(Coord::new(2, 2, 1)).unwrap();
    assert_eq!(tile.signature(false), "(/obj/locker{capacity = 5},/turf/floor,/area/hall)");
    assert!(read_map(&path).unwrap().starts_with("\"a\" = (/turf/wall,/area/hall)\n"));
}

#[test]
fn placed_vars_are_loader_compatible() {
    let project = Project::new();
    let env = project.load();
    let mut dmm = parse(&env, &project.path("maps/station.dmm"));

    let all_plain = dmm
        .tiles()
        .flat_map(|t| t.iter())
        .flat_map(|i| i.vars().map(|(_, v)| v.clone()).collect::<Vec<_>>())
        .all(|v| is_loader_compatible(&v));
    assert!(all_plain);

    let quoted = dmm.instance_from_text("/obj/locker{name = \"the \\\"big\\\" one\"}").unwrap();
    assert!(!quoted.vars().all(|(_, v)| is_loader_compatible(v)));
}
