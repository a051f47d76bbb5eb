//! Integration tests for the map formats

use std::sync::Arc;

use dmkit_foundation::{ErrorKind, LoadConfig, MapConfig, Value};
use dmkit_language::{Environment, MemoryReader};
use dmkit_map::{Coord, Dmm, MapFormat, compare_keys, is_loader_compatible, key_to_number, number_to_key};

fn environment() -> Environment {
    let reader = MemoryReader::new().with_file(
        "game.dme",
        "/turf/floor\n/turf/wall\n/area/hall\n/area/dock\n/obj/sign\n\tvar/message\n",
    );
    Environment::load(Arc::new(reader), "game.dme", &LoadConfig::default(), None).unwrap()
}

const STATION: &str = "\
\"a\" = (/turf/floor,/area/hall)
\"b\" = (/turf/wall,/area/hall)
\"c\" = (/obj/sign{message = \"Welcome\"; name = \"sign\"},/turf/floor,/area/dock)

(1,1,1) = {\"
bbbb
bacb
bbbb
\"}
";

fn grid(dmm: &Dmm<'_>) -> Vec<String> {
    dmm.tiles().map(|t| t.signature(false)).collect()
}

// =============================================================================
// Keys
// =============================================================================

#[test]
fn key_alphabet() {
    assert_eq!(number_to_key(0, 1), "a");
    assert_eq!(number_to_key(26, 1), "A");
    assert_eq!(number_to_key(52, 2), "ba");
    assert_eq!(key_to_number("Z"), Some(51));
    assert_eq!(key_to_number("a1"), None);
    assert!(compare_keys("b", "ab").is_gt());
}

// =============================================================================
// Reading
// =============================================================================

#[test]
fn reads_standard_maps() {
    let env = environment();
    let dmm = Dmm::parse(&env.types, "station.dmm", STATION).unwrap();
    assert_eq!(dmm.size(), (4, 3, 1));
    assert_eq!(dmm.format(), MapFormat::Standard);
    let sign_tile = dmm.tile(Coord::new(3, 2, 1)).unwrap();
    let sign = &sign_tile.contents()[0];
    assert_eq!(sign.path(), "/obj/sign");
    assert_eq!(sign.own_var("name"), Some(&Value::from("sign")));
    assert_eq!(sign_tile.get_area(&env.types).unwrap().path(), "/area/dock");
}

#[test]
fn bad_maps_are_map_errors() {
    let env = environment();
    let missing = "\"a\" = (/turf/floor)\n\n(1,1,1) = {\"\nax\n\"}\n";
    let err = Dmm::parse(&env.types, "bad.dmm", missing).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Map { .. }));
    assert!(err.to_string().contains("key x does not exist"));

    let not_a_path = "\"a\" = (\"text\")\n";
    assert!(matches!(
        Dmm::parse(&env.types, "bad.dmm", not_a_path).unwrap_err().kind,
        ErrorKind::Map { .. }
    ));
}

// =============================================================================
// Writing
// =============================================================================

#[test]
fn unchanged_maps_save_identically() {
    let env = environment();
    let dmm = Dmm::parse(&env.types, "station.dmm", STATION).unwrap();
    assert_eq!(dmm.to_text(&MapConfig::default()).unwrap(), STATION);
}

#[test]
fn every_format_reads_back() {
    let env = environment();
    let dmm = Dmm::parse(&env.types, "station.dmm", STATION).unwrap();
    for format in MapFormat::ALL {
        let text = dmm.serialize(format, &MapConfig::default()).unwrap();
        let again = Dmm::parse(&env.types, "station.dmm", &text).unwrap();
        assert_eq!(again.format(), format);
        assert_eq!(grid(&again), grid(&dmm), "{format}");
    }
}

#[test]
fn tgm_puts_one_override_per_line() {
    let env = environment();
    let dmm = Dmm::parse(&env.types, "station.dmm", STATION).unwrap();
    let text = dmm.serialize(MapFormat::Tgm, &MapConfig::default()).unwrap();
    assert!(text.starts_with("//MAP CONVERTED BY dmm2tgm.py"));
    assert!(text.contains("\"c\" = (\n/obj/sign{\n\tmessage = "));
    assert!(text.contains("(4,1,1) = {\"\nb\nb\nb\n\"}"));
}

#[test]
fn edits_keep_existing_keys() {
    let env = environment();
    let mut dmm = Dmm::parse(&env.types, "station.dmm", STATION).unwrap();
    let dock = dmm.new_instance("/area/dock");
    dmm.set_area(Coord::new(1, 1, 1), dock).unwrap();
    let text = dmm.to_text(&MapConfig::default()).unwrap();
    assert!(text.contains("\"a\" = (/turf/floor,/area/hall)\n"));
    assert!(text.contains("\"b\" = (/turf/wall,/area/hall)\n"));
    assert!(text.contains("(/turf/wall,/area/dock)"));
    assert_eq!(text.lines().count(), STATION.lines().count() + 1);
}

#[test]
fn maphash_keys_do_not_depend_on_the_seed() {
    let env = environment();
    let dmm = Dmm::parse(&env.types, "station.dmm", STATION).unwrap();
    let one = dmm.serialize(MapFormat::Maphash, &MapConfig::default().with_key_seed(1)).unwrap();
    let two = dmm.serialize(MapFormat::Maphash, &MapConfig::default().with_key_seed(2)).unwrap();
    assert_eq!(one, two);
    assert!(one.lines().nth(1).unwrap().starts_with('"'));
    assert_eq!(one.lines().nth(1).unwrap().find("\" = "), Some(4));
}

#[test]
fn loader_compatibility() {
    assert!(is_loader_compatible(&Value::from("plain")));
    assert!(!is_loader_compatible(&Value::from("needs \"escapes\"")));
    assert!(!is_loader_compatible(&Value::Number(f64::INFINITY)));
}
