//! Integration tests for environment loading
//!
//! Each test builds a small project in memory and loads it end to end:
//! builtin library, preprocessing, includes, the type tree, and variable
//! evaluation.

use std::sync::Arc;

use dmkit_foundation::{ErrorKind, LoadConfig, ResourceLimit, Value};
use dmkit_language::{Environment, FastdmmProp, MemoryReader};

fn load(files: &[(&str, &str)]) -> dmkit_foundation::Result<Environment> {
    load_with(files, &LoadConfig::default())
}

fn load_with(files: &[(&str, &str)], config: &LoadConfig) -> dmkit_foundation::Result<Environment> {
    let mut reader = MemoryReader::new();
    for (path, text) in files {
        reader.insert(*path, *text);
    }
    Environment::load(Arc::new(reader), files[0].0, config, None)
}

fn var(env: &Environment, path: &str, name: &str) -> Option<Value> {
    env.types.get_var(env.lookup(path)?, name)
}

// =============================================================================
// Includes and Macros
// =============================================================================

#[test]
fn includes_resolve_relative_to_the_including_file() {
    let env = load(&[
        ("game.dme", "#include \"code\\\\__defines.dm\"\n#include \"code/items/tools.dm\"\n"),
        ("code/__defines.dm", "#define TOOL_FORCE 7\n"),
        ("code/items/tools.dm", "#include \"../shared.dm\"\n/obj/item/wrench\n\tforce = TOOL_FORCE\n"),
        ("code/shared.dm", "/obj/item\n\tvar/force = 1\n"),
    ])
    .unwrap();
    assert_eq!(var(&env, "/obj/item/wrench", "force"), Some(Value::Number(7.0)));
    assert_eq!(var(&env, "/obj/item", "force"), Some(Value::Number(1.0)));
    assert_eq!(env.files.len(), 3);
}

#[test]
fn conditional_compilation_selects_declarations() {
    let env = load(&[(
        "game.dme",
        "#define MODE 2\n#if MODE == 1\n/obj/one\n#elif MODE == 2\n/obj/two\n#endif\n#ifndef MISSING\n/obj/three\n#endif\n",
    )])
    .unwrap();
    assert!(env.lookup("/obj/one").is_none());
    assert!(env.lookup("/obj/two").is_some());
    assert!(env.lookup("/obj/three").is_some());
    assert!(env.defines.contains("MODE"));
}

#[test]
fn error_directive_stops_loading() {
    let err = load(&[("game.dme", "#error unsupported build\n")]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Preprocess { .. }));
    assert!(err.to_string().contains("unsupported build"));
}

#[test]
fn include_depth_is_bounded() {
    let config = LoadConfig::default().with_max_include_depth(4);
    let err = load_with(&[("loop.dm", "#include \"loop.dm\"\n")], &config).unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::ResourceExhausted(ResourceLimit::IncludeDepth { limit: 4, .. })
    ));
}

#[test]
fn missing_include_is_an_io_error() {
    let err = load(&[("game.dme", "#include \"gone.dm\"\n")]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Io { .. }));
}

// =============================================================================
// Type Tree
// =============================================================================

#[test]
fn builtin_library_provides_atoms() {
    let env = load(&[("game.dme", "/obj/crate\n")]).unwrap();
    let crate_id = env.lookup("/obj/crate").unwrap();
    assert!(env.types.is_a(crate_id, "/atom/movable"));
    assert_eq!(var(&env, "/obj/crate", "dir"), Some(Value::Number(2.0)));
    assert_eq!(var(&env, "/obj/crate", "type"), Some(Value::path("/obj/crate")));
    assert!(env.type_count() > 10);
}

#[test]
fn bare_load_skips_the_builtin_library() {
    let env = load_with(&[("game.dme", "/obj/crate\n")], &LoadConfig::bare()).unwrap();
    assert!(env.lookup("/atom").is_none());
    assert!(env.lookup("/obj/crate").is_some());
}

#[test]
fn variables_inherit_and_reference_each_other() {
    let env = load(&[(
        "game.dme",
        "/obj/item\n\tvar/base = 3\n\tvar/total = base * 2\n\tname = \"item\"\n/obj/item/big\n\tbase = 10\n",
    )])
    .unwrap();
    assert_eq!(var(&env, "/obj/item", "total"), Some(Value::Number(6.0)));
    assert_eq!(var(&env, "/obj/item/big", "name"), Some(Value::string("item")));
    assert_eq!(var(&env, "/obj/item/big", "base"), Some(Value::Number(10.0)));
}

#[test]
fn parent_type_reparents() {
    let env = load(&[("game.dme", "/special\n\tparent_type = /obj\n")]).unwrap();
    let special = env.lookup("/special").unwrap();
    assert!(env.types.is_a(special, "/obj"));
}

#[test]
fn duplicate_declaration_is_a_type_tree_error() {
    let err = load(&[("game.dme", "/obj\n\tvar/x\n\tvar/x\n")]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TypeTree { .. }));
}

#[test]
fn procs_do_not_create_types() {
    let env = load(&[(
        "game.dme",
        "/obj/lamp\n\tname = \"lamp\"\n\tproc/toggle(mob/user)\n\t\tif(user)\n\t\t\treturn 1\n\tdesc = \"bright\"\n",
    )])
    .unwrap();
    assert!(env.lookup("/obj/lamp/proc").is_none());
    assert!(env.lookup("/obj/lamp/toggle").is_none());
    assert_eq!(var(&env, "/obj/lamp", "desc"), Some(Value::string("bright")));
}

#[test]
fn fastdmm_properties_are_inherited() {
    let env = load(&[(
        "game.dme",
        "/obj/pipe\n\tFASTDMM_PROP(pipe_group = \"atmos\", dir_amount = 4)\n/obj/pipe/bent\n",
    )])
    .unwrap();
    let bent = env.lookup("/obj/pipe/bent").unwrap();
    assert_eq!(
        env.types.eval_fastdmm_prop(bent, FastdmmProp::PipeGroup).unwrap(),
        Some(Value::string("atmos"))
    );
    assert_eq!(
        env.types.eval_fastdmm_prop(bent, FastdmmProp::DirAmount).unwrap(),
        Some(Value::Number(4.0))
    );
}
