//! Benchmarks for the DM front end.
//!
//! Run with: `cargo bench --package dmkit_language`

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use dmkit_foundation::LoadConfig;
use dmkit_language::{
    EvalContext, Environment, FileCache, MemoryReader, Preprocessor, TreeBuilder, TypeRegistry,
    parse_tokens, tokenize,
};

/// A synthetic project file with `count` types.
fn synthetic_source(count: usize) -> String {
    let mut src = String::from("#define BASE 10\n#define SCALE(x) ((x) * 2)\n");
    for i in 0..count {
        src.push_str(&format!(
            "/obj/item/thing{i}\n\tname = \"thing [{i}]\"\n\tvar/weight = SCALE(BASE + {i})\n\ticon_state = \"s{i}\"\n\tproc/act(mob/user)\n\t\tif(user)\n\t\t\treturn {i}\n"
        ));
    }
    src
}

// =============================================================================
// Lexer Benchmarks
// =============================================================================

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");

    let expr = "rgb(255, 128, 0) + \"text [name] more\" * (1 << 4)";
    group.throughput(Throughput::Bytes(expr.len() as u64));
    group.bench_with_input(BenchmarkId::new("expression", expr.len()), expr, |b, s| {
        b.iter(|| tokenize("bench.dm", black_box(s)));
    });

    for count in [10, 100] {
        let src = synthetic_source(count);
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_with_input(BenchmarkId::new("types", count), &src, |b, s| {
            b.iter(|| tokenize("bench.dm", black_box(s)));
        });
    }

    group.finish();
}

// =============================================================================
// Preprocessor Benchmarks
// =============================================================================

fn bench_preprocessor(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocessor");

    for count in [10, 100] {
        let tokens = tokenize("bench.dm", &synthetic_source(count));
        group.bench_with_input(BenchmarkId::new("types", count), &tokens, |b, t| {
            b.iter(|| {
                let cache = Arc::new(FileCache::new(Arc::new(MemoryReader::new())));
                let mut pp = Preprocessor::new(cache, LoadConfig::bare());
                pp.preprocess(black_box(t), "bench.dm", false)
            });
        });
    }

    group.finish();
}

// =============================================================================
// Parser and Evaluator Benchmarks
// =============================================================================

fn bench_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("eval");

    let sources = [
        ("arithmetic", "1 + 2 * 3 - 4 / 2 ** 2"),
        ("list", "list(\"a\" = 1, \"b\" = list(1, 2, 3), /obj{name = \"x\"})"),
        ("builtins", "copytext(\"hello world\", 1, 6) + ckey(\"Some Key\")"),
    ];
    for (name, src) in sources {
        let tokens = tokenize("bench.dm", src);
        group.bench_with_input(BenchmarkId::new("parse", name), &tokens, |b, t| {
            b.iter(|| parse_tokens(black_box(t)));
        });
        let Ok(expr) = parse_tokens(&tokens) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::new("evaluate", name), &expr, |b, e| {
            b.iter(|| black_box(e).evaluate_constant(&EvalContext::new()));
        });
    }

    group.finish();
}

// =============================================================================
// Type Tree Benchmarks
// =============================================================================

fn bench_type_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("type_tree");

    for count in [10, 100] {
        let cache = Arc::new(FileCache::new(Arc::new(MemoryReader::new())));
        let mut pp = Preprocessor::new(cache, LoadConfig::bare());
        let Ok(tokens) = pp.preprocess(&tokenize("bench.dm", &synthetic_source(count)), "bench.dm", false) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::new("build_and_finalize", count), &tokens, |b, t| {
            b.iter(|| {
                let mut types = TypeRegistry::new();
                let built = TreeBuilder::new(&mut types).build(black_box(t));
                (built, types.finalize())
            });
        });
    }

    let reader = Arc::new(MemoryReader::new().with_file("bench.dme", synthetic_source(100)));
    group.bench_function("load_with_stddef", |b| {
        b.iter(|| Environment::load(reader.clone(), "bench.dme", &LoadConfig::default().with_preload(false), None));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_lexer,
    bench_preprocessor,
    bench_eval,
    bench_type_tree
);
criterion_main!(benches);
