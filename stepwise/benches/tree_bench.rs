//! Benchmarks for step addressing and build walks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use stepwise::actions::{ActionHandler, NoOpAction};
use stepwise::core::StepPath;
use stepwise::engine::Engine;
use stepwise::pipeline::{PipelineBuilder, StepTree};

fn wide_tree(width: usize) -> StepTree {
    let noop: Arc<dyn ActionHandler> = Arc::new(NoOpAction);
    let mut builder = PipelineBuilder::new("root");
    for group in 0..width {
        let noop = Arc::clone(&noop);
        builder = builder.parallel(format!("group-{group}"), move |mut p| {
            for leaf in 0..width {
                p = p.sequence(format!("lane-{leaf}"), |s| {
                    s.action("prepare", Arc::clone(&noop))
                        .action("run", Arc::clone(&noop))
                });
            }
            p
        });
    }
    match builder.build() {
        Ok(tree) => tree,
        Err(e) => panic!("benchmark tree is invalid: {e}"),
    }
}

fn path_benchmark(c: &mut Criterion) {
    c.bench_function("path_parse", |b| {
        b.iter(|| black_box("(3 12 7 1)").parse::<StepPath>())
    });

    let path: StepPath = "(3 12 7 1)".parse().unwrap_or_default();
    c.bench_function("path_render", |b| b.iter(|| black_box(&path).to_string()));
}

fn tree_benchmark(c: &mut Criterion) {
    let tree = wide_tree(16);
    let deepest: StepPath = "(16 16 2)".parse().unwrap_or_default();

    c.bench_function("tree_all_paths", |b| b.iter(|| black_box(&tree).all_paths()));
    c.bench_function("tree_resolve", |b| {
        b.iter(|| black_box(&tree).resolve(black_box(&deepest)).is_ok())
    });
}

fn walk_benchmark(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        return;
    };
    let engine = Arc::new(Engine::in_memory(wide_tree(4)));

    c.bench_function("build_walk", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let handle = engine.start_build().await;
                match handle {
                    Ok(handle) => black_box(handle.wait().await.is_ok()),
                    Err(_) => false,
                }
            })
        });
    });
}

criterion_group!(benches, path_benchmark, tree_benchmark, walk_benchmark);
criterion_main!(benches);
