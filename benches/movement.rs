//! Benchmarks for confirm-and-advance over large mappings.
//!
//! Run with: cargo bench
//!
//! Results are saved to `target/criterion/` with HTML reports.
#![allow(
    clippy::expect_used,
    clippy::cast_possible_truncation,
    clippy::cast_lossless
)]

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use xlmap::movement::MovementEngine;
use xlmap::script::RhaiEvaluator;
use xlmap::{CellAddress, CellValue, Mapping, MergeCorner, MergeRange, Movement, WorkbookState};

/// `rows` x `cols` sheet where every third row is blank and every tenth row
/// starts a two-row merge.
fn sparse_sheet(rows: u32, cols: u32) -> WorkbookState {
    let grid = (0..rows)
        .map(|r| {
            (0..cols)
                .map(|c| {
                    if r % 3 == 2 {
                        CellValue::Empty
                    } else {
                        CellValue::Number(f64::from(r * cols + c))
                    }
                })
                .collect()
        })
        .collect();
    let merges = (0..rows.saturating_sub(1))
        .step_by(10)
        .map(|r| MergeRange {
            s: MergeCorner { r, c: 0 },
            e: MergeCorner { r: r + 1, c: 0 },
        })
        .collect();
    let mut data = HashMap::new();
    data.insert("S".to_string(), grid);
    let mut merge_map = HashMap::new();
    merge_map.insert("S".to_string(), merges);
    WorkbookState::new(vec!["S".to_string()], "S", data, merge_map).expect("valid workbook")
}

/// One field per column: jump-next on even columns, followers on odd ones.
fn column_mapping(cols: u32) -> Mapping {
    let mut mapping = Mapping::new();
    for c in 0..cols {
        let movement = if c % 2 == 0 {
            Movement::drop_default()
        } else {
            Movement::follow(format!("f{}", c - 1), 0)
        };
        mapping.insert(
            format!("f{c}"),
            vec![CellAddress::new("S", 0, c).with_movement(movement)],
        );
    }
    mapping
}

fn bench_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance");
    let evaluator = RhaiEvaluator::default();
    for cols in [10_u32, 50, 200] {
        let workbook = sparse_sheet(5_000, cols);
        let mapping = column_mapping(cols);
        let engine = MovementEngine::new(&workbook, &evaluator);
        group.throughput(Throughput::Elements(u64::from(cols)));
        group.bench_with_input(BenchmarkId::new("jump_and_follow", cols), &mapping, |b, m| {
            b.iter(|| engine.advance(black_box(m)));
        });
    }
    group.finish();
}

fn bench_scripts(c: &mut Criterion) {
    let workbook = sparse_sheet(1_000, 20);
    let evaluator = RhaiEvaluator::default();
    let engine = MovementEngine::new(&workbook, &evaluator);
    let mut mapping = Mapping::new();
    for c in 0..20 {
        mapping.insert(
            format!("s{c}"),
            vec![CellAddress::new("S", 0, c)
                .with_movement(Movement::Script("if row < 100 { 3 } else { #{ row: 0 } }".into()))],
        );
    }
    c.bench_function("advance_scripts_20", |b| {
        b.iter(|| engine.advance(black_box(&mapping)));
    });
}

fn bench_full_walk(c: &mut Criterion) {
    let workbook = sparse_sheet(500, 8);
    let evaluator = RhaiEvaluator::default();
    let engine = MovementEngine::new(&workbook, &evaluator);
    let start = column_mapping(8);
    c.bench_function("walk_until_exhausted_500x8", |b| {
        b.iter(|| {
            let mut mapping = start.clone();
            let mut steps = 0_u32;
            while !mapping.is_empty() {
                mapping = engine.advance(&mapping);
                steps += 1;
            }
            black_box(steps)
        });
    });
}

criterion_group!(benches, bench_advance, bench_scripts, bench_full_walk);
criterion_main!(benches);
