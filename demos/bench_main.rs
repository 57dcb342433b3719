//! Latency-sampling harness: builds a random grid graph, fires repeated
//! `find_path` queries between random node pairs, and reports p50/p95/p99
//! wall-clock latency plus cache stats. Mirrors `butterfly-route`'s
//! `src/bench/main.rs` shape (clap subcommand + hdrhistogram), scaled down
//! to this crate's single operation.
//!
//! Uses a small inline LCG rather than pulling `rand` into a non-dev
//! dependency just for reproducible position sampling.

use agentpath_core::{EngineConfig, NodeId, PathEngine, Position};
use clap::Parser;
use hdrhistogram::Histogram;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "agentpath-bench")]
#[command(about = "Latency benchmark for repeated find_path queries")]
struct Cli {
    /// Number of nodes in the generated grid graph.
    #[arg(long, default_value_t = 2000)]
    nodes: usize,

    /// Number of find_path queries to sample.
    #[arg(long, default_value_t = 5000)]
    queries: usize,

    /// PRNG seed for reproducibility.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

struct Lcg(u64);

impl Lcg {
    fn next_u64(&mut self) -> u64 {
        // Numerical Recipes constants; plenty uniform for bench sampling.
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0
    }

    fn next_index(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }

    fn next_unit_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}

fn build_grid_graph(engine: &mut PathEngine, nodes: usize) -> Vec<NodeId> {
    let side = (nodes as f64).sqrt().ceil() as usize;
    let spacing = 10.0;
    let mut ids = Vec::with_capacity(side * side);
    for row in 0..side {
        for col in 0..side {
            if ids.len() >= nodes {
                break;
            }
            let pos = Position::new(col as f32 * spacing, row as f32 * spacing);
            ids.push(engine.add_node(pos).expect("grid fits within max_nodes"));
        }
    }

    for row in 0..side {
        for col in 0..side {
            let idx = row * side + col;
            if idx >= ids.len() {
                continue;
            }
            if col + 1 < side && idx + 1 < ids.len() {
                engine.add_edge(ids[idx], ids[idx + 1], spacing, true).unwrap();
            }
            if row + 1 < side && idx + side < ids.len() {
                engine.add_edge(ids[idx], ids[idx + side], spacing, true).unwrap();
            }
        }
    }
    ids
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut engine = PathEngine::new(EngineConfig {
        max_nodes: cli.nodes,
        max_edges_per_node: 4,
        heap_pool_block_size: cli.nodes,
        max_cache_path_length: cli.nodes,
        node_path_cache_capacity: cli.nodes,
        point_path_cache_capacity: 256,
        ..Default::default()
    });

    let ids = build_grid_graph(&mut engine, cli.nodes);
    let mut rng = Lcg(cli.seed);

    let mut hist = Histogram::<u64>::new(3).expect("valid histogram sigfigs");
    let mut successes = 0u64;

    for _ in 0..cli.queries {
        let a = ids[rng.next_index(ids.len())];
        let b = ids[rng.next_index(ids.len())];

        let start = Instant::now();
        let result = engine.find_path(a, b, 256);
        let elapsed = start.elapsed();

        hist.record(elapsed.as_nanos() as u64).ok();
        if result.status == agentpath_core::PathStatus::Success
            || result.status == agentpath_core::PathStatus::StartGoalNodeSame
        {
            successes += 1;
        }
        // Occasionally perturb a node to exercise cache invalidation instead
        // of measuring an all-hit steady state exclusively.
        if rng.next_unit_f32() < 0.01 {
            let victim = ids[rng.next_index(ids.len())];
            if let Some(pos) = engine.get_node_position(victim) {
                engine.move_node(victim, Position::new(pos.x + 0.1, pos.y));
            }
        }
    }

    let stats = engine.cache_stats();

    println!("queries: {}  successes: {}", cli.queries, successes);
    println!(
        "latency ns: p50={} p95={} p99={} max={}",
        hist.value_at_quantile(0.50),
        hist.value_at_quantile(0.95),
        hist.value_at_quantile(0.99),
        hist.max()
    );
    println!(
        "node path cache: {} entries, {} hits ({:.1}% hit rate)",
        stats.node_path_cache.entries,
        stats.node_path_cache.hits,
        stats.node_path_cache.hit_rate() * 100.0
    );
    println!(
        "distance cache: {} entries, {} hits, {} misses",
        stats.distance_cache_size, stats.distance_cache_hits, stats.distance_cache_misses
    );

    engine.shutdown();
}
