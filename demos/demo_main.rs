//! Tiny CLI front-end over `agentpath_core`, standing in for what a host
//! scripting binding would do: build a graph from a built-in scenario,
//! issue one query, print the result and cache stats. Not part of the
//! core — it carries none of the core's invariants.

use agentpath_core::{EngineConfig, NodeId, PathEngine, PathStatus, Position};
use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Scenario {
    /// Four nodes in a straight line, cost 10 between consecutive pairs.
    Chain,
    /// A diamond: two equal-cost routes from A to D via B or C.
    Diamond,
    /// Two nodes connected by one long edge; queries an off-graph point.
    Projected,
}

#[derive(Parser)]
#[command(name = "agentpath-demo")]
#[command(about = "Runs one pathfinding query against a built-in scenario")]
struct Cli {
    #[arg(value_enum, default_value_t = Scenario::Chain)]
    scenario: Scenario,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut engine = PathEngine::new(EngineConfig {
        max_nodes: 64,
        max_edges_per_node: 8,
        heap_pool_block_size: 64,
        max_cache_path_length: 64,
        node_path_cache_capacity: 16,
        point_path_cache_capacity: 16,
        ..Default::default()
    });

    match cli.scenario {
        Scenario::Chain => run_chain(&mut engine)?,
        Scenario::Diamond => run_diamond(&mut engine)?,
        Scenario::Projected => run_projected(&mut engine)?,
    }

    let stats = engine.cache_stats();
    println!(
        "node path cache: {}/{} entries, hit rate {:.2}",
        stats.node_path_cache.entries,
        stats.node_path_cache.capacity,
        stats.node_path_cache.hit_rate()
    );
    println!(
        "distance cache: {} entries, {} hits, {} misses",
        stats.distance_cache_size, stats.distance_cache_hits, stats.distance_cache_misses
    );

    engine.shutdown();
    Ok(())
}

fn run_chain(engine: &mut PathEngine) -> Result<()> {
    let ids: Vec<NodeId> = [(0.0, 0.0), (10.0, 0.0), (20.0, 0.0), (30.0, 0.0)]
        .into_iter()
        .map(|(x, y)| engine.add_node(Position::new(x, y)))
        .collect::<Result<_, _>>()
        .map_err(|status| anyhow::anyhow!("add_node failed: {status}"))?;
    for pair in ids.windows(2) {
        engine.add_edge(pair[0], pair[1], 10.0, true)?;
    }

    let result = engine.find_path(ids[0], ids[3], 16);
    print_result("chain", &result.path, result.status, result.cost);
    Ok(())
}

fn run_diamond(engine: &mut PathEngine) -> Result<()> {
    let a = engine.add_node(Position::new(0.0, 0.0))?;
    let b = engine.add_node(Position::new(10.0, 10.0))?;
    let c = engine.add_node(Position::new(10.0, -10.0))?;
    let d = engine.add_node(Position::new(20.0, 0.0))?;
    engine.add_edge(a, b, 14.14, true)?;
    engine.add_edge(a, c, 14.14, true)?;
    engine.add_edge(b, d, 14.14, true)?;
    engine.add_edge(c, d, 14.14, true)?;

    let result = engine.find_path(a, d, 16);
    print_result("diamond", &result.path, result.status, result.cost);
    Ok(())
}

fn run_projected(engine: &mut PathEngine) -> Result<()> {
    let n1 = engine.add_node(Position::new(0.0, 0.0))?;
    let n2 = engine.add_node(Position::new(100.0, 0.0))?;
    engine.add_edge(n1, n2, 100.0, true)?;

    let result = engine.find_path_projected_from_point(Position::new(50.0, 5.0), n2, 16, 64);
    if result.status != PathStatus::Success {
        bail!("projected query failed: {:?}", result.status);
    }
    println!(
        "entry point: {:?}",
        result.entry_point.map(|p| (p.x, p.y))
    );
    print_result("projected", &result.path, result.status, result.cost);
    Ok(())
}

fn print_result(label: &str, path: &[NodeId], status: PathStatus, cost: f32) {
    let ids: Vec<u32> = path.iter().map(|n| n.0).collect();
    println!("{label}: status={status} path={ids:?} cost={cost:.2}");
}
