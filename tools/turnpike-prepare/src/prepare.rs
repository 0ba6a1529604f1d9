//! End-to-end preparation: JSON network in, edge-expanded graph files out

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::config::SpeedProfile;
use crate::connectivity::{bfs_components, tag_tiny_components, ComponentMap};
use crate::ebg::{EdgeBasedGraphFactory, FactoryStats};
use crate::formats::{
    EbgEdges, EbgEdgesFile, EbgNodes, EbgNodesFile, NodeBasedInput, NodeBasedNetwork,
    NodeDataFile, NodeDataTable,
};
use crate::lock::{sha256_file, LockFile};
use crate::restriction::RestrictionMap;

pub const ORIGINAL_EDGES_FILE: &str = "ebg.original_edges";
pub const GEOMETRY_FILE: &str = "ebg.geometry";
pub const NODES_FILE: &str = "ebg.nodes";
pub const EDGES_FILE: &str = "ebg.edges";
pub const NODE_DATA_FILE: &str = "ebg.node_data";
pub const LOCK_FILE: &str = "ebg.lock.json";

#[derive(Debug, Clone)]
pub struct PrepareConfig {
    pub input_path: PathBuf,
    pub outdir: PathBuf,
    pub profile: SpeedProfile,
    /// Preset name or profile path, recorded in the lock file
    pub profile_name: String,
    pub tiny_threshold: u32,
}

#[derive(Debug)]
pub struct PrepareResult {
    pub original_edges_path: PathBuf,
    pub geometry_path: PathBuf,
    pub nodes_path: PathBuf,
    pub edges_path: PathBuf,
    pub node_data_path: PathBuf,
    pub lock_path: PathBuf,
    pub stats: FactoryStats,
    pub build_time_ms: u64,
}

pub fn run_prepare(config: &PrepareConfig) -> Result<PrepareResult> {
    let start = Instant::now();
    info!(
        input = %config.input_path.display(),
        outdir = %config.outdir.display(),
        profile = %config.profile_name,
        "preparing edge-expanded graph"
    );

    config.profile.validate()?;
    std::fs::create_dir_all(&config.outdir)
        .with_context(|| format!("Failed to create {}", config.outdir.display()))?;

    let inputs_sha = sha256_file(&config.input_path)?;
    let NodeBasedNetwork {
        mut graph,
        node_info,
        restrictions,
        barrier_nodes,
        traffic_lights,
    } = NodeBasedInput::load(&config.input_path)?.into_network();

    let restriction_map = RestrictionMap::new(&restrictions);
    tag_tiny_components(
        &mut graph,
        &restriction_map,
        &barrier_nodes,
        config.tiny_threshold,
    );

    let original_edges_path = config.outdir.join(ORIGINAL_EDGES_FILE);
    let geometry_path = config.outdir.join(GEOMETRY_FILE);
    let turn_penalty = config.profile.turn_penalty_function();
    let factory = EdgeBasedGraphFactory::new(
        &mut graph,
        &node_info,
        restriction_map,
        &barrier_nodes,
        &traffic_lights,
        &config.profile,
        turn_penalty.as_ref(),
    )?;
    let expanded = factory
        .run(&original_edges_path, &geometry_path)
        .context("edge expansion failed")?;

    let created_unix = chrono::Utc::now().timestamp().max(0) as u64;

    let nodes_path = config.outdir.join(NODES_FILE);
    EbgNodesFile::write(
        &nodes_path,
        &EbgNodes {
            created_unix,
            inputs_sha,
            nodes: expanded.nodes,
        },
    )?;

    let edges_path = config.outdir.join(EDGES_FILE);
    EbgEdgesFile::write(
        &edges_path,
        &EbgEdges {
            created_unix,
            inputs_sha,
            edges: expanded.edges,
        },
    )?;

    let node_data_path = config.outdir.join(NODE_DATA_FILE);
    NodeDataFile::write(
        &node_data_path,
        &NodeDataTable {
            created_unix,
            inputs_sha,
            nodes: expanded.node_data,
        },
    )?;

    let lock = LockFile::create(
        &config.input_path,
        &[
            original_edges_path.as_path(),
            geometry_path.as_path(),
            nodes_path.as_path(),
            edges_path.as_path(),
            node_data_path.as_path(),
        ],
        &config.profile_name,
        config.tiny_threshold,
        expanded.stats.clone(),
    )?;
    let lock_path = config.outdir.join(LOCK_FILE);
    lock.write(&lock_path)?;

    let build_time_ms = start.elapsed().as_millis() as u64;
    info!(
        edge_based_nodes = expanded.stats.edge_based_nodes,
        edge_based_edges = expanded.stats.edge_based_edges,
        build_time_ms,
        "edge-expanded graph complete"
    );

    Ok(PrepareResult {
        original_edges_path,
        geometry_path,
        nodes_path,
        edges_path,
        node_data_path,
        lock_path,
        stats: expanded.stats,
        build_time_ms,
    })
}

/// Connectivity of an imported network, without expanding it
pub fn analyze_components(input_path: &Path) -> Result<ComponentMap> {
    let network = NodeBasedInput::load(input_path)?.into_network();
    let restriction_map = RestrictionMap::new(&network.restrictions);
    Ok(bfs_components(
        &network.graph,
        &restriction_map,
        &network.barrier_nodes,
    ))
}
