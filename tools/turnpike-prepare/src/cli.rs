//! CLI commands for turnpike-prepare

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::SpeedProfile;
use crate::connectivity::TINY_COMPONENT_THRESHOLD;
use crate::prepare::{analyze_components, run_prepare, PrepareConfig};

#[derive(Parser)]
#[command(name = "turnpike-prepare")]
#[command(about = "Turn-aware (edge-expanded) routing graph preprocessing", long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the edge-expanded graph from a node-based graph document
    Prepare {
        /// Node-based graph (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for ebg.* files and ebg.lock.json
        #[arg(short, long)]
        outdir: PathBuf,

        /// Speed profile: car, bike, foot, or a TOML file
        #[arg(short, long, default_value = "car")]
        profile: String,

        /// Components with fewer nodes are tagged as tiny islands
        #[arg(long, default_value_t = TINY_COMPONENT_THRESHOLD)]
        tiny_threshold: u32,
    },

    /// Report the connected components of a node-based graph document
    Components {
        /// Node-based graph (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Size below which a component counts as tiny
        #[arg(long, default_value_t = TINY_COMPONENT_THRESHOLD)]
        tiny_threshold: u32,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare {
                input,
                outdir,
                profile,
                tiny_threshold,
            } => {
                let speed_profile = SpeedProfile::resolve(&profile)
                    .with_context(|| format!("Failed to load profile {profile}"))?;
                let config = PrepareConfig {
                    input_path: input,
                    outdir,
                    profile: speed_profile,
                    profile_name: profile,
                    tiny_threshold,
                };

                let result = run_prepare(&config)?;
                let stats = &result.stats;

                println!("Edge-expanded graph complete ({} ms)", result.build_time_ms);
                println!(
                    "  nodes removed by compression: {} (node ratio {:.3}, edge ratio {:.3})",
                    stats.removed_nodes, stats.node_compression_ratio, stats.edge_compression_ratio
                );
                println!(
                    "  components: {} ({} of size one)",
                    stats.components, stats.size_one_components
                );
                println!(
                    "  edge-based nodes: {} ({} segments)",
                    stats.edge_based_nodes, stats.edge_based_node_segments
                );
                println!(
                    "  edge-based edges: {} (restricted {}, u-turns skipped {}, barrier {})",
                    stats.edge_based_edges,
                    stats.restricted_turns,
                    stats.skipped_uturns,
                    stats.skipped_barrier_turns
                );
                if stats.penalty_failures > 0 {
                    println!("  turn penalty failures: {}", stats.penalty_failures);
                }
                println!("  lock file: {}", result.lock_path.display());
                Ok(())
            }
            Commands::Components {
                input,
                tiny_threshold,
            } => {
                let components = analyze_components(&input)?;
                let tiny = components.count_smaller_than(tiny_threshold);

                println!("Components of {}", input.display());
                println!("  components: {}", components.number_of_components());
                println!("  size one:   {}", components.size_one_count());
                println!("  largest:    {}", components.largest_component_size());
                println!("  below {tiny_threshold}: {tiny}");
                Ok(())
            }
        }
    }
}
