//! Inspect AR room-scan captures from the command line.
//!
//! Run with: cargo run --bin roomscan -- Room.usdz [--tree] [--json]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use roomscan_core::usd::StageInfo;
use roomscan_core::{
    DecodeOptions, DecodeReport, DecodedScene, SceneNode, SceneSummary, UsdzDecoder,
    VisibilityFilter,
};
use roomscan_math::{Mat4, Vec3};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// USDZ archives or USDA layers to decode
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON file with decode options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print one JSON report per file instead of text
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Print the node hierarchy
    #[arg(long, default_value_t = false)]
    tree: bool,

    /// Only list walls, floors, doors, windows and openings
    #[arg(long, default_value_t = false)]
    structure_only: bool,
}

#[derive(Serialize)]
struct FileReport<'a> {
    path: String,
    summary: SceneSummary,
    stage: &'a StageInfo,
    diagnostics: &'a DecodeReport,
}

fn load_options(path: Option<&Path>) -> Result<DecodeOptions> {
    let Some(path) = path else {
        return Ok(DecodeOptions::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn filter_for(args: &Args) -> VisibilityFilter {
    if args.structure_only {
        VisibilityFilter::StructureOnly
    } else {
        VisibilityFilter::All
    }
}

fn print_tree(node: &SceneNode, parent: Mat4, depth: usize) {
    let world = parent * node.transform.matrix();
    let pos = world.transform_point3(Vec3::ZERO);

    let mut flags = Vec::new();
    if node.tags.is_door {
        flags.push("door");
    }
    if node.tags.is_window {
        flags.push("window");
    }
    if node.tags.is_structure {
        flags.push("structure");
    }

    let name = if depth == 0 && node.name.is_empty() {
        "<root>"
    } else {
        node.name.as_str()
    };
    let mut line = format!(
        "{:indent$}{} at ({:.2}, {:.2}, {:.2})",
        "",
        name,
        pos.x,
        pos.y,
        pos.z,
        indent = depth * 2
    );
    if let Some(part) = &node.mesh {
        line.push_str(&format!(
            " - {} triangles, material '{}'",
            part.buffers.triangle_count(),
            part.material.name
        ));
        if part.material.is_glass() {
            line.push_str(" (glass)");
        }
    }
    if !flags.is_empty() {
        line.push_str(&format!(" [{}]", flags.join(", ")));
    }
    println!("{}", line);

    for child in &node.children {
        print_tree(child, world, depth + 1);
    }
}

fn print_text(path: &Path, scene: &DecodedScene, args: &Args) {
    let summary = scene.root.summary();

    println!("\n=== {} ===", path.display());
    if let Some(entry) = &scene.entry {
        println!("Entry layer: {}", entry);
    }
    if let Some(prim) = &scene.stage.default_prim {
        println!("Default prim: {}", prim);
    }
    println!("Nodes: {}", summary.nodes);
    println!(
        "Meshes: {} ({} structure, {} glass, {} textured)",
        summary.meshes, summary.structure_meshes, summary.glass_meshes, summary.textured_meshes
    );
    println!("Doors: {}  Windows: {}", summary.doors, summary.windows);
    println!("Total triangles: {}", summary.triangles);
    if let Some((min, max)) = summary.bounds {
        println!(
            "Bounds: ({:.2}, {:.2}, {:.2}) to ({:.2}, {:.2}, {:.2})",
            min[0], min[1], min[2], max[0], max[1], max[2]
        );
    }

    let draw_list = scene.root.draw_list(filter_for(args));
    println!("\n--- Draw list ({}) ---", draw_list.len());
    for item in &draw_list {
        println!(
            "  {} - {} vertices, {} triangles, normals: {}",
            item.node.name,
            item.part.buffers.vertex_count(),
            item.part.buffers.triangle_count(),
            item.part.buffers.has_normals()
        );
    }

    if args.tree {
        println!("\n--- Hierarchy ---");
        print_tree(&scene.root, Mat4::IDENTITY, 0);
    }

    if !scene.report.is_empty() {
        println!("\n--- Diagnostics ({}) ---", scene.report.len());
        for diagnostic in &scene.report.diagnostics {
            println!("  {}", diagnostic);
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let options = load_options(args.config.as_deref())?;
    log::debug!("Decode options: {:?}", options);

    let decoder = UsdzDecoder::new(options);
    let results: Vec<_> = args
        .files
        .par_iter()
        .map(|path| (path, decoder.decode_file(path)))
        .collect();

    let mut failures = 0;
    for (path, result) in results {
        let scene = match result {
            Ok(scene) => scene,
            Err(e) => {
                log::error!("{}: {}", path.display(), e);
                failures += 1;
                continue;
            }
        };

        if args.json {
            let report = FileReport {
                path: path.display().to_string(),
                summary: scene.root.summary(),
                stage: &scene.stage,
                diagnostics: &scene.report,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_text(path, &scene, &args);
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} file(s) failed to decode", failures, args.files.len());
    }
    Ok(())
}
