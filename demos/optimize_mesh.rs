//! Optimize a procedural mesh for a deployment target
//!
//! This example demonstrates the full pipeline:
//! - Building a dense test mesh
//! - Resolving a platform/quality preset
//! - Decimation and UV re-atlasing
//! - Reading memory telemetry after the run

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use meshfit::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;

#[global_allocator]
static GLOBAL: &PeakAlloc = &TRACKED_SYSTEM;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Shape {
    /// Subdivided box, flat sides
    Cube,
    /// Latitude/longitude sphere
    Sphere,
}

#[derive(Debug, Parser)]
#[command(name = "optimize_mesh", about = "Fit a procedural mesh to a platform budget")]
struct Args {
    /// Target platform (unity, blender, web, mobile)
    #[arg(long, default_value = "unity")]
    platform: String,

    /// Quality tier (high, balanced, performance)
    #[arg(long, default_value = "balanced")]
    quality: String,

    /// Reject unknown platform/quality names instead of falling back
    #[arg(long)]
    strict: bool,

    #[arg(long, value_enum, default_value_t = Shape::Cube)]
    shape: Shape,

    /// Subdivisions per side (cube) or rings (sphere)
    #[arg(long, default_value_t = 41)]
    subdivisions: usize,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

fn make_cube(n: usize) -> TriangleMesh {
    let n = n as i64;
    let sides: [([i64; 3], [i64; 3], [i64; 3]); 6] = [
        ([n, 0, 0], [0, 1, 0], [0, 0, 1]),
        ([0, 0, 0], [0, 0, 1], [0, 1, 0]),
        ([0, n, 0], [0, 0, 1], [1, 0, 0]),
        ([0, 0, 0], [1, 0, 0], [0, 0, 1]),
        ([0, 0, n], [1, 0, 0], [0, 1, 0]),
        ([0, 0, 0], [0, 1, 0], [1, 0, 0]),
    ];

    let mut mesh = TriangleMesh::new();
    let mut index: BTreeMap<[i64; 3], usize> = BTreeMap::new();
    for (origin, u, v) in sides {
        let mut vertex = |a: i64, b: i64, mesh: &mut TriangleMesh| -> usize {
            let p = [0, 1, 2].map(|k| origin[k] + a * u[k] + b * v[k]);
            *index.entry(p).or_insert_with(|| {
                mesh.add_vertex(Point3f::new(p[0] as f32, p[1] as f32, p[2] as f32))
            })
        };
        for a in 0..n {
            for b in 0..n {
                let p00 = vertex(a, b, &mut mesh);
                let p10 = vertex(a + 1, b, &mut mesh);
                let p11 = vertex(a + 1, b + 1, &mut mesh);
                let p01 = vertex(a, b + 1, &mut mesh);
                mesh.add_face([p00, p10, p11]);
                mesh.add_face([p00, p11, p01]);
            }
        }
    }
    mesh
}

fn make_sphere(rings: usize) -> TriangleMesh {
    let rings = rings.max(3);
    let segments = rings * 2;
    let mut mesh = TriangleMesh::new();

    let north = mesh.add_vertex(Point3f::new(0.0, 0.0, 1.0));
    for r in 1..rings {
        let theta = r as f32 / rings as f32 * std::f32::consts::PI;
        for s in 0..segments {
            let phi = s as f32 / segments as f32 * std::f32::consts::TAU;
            mesh.add_vertex(Point3f::new(
                theta.sin() * phi.cos(),
                theta.sin() * phi.sin(),
                theta.cos(),
            ));
        }
    }
    let south = mesh.add_vertex(Point3f::new(0.0, 0.0, -1.0));

    let ring = |r: usize, s: usize| 1 + (r - 1) * segments + s % segments;
    for s in 0..segments {
        mesh.add_face([north, ring(1, s), ring(1, s + 1)]);
        mesh.add_face([south, ring(rings - 1, s + 1), ring(rings - 1, s)]);
    }
    for r in 1..rings - 1 {
        for s in 0..segments {
            let (a, b) = (ring(r, s), ring(r, s + 1));
            let (c, d) = (ring(r + 1, s), ring(r + 1, s + 1));
            mesh.add_face([a, c, d]);
            mesh.add_face([a, d, b]);
        }
    }
    mesh
}

fn describe(label: &str, mesh: &TriangleMesh) {
    let center = mesh.center();
    println!(
        "{}: {} vertices, {} faces, area {:.3}, bounds center ({:.2}, {:.2}, {:.2}), diagonal {:.3}",
        label,
        mesh.vertex_count(),
        mesh.face_count(),
        mesh.surface_area(),
        center.x,
        center.y,
        center.z,
        mesh.diagonal()
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.strict {
        args.platform.parse::<Platform>().context("invalid --platform")?;
        args.quality.parse::<Quality>().context("invalid --quality")?;
    }

    let mesh = match args.shape {
        Shape::Cube => make_cube(args.subdivisions.max(1)),
        Shape::Sphere => make_sphere(args.subdivisions),
    };
    info!(
        "Built {:?} mesh: {} vertices, {} faces",
        args.shape,
        mesh.vertex_count(),
        mesh.face_count()
    );

    let probe = select_probe(true);
    let start = Instant::now();
    let (optimized, report) = OptimizationPipeline::default()
        .optimize_for_platform_str(&mesh, &args.platform, &args.quality)
        .with_context(|| format!("optimizing for {}/{}", args.platform, args.quality))?;
    let elapsed = start.elapsed();

    println!("meshfit optimization");
    println!("====================");
    println!("{}", report);
    describe("Input", &mesh);
    describe("Output", &optimized);
    println!(
        "Kept {:.1}% of input faces in {:.2?}",
        report.reduction_ratio() * 100.0,
        elapsed
    );
    println!("Memory ({}): {}", probe.name(), probe.sample());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
