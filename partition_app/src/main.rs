//! Depth partition demo
//!
//! Builds an asteroid field stretching from a few units to ten million
//! units in front of the eye, culls it through a depth partition node for a
//! few frames while the eye drifts forward, and logs the segments and the
//! recorded draw calls.
//!
//! Usage: `partition_demo [partition.toml|partition.ron]`

use std::sync::Arc;

use rand::Rng;
use scene_cull::foundation::logging;
use scene_cull::prelude::*;
use scene_cull::render::GraphicsCommand;

const ASTEROID_COUNT: u64 = 400;
const GLASS_COUNT: u64 = 12;
const FRAMES: u32 = 3;
const NEAREST: f64 = 2.0;
const FARTHEST: f64 = 1.0e7;
const BACKGROUND: [f32; 4] = [0.02, 0.02, 0.06, 1.0];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_with_default("info");

    log::info!("Starting depth partition demo");

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "partition.toml".to_string());
    let config = PartitionConfig::load_or_default(&config_path)?;
    log::info!("Partition config from '{}': {:?}", config_path, config);

    let mut graph = SceneGraph::new();
    let partition = graph.create_depth_partition("field", DepthPartitionNode::from_config(&config));
    populate_field(&mut graph, partition)?;
    log::info!("Scene has {} nodes", graph.len());

    let mut registry = RenderBinRegistry::new();
    let draw_order = config.draw_order;
    registry.register("DepthSortedBin", move || Box::new(DepthSortedBin::new(draw_order)));

    let projection = Mat4d::perspective(60.0, 16.0 / 9.0, 1.0, 10.0);
    let viewport = Viewport::new(0, 0, 1280, 720);
    let mut cull = CullVisitor::new(CullSettings::default(), &registry);

    for frame in 0..FRAMES {
        let eye = Vec3d::new(0.0, 0.0, -f64::from(frame) * 0.5);
        let view = Mat4d::look_at(eye, eye - Vec3d::z(), Vec3d::y());

        let mut stage = cull.cull_scene(&graph, partition, &view, &projection, viewport, BACKGROUND);
        stage.sort();

        let mut ctx = RecordingContext::new();
        stage.draw(&mut ctx);

        report_frame(frame, &graph, partition, &stage, &ctx);
    }

    log::info!("Demo finished");
    Ok(())
}

/// Asteroids spread log-uniformly in depth, plus a few glass panes near the
/// eye that end up in the depth-sorted bin
fn populate_field(graph: &mut SceneGraph, partition: NodeId) -> Result<(), SceneError> {
    let mut rng = rand::thread_rng();
    let (min_exp, max_exp) = (NEAREST.log10(), FARTHEST.log10());

    for id in 0..ASTEROID_COUNT {
        let distance = 10f64.powf(rng.gen_range(min_exp..max_exp));
        // Stay inside a cone narrower than the field of view
        let spread = distance * 0.4;
        let center = Vec3d::new(
            rng.gen_range(-spread..spread),
            rng.gen_range(-spread * 0.5..spread * 0.5),
            -distance,
        );
        let radius = distance * rng.gen_range(0.001..0.05);

        let asteroid = Drawable::new(
            DrawableId(id),
            BoundingBox::from_center_extents(center, Vec3d::repeat(radius)),
        );
        let geode = graph.create_geode(format!("asteroid {}", id), vec![asteroid]);
        graph.add_child(partition, geode)?;
    }

    let glass = Arc::new(StateSet::new("glass", RenderingHint::Transparent));
    let panes = (0..GLASS_COUNT)
        .map(|i| {
            let id = ASTEROID_COUNT + i;
            let center = Vec3d::new(rng.gen_range(-2.0..2.0), 0.0, -rng.gen_range(5.0..40.0));
            Drawable::new(DrawableId(id), BoundingBox::from_center_extents(center, Vec3d::repeat(0.5)))
                .with_state(Arc::clone(&glass))
        })
        .collect();
    let canopy = graph.create_geode("canopy", panes);
    graph.add_child(partition, canopy)?;

    Ok(())
}

fn report_frame(
    frame: u32,
    graph: &SceneGraph,
    partition: NodeId,
    stage: &RenderStage,
    ctx: &RecordingContext,
) {
    log::info!(
        "Frame {}: {} segment stages, {} leaves",
        frame,
        stage.post_render_stages().len() + stage.pre_render_stages().len() + stage.nested_stages().len(),
        stage.total_leaf_count()
    );

    if let Some(node) = graph.depth_partition(partition) {
        for (index, segment) in node.distance_accumulator().camera_pairs().iter().enumerate() {
            log::info!(
                "  segment {}: near {:.3} far {:.3} (ratio {:.5})",
                index,
                segment.near,
                segment.far,
                segment.ratio()
            );
        }
        log::debug!("  {} camera slots", node.num_cameras());
    }

    let clears = ctx
        .commands()
        .iter()
        .filter(|c| matches!(c, GraphicsCommand::Clear { .. }))
        .count();
    let draws = ctx.draw_sequence();
    log::info!(
        "  {} clears, {} projection loads, {} draws",
        clears,
        ctx.projection_loads(),
        draws.len()
    );
    log::trace!("  draw sequence: {:?}", draws);
}
