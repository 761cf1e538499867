//! Runs the extraction pipeline over a JSON scene description.
//!
//! ```text
//! rig_extract <scene.json> [settings.json]
//! RUST_LOG=debug rig_extract demo_apps/rig_extract/assets/simple_rig.json
//! ```

use anyhow::Context;
use rigkit::{ExtractSettings, ExtractionSummary, Pipeline, SceneDescription};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let scene_path = args
        .next()
        .context("usage: rig_extract <scene.json> [settings.json]")?;
    let settings = match args.next() {
        Some(path) => ExtractSettings::load(&path).with_context(|| format!("reading settings {path}"))?,
        None => ExtractSettings::default(),
    };

    let mut scene = SceneDescription::load(&scene_path)
        .and_then(|description| description.build())
        .with_context(|| format!("loading scene {scene_path}"))?;
    log::info!("Scene {scene_path}: {} nodes", scene.node_count());

    let pipeline = Pipeline::new(settings);
    let ctx = pipeline.run(&mut scene)?;

    let summary = ExtractionSummary::capture(&scene, &ctx)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
