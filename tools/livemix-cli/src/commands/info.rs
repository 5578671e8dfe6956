//! Show manifest information.

use std::path::PathBuf;

use livemix_scene_model::Manifest;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let manifest =
        Manifest::load(&path).map_err(|e| anyhow::anyhow!("Failed to load manifest: {e}"))?;

    println!("Manifest: {}", path.display());
    println!("  Initial scene: {}", manifest.initial_scene);
    println!();

    println!("Output:");
    let video = &manifest.video;
    println!(
        "  Video: {}x{}, frame {} ({:.3} fps)",
        video.width,
        video.height,
        video.frame_duration,
        1.0 / video.frame_duration.seconds().max(f64::EPSILON)
    );
    println!(
        "  Audio: {} ch @ {} Hz",
        manifest.audio.channels, manifest.audio.sample_rate
    );
    println!();

    for (scene_id, scene) in &manifest.scenes {
        println!("Scene '{scene_id}':");
        for (element_id, element) in &scene.elements {
            let parent = element
                .parent
                .as_deref()
                .map(|p| format!(" (parent: {p})"))
                .unwrap_or_default();
            println!("  {element_id}{parent}");
            for (state_id, state) in &element.states {
                let initial = if element.initial_state.as_deref() == Some(state_id.as_str()) {
                    " [initial]"
                } else {
                    ""
                };
                println!(
                    "    {state_id}{initial}: pos ({}, {}, {}) size {}x{} gain {}{}{}",
                    state.pic_pos.x,
                    state.pic_pos.y,
                    state.pic_pos.z,
                    state.size.x,
                    state.size.y,
                    state.audio_gain,
                    if state.hidden { " hidden" } else { "" },
                    if state.muted { " muted" } else { "" },
                );
            }
        }
        println!();
    }

    Ok(())
}
