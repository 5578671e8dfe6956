//! Validate a composition manifest.

use std::path::PathBuf;

use livemix_scene_model::Manifest;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating manifest at: {}", path.display());

    let json = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Failed to read manifest: {e}"))?;
    let manifest =
        Manifest::from_json(&json).map_err(|e| anyhow::anyhow!("Failed to parse manifest: {e}"))?;

    println!("  Scenes: {}", manifest.scenes.len());
    println!("  Elements: {}", manifest.element_ids().len());
    println!("  Initial scene: {}", manifest.initial_scene);

    let errors = manifest.validation_errors();
    if errors.is_empty() {
        println!("\nManifest is valid.");
        return Ok(());
    }

    println!("\nValidation issues:");
    for error in &errors {
        println!("  - {error}");
    }
    anyhow::bail!("{} issue(s) found", errors.len())
}
