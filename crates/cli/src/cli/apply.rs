use std::path::Path;

use serde_json::{json, Map, Value};

use super::{print_lines, Context, GlobalArgs, SERVER};
use crate::render;

/// Apply the project's instructions through the editor bridge.
pub async fn run(global: &GlobalArgs, local: bool, recursive: bool) -> anyhow::Result<()> {
    let ctx = Context::load(global)?;
    let project_path = ctx.project_path()?;
    println!("Applying instructions for project: {}", project_path.display());

    let output = ctx
        .socket_client()
        .call(SERVER, "apply_instructions", apply_arguments(&project_path, local, recursive))
        .await?;
    print_lines(&render::result_lines(&output));
    Ok(())
}

/// Only the flags that are set are sent.
pub fn apply_arguments(project_path: &Path, local: bool, recursive: bool) -> Value {
    let mut flags = Map::new();
    if local {
        flags.insert("local".into(), Value::Bool(true));
    }
    if recursive {
        flags.insert("recursive".into(), Value::Bool(true));
    }
    json!({
        "projectPath": project_path.display().to_string(),
        "flags": flags,
    })
}
