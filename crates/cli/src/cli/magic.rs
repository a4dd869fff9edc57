use serde_json::json;

use super::{print_lines, Context, GlobalArgs, SERVER};
use crate::render;

/// Ask the editor bridge to write `.magic.md` into the working directory.
pub async fn run(global: &GlobalArgs) -> anyhow::Result<()> {
    let ctx = Context::load(global)?;
    let directory = ctx.cwd().display().to_string();

    let output = ctx
        .socket_client()
        .call(SERVER, "magic", json!({ "directory": directory }))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create .magic.md file: {e}"))?;
    print_lines(&render::magic_lines(&output));
    Ok(())
}
