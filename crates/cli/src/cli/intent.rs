//! `plan` and `generate`: hand a user intent to the BlueKit agent.

use std::path::Path;

use serde_json::{json, Value};

use super::{print_lines, Context, GlobalArgs, SERVER};
use crate::render;

pub const PLAN_INTENT: &str = "@bluekit/plan";
pub const GENERATE_INTENT: &str = "@bluekit/generate";

/// Planning goes through the editor bridge.
pub async fn plan(global: &GlobalArgs) -> anyhow::Result<()> {
    let ctx = Context::load(global)?;
    let project_path = ctx.project_path()?;
    println!("Sending planning command for directory: {}\n", project_path.display());

    let output = ctx
        .socket_client()
        .call(SERVER, "receiveUserCommand", intent_arguments(PLAN_INTENT, &project_path))
        .await?;
    print_lines(&render::intent_lines(&output));
    Ok(())
}

/// Generation spawns the MCP server directly.
pub async fn generate(global: &GlobalArgs) -> anyhow::Result<()> {
    let ctx = Context::load(global)?;
    let project_path = ctx.project_path()?;
    println!("Sending generation command for directory: {}\n", project_path.display());

    let output = ctx
        .process_client()?
        .call(SERVER, "receiveUserCommand", intent_arguments(GENERATE_INTENT, &project_path))
        .await?;
    print_lines(&render::intent_lines(&output));
    Ok(())
}

pub fn intent_arguments(intent: &str, cwd: &Path) -> Value {
    json!({
        "intent": intent,
        "cwd": cwd.display().to_string(),
    })
}
