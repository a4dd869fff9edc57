use anyhow::Context as _;
use serde_json::Value;

use super::{print_lines, Context, GlobalArgs};
use crate::render;

/// Call an arbitrary tool. Spawns the server unless `socket` is set.
pub async fn run(
    global: &GlobalArgs,
    server: &str,
    tool: &str,
    args: Option<&str>,
    socket: bool,
) -> anyhow::Result<()> {
    let arguments = parse_arguments(args)?;
    let ctx = Context::load(global)?;
    let client = if socket {
        ctx.socket_client()
    } else {
        ctx.process_client()?
    };

    let output = client.call(server, tool, arguments).await?;
    print_lines(&render::result_lines(&output));
    Ok(())
}

/// `--args` must be a JSON object; absent means `{}`.
pub fn parse_arguments(args: Option<&str>) -> anyhow::Result<Value> {
    let Some(raw) = args else {
        return Ok(Value::Object(Default::default()));
    };
    let value: Value = serde_json::from_str(raw).context("--args is not valid JSON")?;
    if !value.is_object() {
        anyhow::bail!("--args must be a JSON object, got: {raw}");
    }
    Ok(value)
}
