use serde_json::json;

use super::{print_lines, Context, GlobalArgs, SERVER};
use crate::render;

/// Ping the editor bridge. Never fails: an unreachable bridge is reported
/// as a note.
pub async fn run(global: &GlobalArgs) {
    let result = async {
        let ctx = Context::load(global)?;
        let output = ctx.socket_client().call(SERVER, "ping", json!({})).await?;
        anyhow::Ok(output)
    }
    .await;

    match result {
        Ok(output) => print_lines(&render::ping_lines(&output)),
        Err(e) => {
            tracing::debug!(error = %e, "ping failed");
            print_lines(&render::ping_unavailable_lines(&e));
        }
    }
}
