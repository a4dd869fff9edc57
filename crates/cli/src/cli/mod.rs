pub mod apply;
pub mod call;
pub mod init;
pub mod intent;
pub mod magic;
pub mod ping;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use bk_domain::config::{resolve_project_path, ConfigLoader, Endpoint, LoadedConfig};
use bk_mcp_client::{ClientOptions, McpClient};

/// Name every BlueKit tool is registered under.
pub const SERVER: &str = "bluekit";

/// BlueKit: plan, generate and apply kits through the BlueKit MCP server.
#[derive(Debug, Parser)]
#[command(name = "bluekit", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Log MCP traffic and process lifecycle to stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Override the per-call timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Health check for the CLI and the editor bridge.
    Ping,
    /// Register the current directory with the BlueKit registry.
    Init {
        /// Create ~/.bluekit without asking.
        #[arg(long, short)]
        yes: bool,
    },
    /// Apply instructions to generate code.
    Apply {
        /// Use local values only.
        #[arg(long)]
        local: bool,
        /// Apply recursively.
        #[arg(long)]
        recursive: bool,
    },
    /// Analyze the directory and build the domain tree without writing files.
    Plan,
    /// Plan and create all kits for this directory.
    Generate,
    /// Create a .magic.md file in the current directory.
    Magic,
    /// Call any tool and print its result.
    Call {
        /// Server the tool is registered under.
        server: String,
        /// Tool name.
        tool: String,
        /// Tool arguments as a JSON object.
        #[arg(long)]
        args: Option<String>,
        /// Go through the editor bridge socket instead of spawning the server.
        #[arg(long)]
        socket: bool,
    },
}

// ── Shared command context ────────────────────────────────────────────

/// Config and client options resolved once per invocation.
pub struct Context {
    loader: ConfigLoader,
    loaded: LoadedConfig,
    options: ClientOptions,
    cwd: PathBuf,
}

impl Context {
    /// Load config for the current directory and user.
    pub fn load(global: &GlobalArgs) -> anyhow::Result<Self> {
        let mut loader = ConfigLoader::from_env()?;
        if let Some(dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
            loader = loader.with_install_dir(dir);
        }
        let cwd = std::env::current_dir()?;
        Self::from_loader(loader, cwd, global)
    }

    pub fn from_loader(loader: ConfigLoader, cwd: PathBuf, global: &GlobalArgs) -> anyhow::Result<Self> {
        let loaded = loader.load()?;
        tracing::debug!(source = ?loaded.source, "loaded BlueKit config");

        let mut options = ClientOptions::from(&loaded.config.session);
        // Results print as soon as they arrive; `main` waits for the servers
        // to stop before exiting.
        options.detach_shutdown = true;
        if let Some(ms) = global.timeout_ms {
            options.timeout = Duration::from_millis(ms);
        }
        Ok(Self {
            loader,
            loaded,
            options,
            cwd,
        })
    }

    pub fn home(&self) -> &Path {
        self.loader.home()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The working directory, unchecked.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// The working directory, validated and canonicalized.
    pub fn project_path(&self) -> anyhow::Result<PathBuf> {
        Ok(resolve_project_path(&self.cwd)?)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.loaded.config.socket.resolve(self.home())
    }

    /// Client for the editor bridge socket.
    pub fn socket_client(&self) -> McpClient {
        McpClient::new(Endpoint::Socket(self.socket_path()), self.options.clone())
    }

    /// Client that spawns the MCP server. May write a generated user config.
    pub fn process_client(&self) -> anyhow::Result<McpClient> {
        let process = self.loader.resolve_process(&self.loaded)?;
        Ok(McpClient::new(Endpoint::Process(process), self.options.clone()))
    }
}

/// Print rendered lines to stdout.
pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_the_subcommand() {
        let cli = Cli::try_parse_from(["bluekit", "plan", "--verbose", "--timeout-ms", "500"]).unwrap();
        assert!(matches!(cli.command, Command::Plan));
        assert!(cli.global.verbose);
        assert_eq!(cli.global.timeout_ms, Some(500));
    }

    #[test]
    fn parses_apply_flags() {
        let cli = Cli::try_parse_from(["bluekit", "apply", "--local"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Apply {
                local: true,
                recursive: false
            }
        ));
    }

    #[test]
    fn parses_generic_call() {
        let cli = Cli::try_parse_from([
            "bluekit", "call", "bluekit", "magic", "--args", r#"{"directory":"/tmp"}"#, "--socket",
        ])
        .unwrap();
        let Command::Call { server, tool, args, socket } = cli.command else {
            panic!("expected call");
        };
        assert_eq!(server, "bluekit");
        assert_eq!(tool, "magic");
        assert_eq!(args.as_deref(), Some(r#"{"directory":"/tmp"}"#));
        assert!(socket);
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["bluekit"]).is_err());
    }

    #[test]
    fn context_applies_timeout_override_and_socket_default() {
        let project = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(project.path(), home.path());
        let global = GlobalArgs {
            verbose: false,
            timeout_ms: Some(1_500),
        };

        let ctx = Context::from_loader(loader, project.path().to_path_buf(), &global).unwrap();
        assert_eq!(ctx.options().timeout, Duration::from_millis(1_500));
        assert!(ctx.options().detach_shutdown);
        assert_eq!(
            ctx.socket_path(),
            home.path().join(".cursor").join("mcp").join("bridge.sock")
        );
        assert_eq!(ctx.project_path().unwrap(), project.path().canonicalize().unwrap());
    }

    #[test]
    fn context_uses_configured_process() {
        let project = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            project.path().join("bluekit.config.json"),
            r#"{ "mcp": { "command": "node", "args": ["/opt/bluekit/dist/main.js"] } }"#,
        )
        .unwrap();
        let loader = ConfigLoader::new(project.path(), home.path());

        let ctx = Context::from_loader(loader, project.path().to_path_buf(), &GlobalArgs::default()).unwrap();
        let client = ctx.process_client().unwrap();
        let Endpoint::Process(process) = client.endpoint() else {
            panic!("expected a process endpoint");
        };
        assert_eq!(process.command, "node");
        assert_eq!(process.args, vec!["/opt/bluekit/dist/main.js".to_string()]);
    }
}
