//! Layered config discovery.
//!
//! Lookup order: `<project>/bluekit.config.json`, then
//! `~/.bluekit/config.json`. When neither exists and a process endpoint is
//! required, well-known install locations of the MCP server are probed and
//! the first hit is persisted to the user config.

use std::path::{Path, PathBuf};

use super::{BlueKitConfig, ProcessConfig};
use crate::error::{Error, Result};

pub const PROJECT_CONFIG_FILE: &str = "bluekit.config.json";
pub const USER_CONFIG_DIR: &str = ".bluekit";
pub const USER_CONFIG_FILE: &str = "config.json";

/// Entry point of a built BlueKit MCP server, relative to its package root.
const SERVER_ENTRY: &str = "dist/main.js";

/// Which layer a config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Project(PathBuf),
    User(PathBuf),
    /// No file on disk; built-in defaults.
    Defaults,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: BlueKitConfig,
    pub source: ConfigSource,
}

/// Resolves BlueKit configuration for one CLI invocation.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    project_root: PathBuf,
    home: PathBuf,
    install_dir: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(project_root: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            home: home.into(),
            install_dir: None,
        }
    }

    /// Loader rooted at the current directory and the user's home.
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("could not determine home directory".into()))?;
        Ok(Self::new(cwd, home))
    }

    /// Directory of the running binary, used to probe for a bundled server.
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn project_config_path(&self) -> PathBuf {
        self.project_root.join(PROJECT_CONFIG_FILE)
    }

    pub fn user_config_path(&self) -> PathBuf {
        self.home.join(USER_CONFIG_DIR).join(USER_CONFIG_FILE)
    }

    /// Load the first config file that exists, or defaults when none does.
    pub fn load(&self) -> Result<LoadedConfig> {
        let project = self.project_config_path();
        if project.exists() {
            return Ok(LoadedConfig {
                config: read_config(&project)?,
                source: ConfigSource::Project(project),
            });
        }

        let user = self.user_config_path();
        if user.exists() {
            return Ok(LoadedConfig {
                config: read_config(&user)?,
                source: ConfigSource::User(user),
            });
        }

        Ok(LoadedConfig {
            config: BlueKitConfig::default(),
            source: ConfigSource::Defaults,
        })
    }

    /// Resolve how to spawn the MCP server, generating a user config if
    /// no layer provides one.
    pub fn resolve_process(&self, loaded: &LoadedConfig) -> Result<ProcessConfig> {
        match &loaded.source {
            ConfigSource::Project(path) | ConfigSource::User(path) => {
                loaded.config.mcp.clone().ok_or_else(|| {
                    Error::Config(format!("Missing 'mcp' entry in {}", path.display()))
                })
            }
            ConfigSource::Defaults => self.discover_and_persist(),
        }
    }

    /// Candidate locations of a built MCP server, most specific first.
    fn server_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(dir) = &self.install_dir {
            candidates.push(dir.join("../../blueKitMcp").join(SERVER_ENTRY));
            candidates.push(dir.join("../../../blueKitMcp").join(SERVER_ENTRY));
            candidates.push(dir.join("../../node_modules/bluekit-mcp-server").join(SERVER_ENTRY));
        }
        let root = &self.project_root;
        candidates.push(root.join("../blueKitMcp").join(SERVER_ENTRY));
        candidates.push(root.join("node_modules/bluekit-mcp-server").join(SERVER_ENTRY));
        candidates.push(root.join("../../blueKitMcp").join(SERVER_ENTRY));
        candidates
    }

    fn discover_and_persist(&self) -> Result<ProcessConfig> {
        let found = self
            .server_candidates()
            .into_iter()
            .find(|p| p.exists())
            .ok_or_else(|| Error::Config(self.missing_server_help()))?;

        let entry = found.canonicalize().unwrap_or(found);
        let process = ProcessConfig::new("node", vec![entry.to_string_lossy().into_owned()]);

        let user = self.user_config_path();
        let generated = BlueKitConfig {
            mcp: Some(process.clone()),
            ..BlueKitConfig::default()
        };
        if let Some(parent) = user.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&user, serde_json::to_string_pretty(&generated)?)?;
        tracing::info!(path = %user.display(), server = %entry.display(), "wrote default BlueKit config");

        Ok(process)
    }

    fn missing_server_help(&self) -> String {
        format!(
            "Could not find BlueKit MCP server. Please create a config file at {} or {} with:\n\
             {{\n  \"mcp\": {{\n    \"command\": \"node\",\n    \"args\": [\"/absolute/path/to/blueKitMcp/dist/main.js\"]\n  }}\n}}\n\
             \nOr build the MCP server first: cd blueKitMcp && npm run build",
            self.user_config_path().display(),
            self.project_config_path().display(),
        )
    }
}

fn read_config(path: &Path) -> Result<BlueKitConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to load config from {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Config(format!("Failed to load config from {}: {e}", path.display())))
}

/// Validate and absolutize the project directory a command operates on.
pub fn resolve_project_path(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(Error::ProjectPath(path.display().to_string()));
    }
    Ok(path.canonicalize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, body: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn project_config_takes_precedence() {
        let project = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(project.path(), home.path());

        write(
            &loader.project_config_path(),
            r#"{ "mcp": { "command": "project-server" } }"#,
        );
        write(
            &loader.user_config_path(),
            r#"{ "mcp": { "command": "user-server" } }"#,
        );

        let loaded = loader.load().unwrap();
        assert!(matches!(loaded.source, ConfigSource::Project(_)));
        let process = loader.resolve_process(&loaded).unwrap();
        assert_eq!(process.command, "project-server");
    }

    #[test]
    fn falls_back_to_user_config() {
        let project = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(project.path(), home.path());
        write(
            &loader.user_config_path(),
            r#"{ "mcp": { "command": "node", "args": ["main.js"] }, "session": { "timeout_ms": 5000 } }"#,
        );

        let loaded = loader.load().unwrap();
        assert!(matches!(loaded.source, ConfigSource::User(_)));
        assert_eq!(loaded.config.session.timeout_ms, 5000);
        assert_eq!(loaded.config.session.grace_ms, 100);
        let process = loader.resolve_process(&loaded).unwrap();
        assert_eq!(process.args, vec!["main.js".to_string()]);
    }

    #[test]
    fn missing_mcp_entry_is_an_error() {
        let project = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(project.path(), home.path());
        write(&loader.project_config_path(), "{}");

        let loaded = loader.load().unwrap();
        let err = loader.resolve_process(&loaded).unwrap_err();
        assert!(err.to_string().contains("Missing 'mcp' entry"));
    }

    #[test]
    fn unparseable_file_names_the_path() {
        let project = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(project.path(), home.path());
        write(&loader.project_config_path(), "{ not json");

        let err = loader.load().unwrap_err();
        assert!(err.to_string().contains("Failed to load config from"));
        assert!(err.to_string().contains(PROJECT_CONFIG_FILE));
    }

    #[test]
    fn discovers_server_and_writes_user_config() {
        let workspace = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let project = workspace.path().join("app");
        std::fs::create_dir_all(&project).unwrap();
        write(&workspace.path().join("blueKitMcp/dist/main.js"), "");

        let loader = ConfigLoader::new(&project, home.path());
        let loaded = loader.load().unwrap();
        assert_eq!(loaded.source, ConfigSource::Defaults);

        let process = loader.resolve_process(&loaded).unwrap();
        assert_eq!(process.command, "node");
        assert!(process.args[0].ends_with("main.js"));

        // Second run picks up the persisted file instead of probing.
        let reloaded = loader.load().unwrap();
        assert!(matches!(reloaded.source, ConfigSource::User(_)));
        assert_eq!(loader.resolve_process(&reloaded).unwrap(), process);
    }

    #[test]
    fn no_server_anywhere_explains_how_to_configure() {
        let project = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(project.path(), home.path());

        let loaded = loader.load().unwrap();
        let err = loader.resolve_process(&loaded).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Could not find BlueKit MCP server"));
        assert!(msg.contains("npm run build"));
        assert!(!loader.user_config_path().exists());
    }

    #[test]
    fn project_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_project_path(dir.path()).unwrap();
        assert!(resolved.is_absolute());

        let missing = dir.path().join("nope");
        assert!(matches!(
            resolve_project_path(&missing),
            Err(Error::ProjectPath(_))
        ));
    }
}
