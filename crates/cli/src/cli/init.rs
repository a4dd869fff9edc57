use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde_json::json;

use bk_domain::config::USER_CONFIG_DIR;

use super::{print_lines, Context, GlobalArgs, SERVER};
use crate::render;

/// State of the `~/.bluekit` store after [`ensure_store_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreDir {
    Existing(PathBuf),
    Created(PathBuf),
    Declined,
}

/// Register the current directory with the BlueKit registry.
pub async fn run(global: &GlobalArgs, yes: bool) -> anyhow::Result<()> {
    let ctx = Context::load(global)?;
    let project_path = ctx.project_path()?;

    match ensure_store_dir(ctx.home(), yes, prompt)? {
        StoreDir::Existing(_) => {}
        StoreDir::Created(dir) => println!("✅ Created BlueKit store directory at {}\n", dir.display()),
        StoreDir::Declined => {
            println!("\nOperation cancelled. BlueKit store directory is required.");
            return Ok(());
        }
    }

    println!("Initializing BlueKit project at: {}", project_path.display());
    let output = ctx
        .process_client()?
        .call(
            SERVER,
            "init_project",
            json!({ "projectPath": project_path.display().to_string() }),
        )
        .await?;
    print_lines(&render::result_lines(&output));
    Ok(())
}

/// Make sure `<home>/.bluekit` exists, asking before creating it unless
/// `assume_yes` is set.
pub fn ensure_store_dir(
    home: &Path,
    assume_yes: bool,
    ask: impl FnOnce(&str) -> String,
) -> anyhow::Result<StoreDir> {
    let dir = home.join(USER_CONFIG_DIR);
    if dir.exists() {
        return Ok(StoreDir::Existing(dir));
    }

    if !assume_yes {
        let answer = ask(
            "\nThe BlueKit store directory (~/.bluekit) does not exist.\n\
             Do you want to create it? (yes/no):",
        );
        if !matches!(answer.to_lowercase().as_str(), "yes" | "y") {
            return Ok(StoreDir::Declined);
        }
    }

    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    tracing::debug!(path = %dir.display(), "created BlueKit store directory");
    Ok(StoreDir::Created(dir))
}

fn prompt(question: &str) -> String {
    eprint!("{question} ");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input).unwrap_or_default();
    input.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_store_is_left_alone() {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir(home.path().join(".bluekit")).unwrap();

        let state = ensure_store_dir(home.path(), false, |_| panic!("should not prompt")).unwrap();
        assert_eq!(state, StoreDir::Existing(home.path().join(".bluekit")));
    }

    #[test]
    fn yes_flag_creates_without_prompting() {
        let home = tempfile::tempdir().unwrap();
        let state = ensure_store_dir(home.path(), true, |_| panic!("should not prompt")).unwrap();
        assert_eq!(state, StoreDir::Created(home.path().join(".bluekit")));
        assert!(home.path().join(".bluekit").is_dir());
    }

    #[test]
    fn answer_decides() {
        let home = tempfile::tempdir().unwrap();
        let state = ensure_store_dir(home.path(), false, |_| "No".into()).unwrap();
        assert_eq!(state, StoreDir::Declined);
        assert!(!home.path().join(".bluekit").exists());

        let state = ensure_store_dir(home.path(), false, |q| {
            assert!(q.contains("~/.bluekit"));
            "Y".into()
        })
        .unwrap();
        assert!(matches!(state, StoreDir::Created(_)));
    }

    #[test]
    fn create_failure_names_the_directory() {
        let home = tempfile::tempdir().unwrap();
        // A file where the home directory should be.
        let blocked = home.path().join("not-a-dir");
        std::fs::write(&blocked, "").unwrap();

        let err = ensure_store_dir(&blocked, true, |_| panic!("should not prompt")).unwrap_err();
        assert_eq!(err.to_string(), format!("creating {}", blocked.join(".bluekit").display()));
        assert_eq!(err.chain().count(), 2);
    }
}
