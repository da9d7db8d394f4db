pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};

/// Environment variable pointing directly at a stack file
pub const STACK_PATH_ENV: &str = "CUMULUS_STACK_PATH";

/// Candidate file names, highest priority first
const CANDIDATES: [&str; 4] = ["stack.local.kdl", ".stack.local.kdl", "stack.kdl", ".stack.kdl"];

/// Get the Cumulus config directory (`~/.config/cumulus`), creating it if needed
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("cumulus");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the stack file for the current project
///
/// Search order:
/// 1. `CUMULUS_STACK_PATH` (direct path)
/// 2. current directory: stack.local.kdl, .stack.local.kdl, stack.kdl, .stack.kdl
/// 3. the same names inside `./.cumulus/`
/// 4. `~/.config/cumulus/stack.kdl` (global)
pub fn find_stack_file() -> Result<PathBuf> {
    if let Ok(stack_path) = std::env::var(STACK_PATH_ENV) {
        let path = PathBuf::from(stack_path);
        if path.exists() {
            tracing::debug!(path = %path.display(), "Using stack file from {}", STACK_PATH_ENV);
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{} points at a missing file", STACK_PATH_ENV);
    }

    let current_dir = std::env::current_dir()?;
    if let Some(path) = find_in_dir(&current_dir) {
        return Ok(path);
    }

    let cumulus_dir = current_dir.join(".cumulus");
    if cumulus_dir.is_dir()
        && let Some(path) = find_in_dir(&cumulus_dir)
    {
        return Ok(path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("cumulus").join("stack.kdl");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::StackFileNotFound)
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    struct CwdGuard(PathBuf);

    impl CwdGuard {
        fn enter(dir: &Path) -> Self {
            let original = std::env::current_dir().unwrap();
            std::env::set_current_dir(dir).unwrap();
            Self(original)
        }
    }

    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    #[test]
    fn test_get_config_dir() {
        let config_dir = get_config_dir().unwrap();
        assert!(config_dir.ends_with("cumulus"));
        assert!(config_dir.exists());
    }

    #[test]
    #[serial]
    fn test_find_stack_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// test").unwrap();
        let _guard = CwdGuard::enter(temp_dir.path());

        let stack_file = find_stack_file().unwrap();
        assert!(stack_file.ends_with("stack.kdl"));
    }

    #[test]
    #[serial]
    fn test_local_file_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "// shared").unwrap();
        fs::write(temp_dir.path().join("stack.local.kdl"), "// local").unwrap();
        let _guard = CwdGuard::enter(temp_dir.path());

        let result = find_stack_file().unwrap();
        assert!(result.ends_with("stack.local.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_stack_file_in_cumulus_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dot_dir = temp_dir.path().join(".cumulus");
        fs::create_dir(&dot_dir).unwrap();
        fs::write(dot_dir.join("stack.kdl"), "// nested").unwrap();
        let _guard = CwdGuard::enter(temp_dir.path());

        let result = find_stack_file().unwrap();
        assert!(result.ends_with(".cumulus/stack.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_stack_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let stack_path = temp_dir.path().join("custom.kdl");
        fs::write(&stack_path, "// custom").unwrap();

        unsafe {
            std::env::set_var(STACK_PATH_ENV, stack_path.to_str().unwrap());
        }

        let result = find_stack_file().unwrap();
        assert_eq!(result, stack_path);

        unsafe {
            std::env::remove_var(STACK_PATH_ENV);
        }
    }

    #[test]
    #[serial]
    fn test_find_stack_file_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(temp_dir.path());

        match find_stack_file() {
            Err(ConfigError::StackFileNotFound) => {}
            // a developer machine may carry a global ~/.config/cumulus/stack.kdl
            Ok(path) => assert!(path.ends_with("cumulus/stack.kdl")),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
