use std::path::{
    Path,
    PathBuf,
};

use directories::ProjectDirs;

const HISTORY_FILE: &str = "history.txt";
const STARTUP_SCRIPT: &str = "startup.repl";

/// The configuration directory of the shell, if the platform has one.
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "battler-wamp-repl").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Files used by the shell.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplConfig {
    /// Where line history is loaded from and saved to.
    pub history_file: Option<PathBuf>,
    /// Commands run before the first prompt.
    pub startup_script: Option<PathBuf>,
}

impl ReplConfig {
    /// Resolves the files used by the shell from command-line flags.
    ///
    /// Paths not given default to files under the configuration directory. The default startup
    /// script is only used if it exists.
    pub fn resolve(
        history_file: Option<PathBuf>,
        no_history: bool,
        startup_script: Option<PathBuf>,
        config_dir: Option<&Path>,
    ) -> Self {
        let history_file = match (no_history, history_file) {
            (true, _) => None,
            (false, Some(history_file)) => Some(history_file),
            (false, None) => config_dir.map(|dir| dir.join(HISTORY_FILE)),
        };
        let startup_script = startup_script.or_else(|| {
            config_dir
                .map(|dir| dir.join(STARTUP_SCRIPT))
                .filter(|path| path.is_file())
        });
        Self {
            history_file,
            startup_script,
        }
    }
}

#[cfg(test)]
mod config_test {
    use std::path::{
        Path,
        PathBuf,
    };

    use crate::config::ReplConfig;

    #[test]
    fn defaults_history_to_config_dir() {
        let config = ReplConfig::resolve(None, false, None, Some(Path::new("/nonexistent/repl")));
        assert_eq!(
            config.history_file,
            Some(PathBuf::from("/nonexistent/repl/history.txt"))
        );
        assert_eq!(config.startup_script, None);
    }

    #[test]
    fn prefers_explicit_paths() {
        let config = ReplConfig::resolve(
            Some(PathBuf::from("h.txt")),
            false,
            Some(PathBuf::from("s.repl")),
            Some(Path::new("/nonexistent/repl")),
        );
        pretty_assertions::assert_eq!(
            config,
            ReplConfig {
                history_file: Some(PathBuf::from("h.txt")),
                startup_script: Some(PathBuf::from("s.repl")),
            }
        );
    }

    #[test]
    fn disables_history() {
        let config = ReplConfig::resolve(
            Some(PathBuf::from("h.txt")),
            true,
            None,
            Some(Path::new("/nonexistent/repl")),
        );
        assert_eq!(config.history_file, None);
        assert_eq!(
            ReplConfig::resolve(None, false, None, None),
            ReplConfig::default()
        );
    }
}
