//! Process-wide build options
//!
//! Read once from the environment on first use:
//!
//! - `VEXEL_BUILD_INFO` - `true`/`1`/`yes` logs every generated module's
//!   full source at info level
//! - `VEXEL_TUNING_FILE` - path to a JSON tuning database that replaces the
//!   built-in table; if it cannot be read or parsed the built-in table is
//!   used and a warning is logged

use crate::error::Result;
use std::env;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{info, warn};
use vexel_codegen::TuningDatabase;

pub const BUILD_INFO_ENV: &str = "VEXEL_BUILD_INFO";
pub const TUNING_FILE_ENV: &str = "VEXEL_TUNING_FILE";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Log generated source when a module is built
    pub build_info: bool,
    /// Tuning database to load instead of the built-in one
    pub tuning_file: Option<PathBuf>,
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|value| value.eq_ignore_ascii_case("true") || value == "1" || value.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}

impl BuildOptions {
    pub fn from_env() -> Self {
        let tuning_file = env::var_os(TUNING_FILE_ENV)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Self {
            build_info: env_flag(BUILD_INFO_ENV),
            tuning_file,
        }
    }

    /// Load the tuning database these options select.
    pub fn load_tuning_database(&self) -> Result<TuningDatabase> {
        match &self.tuning_file {
            None => Ok(TuningDatabase::builtin()),
            Some(path) => {
                let json = std::fs::read_to_string(path)?;
                let db = TuningDatabase::from_json(&json)?;
                info!(path = %path.display(), entries = db.entries().len(), "loaded tuning database");
                Ok(db)
            }
        }
    }

    /// [`Self::load_tuning_database`], falling back to the built-in table.
    pub fn tuning_database_or_builtin(&self) -> TuningDatabase {
        self.load_tuning_database().unwrap_or_else(|err| {
            warn!(
                path = ?self.tuning_file,
                error = %err,
                "tuning file unusable, using built-in tuning database"
            );
            TuningDatabase::builtin()
        })
    }
}

static OPTIONS: LazyLock<BuildOptions> = LazyLock::new(BuildOptions::from_env);
static TUNING: LazyLock<TuningDatabase> = LazyLock::new(|| OPTIONS.tuning_database_or_builtin());

/// Options read from the environment at first use
pub fn build_options() -> &'static BuildOptions {
    &OPTIONS
}

/// Tuning database used by [`crate::ensure_module_ready`]
pub fn tuning_database() -> &'static TuningDatabase {
    &TUNING
}
