//! Compiler configuration.
//!
//! Mirrors the teacher's `CompilerConfig` builder: a small, serializable
//! settings record that both the CLI (parsed from a `stgc.toml`, if one is
//! present next to the input file) and library embedders can construct.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Controls whether let-bound thunks that are only ever used once get
/// downgraded from an updateable (`U`) lambda form to a non-updateable
/// (`N`) one, skipping the update-frame push/pop (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OptimizationLevel {
    /// Every thunk is updateable; no single-entry-point analysis runs.
    #[default]
    O0,
    /// Thunks proven to have exactly one use site are lowered as `N`.
    O1,
}

/// Compiler configuration.
///
/// Allows embedders to adjust optimization and output behavior without
/// touching the CLI. Loadable from a TOML file via [`CompilerConfig::from_toml`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Thunk-update optimization level (§4.1).
    #[serde(default)]
    pub optimization_level: OptimizationLevel,

    /// Where to write the generated C translation unit. `None` means
    /// "alongside the output binary, with a `.c` extension" (the CLI's
    /// default).
    #[serde(default)]
    pub emit_c_path: Option<PathBuf>,

    /// Keep the generated `.c` file after linking instead of deleting it.
    #[serde(default)]
    pub keep_c: bool,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_optimization_level(mut self, level: OptimizationLevel) -> Self {
        self.optimization_level = level;
        self
    }

    pub fn with_emit_c_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.emit_c_path = Some(path.into());
        self
    }

    pub fn with_keep_c(mut self, keep: bool) -> Self {
        self.keep_c = keep;
        self
    }

    /// Parse a `CompilerConfig` from a TOML document (an `stgc.toml`).
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_o0_and_keeps_no_files() {
        let config = CompilerConfig::new();
        assert_eq!(config.optimization_level, OptimizationLevel::O0);
        assert!(!config.keep_c);
    }

    #[test]
    fn builder_methods_chain() {
        let config = CompilerConfig::new().with_optimization_level(OptimizationLevel::O1).with_keep_c(true);
        assert_eq!(config.optimization_level, OptimizationLevel::O1);
        assert!(config.keep_c);
    }

    #[test]
    fn parses_from_toml() {
        let config = CompilerConfig::from_toml("optimization_level = \"O1\"\nkeep_c = true\n").unwrap();
        assert_eq!(config.optimization_level, OptimizationLevel::O1);
        assert!(config.keep_c);
    }
}
