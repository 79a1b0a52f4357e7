//! Runner configuration.

use modeljoin_core::{CoreError, CoreResult, Language};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Plot device settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlotSettings {
    /// Run visualization scripts at all
    pub enabled: bool,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Base font size in points
    pub point_size: u32,
    /// Resolution in pixels per inch
    pub resolution: u32,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 640,
            height: 480,
            point_size: 12,
            resolution: 72,
        }
    }
}

/// Interpreter executables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterCommands {
    /// R front end
    pub r: String,
    /// Python 3 executable
    pub python: String,
}

impl Default for InterpreterCommands {
    fn default() -> Self {
        Self {
            r: "Rscript".to_string(),
            python: "python3".to_string(),
        }
    }
}

impl InterpreterCommands {
    /// Executable for a language
    #[must_use]
    pub fn for_language(&self, language: Language) -> &str {
        match language {
            Language::R => &self.r,
            Language::Python => &self.python,
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunnerConfig {
    /// Where plots and workspaces are written; a temporary directory when unset
    pub output_dir: Option<PathBuf>,
    /// Plot device settings
    pub plot: PlotSettings,
    /// Interpreter executables
    pub interpreters: InterpreterCommands,
    /// Install missing packages before a leaf runs
    pub install_packages: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            plot: PlotSettings::default(),
            interpreters: InterpreterCommands::default(),
            install_packages: true,
        }
    }
}

impl RunnerConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, &e))?;
        Self::from_json(&text)
    }

    /// Parse a configuration document
    ///
    /// # Errors
    ///
    /// Returns error if the document is malformed
    pub fn from_json(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set plot settings
    #[must_use]
    pub fn with_plot(mut self, plot: PlotSettings) -> Self {
        self.plot = plot;
        self
    }

    /// Set interpreter executables
    #[must_use]
    pub fn with_interpreters(mut self, interpreters: InterpreterCommands) -> Self {
        self.interpreters = interpreters;
        self
    }

    /// Enable or disable package installation
    #[must_use]
    pub fn with_install_packages(mut self, install: bool) -> Self {
        self.install_packages = install;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::new();
        assert!(config.install_packages);
        assert!(config.output_dir.is_none());
        assert_eq!(config.plot.width, 640);
        assert_eq!(config.plot.height, 480);
        assert_eq!(config.interpreters.for_language(Language::R), "Rscript");
        assert_eq!(config.interpreters.for_language(Language::Python), "python3");
    }

    #[test]
    fn test_partial_document() {
        let config =
            RunnerConfig::from_json(r#"{"plot":{"width":800},"interpreters":{"r":"R"}}"#).unwrap();
        assert_eq!(config.plot.width, 800);
        assert_eq!(config.plot.height, 480);
        assert_eq!(config.interpreters.r, "R");
        assert_eq!(config.interpreters.python, "python3");
        assert!(config.install_packages);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.json");
        std::fs::write(&path, r#"{"installPackages":false,"outputDir":"/tmp/out"}"#).unwrap();
        let config = RunnerConfig::from_file(&path).unwrap();
        assert!(!config.install_packages);
        assert_eq!(config.output_dir, Some(PathBuf::from("/tmp/out")));

        assert!(RunnerConfig::from_file(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_builders() {
        let config = RunnerConfig::new()
            .with_output_dir("/tmp/x")
            .with_install_packages(false)
            .with_plot(PlotSettings {
                enabled: false,
                ..PlotSettings::default()
            });
        assert!(!config.plot.enabled);
        assert!(!config.install_packages);
    }
}
