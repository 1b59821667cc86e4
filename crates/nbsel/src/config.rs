//! Configuration loading for nbsel.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use nbsel_core::{AutoSlideOptions, BoxStyle};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an alternative config file
pub const CONFIG_ENV: &str = "NBSEL_CONFIG";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    pub show: Option<ShowConfig>,
    pub slides: Option<SlidesConfig>,
    pub export: Option<ExportConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ShowConfig {
    pub width: Option<usize>,
    pub style: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct SlidesConfig {
    pub max_cells: Option<usize>,
    pub max_images: Option<usize>,
    pub delete_empty: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ExportConfig {
    pub jupyter: Option<String>,
}

impl Config {
    pub fn show_width(&self) -> Option<usize> {
        self.show.as_ref().and_then(|show| show.width)
    }

    /// Configured box style; an unknown name is an error
    pub fn show_style(&self) -> Result<Option<BoxStyle>> {
        self.show
            .as_ref()
            .and_then(|show| show.style.as_deref())
            .map(|style| {
                style
                    .parse::<BoxStyle>()
                    .map_err(|e| anyhow::anyhow!("Invalid [show] style in config: {e}"))
            })
            .transpose()
    }

    pub fn show_color(&self) -> Option<&str> {
        self.show.as_ref().and_then(|show| show.color.as_deref())
    }

    /// Slide settings with the built-in defaults filled in
    pub fn auto_slide(&self) -> AutoSlideOptions {
        let defaults = AutoSlideOptions::default();
        let Some(slides) = &self.slides else {
            return defaults;
        };
        AutoSlideOptions {
            max_cells: slides.max_cells.or(defaults.max_cells),
            max_images: slides.max_images.or(defaults.max_images),
            delete_empty: slides.delete_empty.unwrap_or(defaults.delete_empty),
        }
    }

    /// Program that provides `nbconvert`
    pub fn jupyter_program(&self) -> String {
        self.export
            .as_ref()
            .and_then(|export| export.jupyter.clone())
            .unwrap_or_else(|| "jupyter".to_string())
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    let dirs = ProjectDirs::from("", "", "nbsel").context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config =
        toml::from_str(&contents).context("Failed to parse config file as TOML")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert!(config.show_width().is_none());
        assert!(config.show_style().unwrap().is_none());
        assert_eq!(config.auto_slide(), AutoSlideOptions::default());
        assert_eq!(config.jupyter_program(), "jupyter");
    }

    #[test]
    fn test_parse_config() {
        let config: Config = toml::from_str(
            r#"
            [show]
            width = 80
            style = "double"
            color = "cyan"

            [slides]
            max_cells = 5

            [export]
            jupyter = "/opt/conda/bin/jupyter"
            "#,
        )
        .unwrap();
        assert_eq!(config.show_width(), Some(80));
        assert_eq!(config.show_style().unwrap(), Some(BoxStyle::Double));
        assert_eq!(config.show_color(), Some("cyan"));
        assert_eq!(
            config.auto_slide(),
            AutoSlideOptions {
                max_cells: Some(5),
                max_images: Some(1),
                delete_empty: true,
            }
        );
        assert_eq!(config.jupyter_program(), "/opt/conda/bin/jupyter");
    }

    #[test]
    fn test_invalid_style() {
        let config = Config {
            show: Some(ShowConfig {
                style: Some("wavy".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.show_style().is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert!(config.show.is_none());
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[slides]\ndelete_empty = false\n").unwrap();
        let config = load_config(&path).unwrap();
        assert!(!config.auto_slide().delete_empty);

        std::fs::write(&path, "[slides\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
