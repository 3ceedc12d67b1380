//! CLI commands and the configuration loading they share

pub mod build;
pub mod resolve;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Args;
use packrig_core::OptionValue;

/// Configuration file plus command-line overrides
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Configuration file (.json or .toml)
    pub config: PathBuf,

    /// Override `mode` in every configuration
    #[arg(long)]
    pub mode: Option<String>,

    /// Override `target` in every configuration
    #[arg(long)]
    pub target: Option<String>,

    /// Set `watch: true` in every configuration
    #[arg(long)]
    pub watch: bool,
}

impl ConfigArgs {
    /// Read the configuration file and apply the overrides
    pub fn load(&self) -> anyhow::Result<OptionValue> {
        let mut raw = read_config(&self.config)?;
        match &mut raw {
            OptionValue::Object(config) => self.apply_overrides(config),
            OptionValue::Array(configs) => {
                for config in configs.iter_mut() {
                    if let OptionValue::Object(config) = config {
                        self.apply_overrides(config);
                    }
                }
            }
            _ => {}
        }
        Ok(raw)
    }

    fn apply_overrides(&self, config: &mut packrig_core::OptionMap) {
        if let Some(mode) = &self.mode {
            config.insert("mode".to_string(), OptionValue::from(mode.as_str()));
        }
        if let Some(target) = &self.target {
            config.insert("target".to_string(), OptionValue::from(target.as_str()));
        }
        if self.watch {
            config.insert("watch".to_string(), OptionValue::Bool(true));
        }
    }
}

/// Parse a configuration file by extension
///
/// A TOML file may list several configurations as a `[[configs]]` array of
/// tables; that form loads as an array.
pub fn read_config(path: &Path) -> anyhow::Result<OptionValue> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let json = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => {
            let table: toml::Table = toml::from_str(&text)
                .with_context(|| format!("Failed to parse TOML in {}", path.display()))?;
            let value = serde_json::to_value(table)?;
            match value {
                serde_json::Value::Object(mut map)
                    if map.len() == 1 && map.get("configs").is_some_and(|c| c.is_array()) =>
                {
                    map.remove("configs").unwrap_or_default()
                }
                other => other,
            }
        }
        Some("json") | None => serde_json::from_str::<serde_json::Value>(&text)
            .with_context(|| format!("Failed to parse JSON in {}", path.display()))?,
        Some(other) => bail!("Unsupported configuration format '.{}'", other),
    };
    Ok(OptionValue::from(json))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_toml_configs_table_loads_as_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "packrig.toml",
            "[[configs]]\nname = \"client\"\n\n[[configs]]\nname = \"server\"\ntarget = \"node\"\n",
        );
        let raw = read_config(&path).unwrap();
        let configs = raw.as_array().unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(
            configs[1].as_object().unwrap().get("target"),
            Some(&OptionValue::from("node"))
        );
    }

    #[test]
    fn test_overrides_apply_to_every_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "packrig.json", r#"[{"mode": "none"}, {}]"#);
        let args = ConfigArgs {
            config: path,
            mode: Some("development".to_string()),
            target: None,
            watch: true,
        };
        let raw = args.load().unwrap();
        for config in raw.as_array().unwrap() {
            let config = config.as_object().unwrap();
            assert_eq!(config.get("mode"), Some(&OptionValue::from("development")));
            assert_eq!(config.get("watch"), Some(&OptionValue::Bool(true)));
        }
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "packrig.yaml", "mode: none");
        let err = read_config(&path).unwrap_err();
        assert!(err.to_string().contains(".yaml"));
    }
}
