// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use vellum_engine::{Options, Value};

const CONFIG_VERSION: i64 = 1;
const APP_NAME: &str = "vellum";

/// On-disk configuration: a version marker plus an `[options]` table
/// whose entries overlay the registered option defaults. Unknown
/// option names are a startup error, not a silent no-op.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub options: toml::Table,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            options: toml::Table::new(),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("VELLUM_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set VELLUM_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned; add `version = 1` and put settings under [options]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        Ok(config)
    }

    /// Overlay the `[options]` table onto the registry. Fails on an
    /// unregistered name or an unrepresentable TOML value.
    pub fn apply(&self, options: &mut Options) -> Result<()> {
        for (name, raw) in &self.options {
            let value = toml_to_value(raw)
                .with_context(|| format!("option {name:?} has an unsupported value type"))?;
            options
                .set(name, value)
                .with_context(|| format!("apply option {name:?} from config"))?;
        }
        Ok(())
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# vellum config\n# Place this file at: {}\n\nversion = 1\n\n[options]\n# csv-delimiter = \",\"\n# show-types = true\n# color-current-row = true\n# mouse = true\n",
            path.display(),
        )
    }
}

fn toml_to_value(raw: &toml::Value) -> Result<Value> {
    let value = match raw {
        toml::Value::Boolean(flag) => Value::Bool(*flag),
        toml::Value::Integer(int) => Value::Int(*int),
        toml::Value::Float(float) => Value::Float(*float),
        toml::Value::String(text) => Value::Str(text.clone()),
        other => bail!("TOML {} values cannot become options", other.type_str()),
    };
    Ok(value)
}
