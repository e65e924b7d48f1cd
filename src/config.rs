use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use crate::tunables::{TunableError, Tunables};

/// Touch surface extent and the column offsets the swipe corridors are cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct Geometry {
    #[serde(default = "Geometry::default_x_max")]
    pub x_max: i32,
    #[serde(default = "Geometry::default_y_max")]
    pub y_max: i32,
    #[serde(default = "Geometry::default_x_final")]
    pub x_final: i32,
    #[serde(default = "Geometry::default_b0")]
    pub b0: i32,
    #[serde(default = "Geometry::default_bottom_band")]
    pub bottom_band: i32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            x_max: Self::default_x_max(),
            y_max: Self::default_y_max(),
            x_final: Self::default_x_final(),
            b0: Self::default_b0(),
            bottom_band: Self::default_bottom_band(),
        }
    }
}

impl Geometry {
    fn default_x_max() -> i32 { 720 }
    fn default_y_max() -> i32 { 1280 }
    fn default_x_final() -> i32 { 160 }
    fn default_b0() -> i32 { 430 }
    fn default_bottom_band() -> i32 { 100 }

    pub fn b1(&self) -> i32 { self.b0.saturating_sub(300) }
    pub fn b2(&self) -> i32 { self.b0.saturating_sub(70) }
    pub fn b3(&self) -> i32 { self.b0.saturating_add(60) }
    pub fn b4(&self) -> i32 { self.x_max.saturating_sub(145) }
    pub fn b5(&self) -> i32 { self.x_max.saturating_sub(self.b0) }
    pub fn y_limit(&self) -> i32 { self.y_max.saturating_sub(self.bottom_band) }

    pub fn validate(&self) -> Result<(), String> {
        const LIMIT: i32 = 1_000_000;
        for (name, value, min) in [
            ("x_max", self.x_max, 1),
            ("y_max", self.y_max, 1),
            ("x_final", self.x_final, 0),
            ("b0", self.b0, 0),
            ("bottom_band", self.bottom_band, 0),
        ] {
            if !(min..=LIMIT).contains(&value) {
                return Err(format!("geometry.{} = {} is outside {}..={}", name, value, min, LIMIT));
            }
        }
        Ok(())
    }

    /// Replaces the extent with what the device reports; zero maxima keep the configured values.
    pub fn with_extent(self, x_max: i32, y_max: i32) -> Self {
        Self {
            x_max: if x_max > 0 { x_max } else { self.x_max },
            y_max: if y_max > 0 { y_max } else { self.y_max },
            ..self
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PanelOptions {
    /// File holding the panel power state, `0` meaning powered on (e.g. a backlight `bl_power` node).
    pub power_state_file: Option<PathBuf>,
    #[serde(default = "PanelOptions::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self { power_state_file: None, poll_interval_ms: Self::default_poll_interval_ms() }
    }
}

impl PanelOptions {
    fn default_poll_interval_ms() -> u64 { 250 }
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tunables: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub geometry: Geometry,
    #[serde(default)]
    pub panel: PanelOptions,
    pub device: Option<PathBuf>,
}

impl Config {
    pub fn parse_from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, Box<dyn std::error::Error>> {
        // An empty document deserializes to null, which means "all defaults".
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.geometry.validate()?;
        Ok(config)
    }

    pub fn get_config_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;
        Some(base.join("swiped").join("config.yaml"))
    }

    /// Writes every entry of the `tunables` section through [`Tunables::set`]. Entries are applied
    /// independently; the rejected ones are returned and leave their previous value in place.
    pub fn apply_tunables(&self, tunables: &Tunables) -> Vec<TunableError> {
        let mut errors = Vec::new();
        for (name, value) in &self.tunables {
            let text = match value {
                serde_yaml::Value::Bool(b) => (*b as u8).to_string(),
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::String(s) => s.clone(),
                other => format!("{:?}", other),
            };
            if let Err(e) = tunables.set(name, &text) {
                errors.push(e);
            }
        }
        errors
    }
}

/// Re-applies the `tunables` section whenever the config file changes. The parent directory is
/// watched since editors usually replace the file instead of writing to it.
pub fn watch_config_file(path: &Path, tunables: Arc<Tunables>) -> notify::Result<RecommendedWatcher> {
    let config_path = path.to_path_buf();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
        Ok(event) if (event.kind.is_modify() || event.kind.is_create())
            && event.paths.iter().any(|p| p.file_name() == config_path.file_name()) =>
        {
            reload_tunables(&config_path, &tunables);
        }
        Ok(_) => {}
        Err(e) => log::warn!("Error while watching {:?}: {}", config_path, e),
    })?;
    watcher.watch(&parent, RecursiveMode::NonRecursive)?;
    log::info!("Watching {:?} for configuration changes", path);

    Ok(watcher)
}

fn reload_tunables(path: &Path, tunables: &Tunables) {
    let config = match Config::parse_from_file(path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Ignoring unreadable config file {:?}: {}", path, e);
            return;
        }
    };
    for e in config.apply_tunables(tunables) {
        log::warn!("Rejected setting in {:?}: {}", path, e);
    }
    log::info!("Reloaded tunables: {}", tunables.describe());
}
