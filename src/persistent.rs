use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::colors::{Color, DEFAULT_PALETTE, MISSING_SPAN_COLOR};

pub const DEFAULT_MISSING_SPAN_LABEL: &str = "Missing Span";
pub const DEFAULT_RENDER_WIDTH: usize = 60;

/// Persistent viewer settings.
/// If the data structure changes, it should be versioned to maintain compatibility with data saved
/// using older versions of spanforest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum PersistentData {
    V1(SettingsV1),
}

impl Default for PersistentData {
    fn default() -> Self {
        PersistentData::V1(SettingsV1::default())
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SettingsV1 {
    pub palette: Vec<Color>,
    pub missing_span_color: Color,
    pub missing_span_label: String,
    /// Name of the timeline unit ("ms", "s", "m"). Picked from the trace spread when unset.
    pub interval_unit: Option<String>,
    pub render_width: usize,
}

pub type Settings = SettingsV1;

impl Default for SettingsV1 {
    fn default() -> Self {
        SettingsV1 {
            palette: DEFAULT_PALETTE.to_vec(),
            missing_span_color: MISSING_SPAN_COLOR,
            missing_span_label: DEFAULT_MISSING_SPAN_LABEL.to_string(),
            interval_unit: None,
            render_width: DEFAULT_RENDER_WIDTH,
        }
    }
}

impl From<PersistentData> for Settings {
    fn from(data: PersistentData) -> Self {
        match data {
            PersistentData::V1(settings) => settings,
        }
    }
}

/// Loads settings from `path`, or from the default location when `path` is `None`.
/// A missing file yields the default settings.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => settings_file_path()?,
    };
    let settings: Settings = read_data(&path)?.into();
    if settings.palette.is_empty() {
        anyhow::bail!("Settings file {} has an empty palette", path.display());
    }
    Ok(settings)
}

pub fn save_settings(settings: &Settings, path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => settings_file_path()?,
    };
    write_data(&PersistentData::V1(settings.clone()), &path)?;
    Ok(path)
}

fn write_data(data: &PersistentData, path: &Path) -> Result<()> {
    tracing::info!(path = %path.display(), "writing settings");

    let folder = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&folder)?;

    // First write the data to a temporary file
    let random_number: u64 = rand::random();
    let write_file_path = folder.join(format!("temporary_settings{}.json", random_number));
    let mut file = std::fs::File::create(&write_file_path)?;
    serde_json::to_writer_pretty(&mut file, &data)?;
    file.sync_all()?;

    // Then move the temporary file to the final location
    std::fs::rename(&write_file_path, path)?;

    Ok(())
}

fn read_data(path: &Path) -> Result<PersistentData> {
    tracing::debug!(path = %path.display(), "reading settings");
    if !path.try_exists()? {
        tracing::debug!("settings file not found, using defaults");
        return Ok(PersistentData::default());
    }
    let file = std::fs::File::open(path)?;
    let data: PersistentData = serde_json::from_reader(file)
        .map_err(|e| anyhow::anyhow!("Invalid settings file {}: {}", path.display(), e))?;
    Ok(data)
}

fn settings_folder() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("org", "spanforest", "spanforest")
        .ok_or_else(|| anyhow::anyhow!("Could not determine the home directory"))?;
    Ok(dirs.config_dir().to_path_buf())
}

pub fn settings_file_path() -> Result<PathBuf> {
    Ok(settings_folder()?.join("settings.json"))
}
