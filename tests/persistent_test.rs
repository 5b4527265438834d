use std::path::PathBuf;

use spanforest::colors::{Color, BLUE, GREEN};
use spanforest::persistent::{load_settings, save_settings, Settings};

fn temporary_settings_path() -> PathBuf {
    let random_number: u64 = rand::random();
    std::env::temp_dir()
        .join(format!("spanforest_test_{}", random_number))
        .join("settings.json")
}

#[test]
fn test_missing_file_gives_defaults() {
    let path = temporary_settings_path();
    let settings = load_settings(Some(&path)).unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_settings_round_trip() {
    let path = temporary_settings_path();
    let settings = Settings {
        palette: vec![BLUE, GREEN],
        missing_span_color: Color::from_rgb(1, 2, 3),
        missing_span_label: "Gap".to_string(),
        interval_unit: Some("s".to_string()),
        render_width: 30,
    };
    let written = save_settings(&settings, Some(&path)).unwrap();
    assert_eq!(written, path);

    let loaded = load_settings(Some(&path)).unwrap();
    assert_eq!(loaded, settings);

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_partial_settings_use_defaults() {
    let path = temporary_settings_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{"V1": {"missing_span_label": "Gap"}}"#).unwrap();

    let loaded = load_settings(Some(&path)).unwrap();
    assert_eq!(loaded.missing_span_label, "Gap");
    assert_eq!(loaded.palette, Settings::default().palette);

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_invalid_settings() {
    let path = temporary_settings_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    std::fs::write(&path, r#"{"V1": {"palette": ["not a color"]}}"#).unwrap();
    assert!(load_settings(Some(&path)).is_err());

    std::fs::write(&path, r#"{"V1": {"palette": []}}"#).unwrap();
    assert!(load_settings(Some(&path)).is_err());

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}
