use std::path::PathBuf;

const APP_DIR: &str = "maopad";

/// Settings file path: config_dir/maopad/settings.json
pub fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push("settings.json");
    path
}

/// Autosave snapshot directory: data_dir/maopad/autosave/
pub fn autosave_dir() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push("autosave");
    path
}
