use std::{fs, path::PathBuf};

use cluster_integration::kube::DEFAULT_API_URL;
use serde::Deserialize;
use tracing::warn;

const SETTINGS_FILE: &str = "minipad.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub midi_device: String,
    pub namespace: String,
    pub workloads: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            midi_device: "/dev/snd/midiC1D0".into(),
            namespace: "default".into(),
            workloads: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    midi_device: Option<String>,
    namespace: Option<String>,
    workloads: Option<PathBuf>,
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        settings.apply_file(&raw);
    }
    settings.apply_env(|key| std::env::var(key).ok());

    settings
}

impl Settings {
    fn apply_file(&mut self, raw: &str) {
        let file_cfg = match toml::from_str::<FileSettings>(raw) {
            Ok(file_cfg) => file_cfg,
            Err(error) => {
                warn!(file = SETTINGS_FILE, %error, "ignoring unreadable settings file");
                return;
            }
        };
        if let Some(v) = file_cfg.api_url {
            self.api_url = v;
        }
        if let Some(v) = file_cfg.midi_device {
            self.midi_device = v;
        }
        if let Some(v) = file_cfg.namespace {
            self.namespace = v;
        }
        if let Some(v) = file_cfg.workloads {
            self.workloads = Some(v);
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("MINIPAD_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = lookup("APP__API_URL") {
            self.api_url = v;
        }

        if let Some(v) = lookup("MINIPAD_MIDI_DEVICE") {
            self.midi_device = v;
        }
        if let Some(v) = lookup("APP__MIDI_DEVICE") {
            self.midi_device = v;
        }
    }
}
