use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SettingsError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    // 定时任务节奏
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    #[serde(default = "default_fade_tick_ms")]
    pub fade_tick_ms: u64,
    #[serde(default = "default_fade_initial_delay_ms")]
    pub fade_initial_delay_ms: u64,

    // 音量
    #[serde(default = "default_volume")]
    pub default_volume: f32,

    // 模拟引擎
    #[serde(default = "default_simulated_duration_ms")]
    pub simulated_duration_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
            fade_tick_ms: default_fade_tick_ms(),
            fade_initial_delay_ms: default_fade_initial_delay_ms(),
            default_volume: default_volume(),
            simulated_duration_ms: default_simulated_duration_ms(),
        }
    }
}

// 默认值函数（用于 serde default）
fn default_progress_interval_ms() -> u64 { 500 }
fn default_fade_tick_ms() -> u64 { 100 }
fn default_fade_initial_delay_ms() -> u64 { 1000 }
fn default_volume() -> f32 { 1.0 }
fn default_simulated_duration_ms() -> u64 { 180_000 }

/// 每个控制器使用的定时参数
#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    pub progress_interval: Duration,
    pub fade_tick: Duration,
    pub fade_initial_delay: Duration,
    pub default_volume: f32,
}

impl Default for Timing {
    fn default() -> Self {
        Self::from(&PlaybackSettings::default())
    }
}

impl From<&PlaybackSettings> for Timing {
    fn from(s: &PlaybackSettings) -> Self {
        Self {
            progress_interval: Duration::from_millis(s.progress_interval_ms.max(1)),
            fade_tick: Duration::from_millis(s.fade_tick_ms.max(1)),
            fade_initial_delay: Duration::from_millis(s.fade_initial_delay_ms),
            default_volume: s.default_volume.clamp(0.0, 1.0),
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("dev", "playback", "playback-ctl")
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("playback-ctl"))
}

pub fn load_settings(data_dir: &Path) -> PlaybackSettings {
    let p = settings_path(data_dir);
    let Ok(bytes) = fs::read(&p) else {
        return PlaybackSettings::default();
    };
    match serde_json::from_slice(&bytes) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %p.display(), err = %e, "settings 解析失败，使用默认值");
            PlaybackSettings::default()
        }
    }
}

pub fn save_settings(data_dir: &Path, s: &PlaybackSettings) -> Result<(), SettingsError> {
    fs::create_dir_all(data_dir).map_err(|source| SettingsError::Save { source })?;
    let p = settings_path(data_dir);
    let tmp = p.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(s).map_err(|source| SettingsError::Encode { source })?;
    fs::write(&tmp, bytes).map_err(|source| SettingsError::Save { source })?;
    if let Err(e) = fs::rename(&tmp, &p) {
        let _ = fs::remove_file(&p);
        fs::rename(&tmp, &p).map_err(|_| SettingsError::Save { source: e })?;
    }
    Ok(())
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}
