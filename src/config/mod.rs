//! Configuration management for winmirror
//!
//! This module handles loading, parsing, and validating session
//! configuration from TOML files: capture cadence and priority, hierarchy
//! resolution, title refresh and cursor capture.

use crate::engine::{CaptureMode, CapturePriority};
use crate::registry::hierarchy::HierarchyPolicy;
use crate::scheduler::{CaptureSchedule, CaptureTiming};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration struct containing all session settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SessionConfig {
    /// Default capture schedule and priority policy
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Parent resolution for newly reported windows
    #[serde(default)]
    pub hierarchy: HierarchyConfig,

    /// Automatic title refresh
    #[serde(default)]
    pub titles: TitleConfig,

    /// Cursor image capture
    #[serde(default)]
    pub cursor: CursorConfig,

    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    /// Target captures per second for scheduled windows (negative = every tick)
    pub frame_rate: f32,

    /// When due captures are issued
    pub timing: CaptureTiming,

    /// Default request priority (`auto` applies the cursor/z-order policy)
    pub priority: CapturePriority,

    /// Capture strategy requested from the engine
    pub mode: CaptureMode,

    /// Draw the cursor into window captures
    pub draw_cursor: bool,

    /// Windows with a z-order below this get middle priority
    #[serde(default = "CaptureConfig::default_middle_priority_max_z")]
    pub middle_priority_max_z: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HierarchyConfig {
    /// Link child-flagged windows to a top-level window of the same
    /// process and thread when the engine reports no parent or owner
    pub process_thread_fallback: bool,
}

/// Which windows get a title refresh request every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TitleUpdateTiming {
    #[default]
    Manual,
    AllWindows,
    AltTabWindows,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TitleConfig {
    pub update_timing: TitleUpdateTiming,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CursorConfig {
    /// Capture the cursor image periodically
    pub capture: bool,

    /// Cursor captures per second (negative = every tick)
    pub frame_rate: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GeneralConfig {
    /// Enable debug logging
    pub debug: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_rate: 10.0,
            timing: CaptureTiming::EveryFrame,
            priority: CapturePriority::Auto,
            mode: CaptureMode::Auto,
            draw_cursor: true,
            middle_priority_max_z: Self::default_middle_priority_max_z(),
        }
    }
}

impl CaptureConfig {
    fn default_middle_priority_max_z() -> i32 {
        5
    }
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            process_thread_fallback: true,
        }
    }
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            capture: false,
            frame_rate: 30.0,
        }
    }
}

impl From<&CaptureConfig> for CaptureSchedule {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            frame_rate: config.frame_rate,
            timing: config.timing,
            priority: config.priority,
            mode: config.mode,
            draw_cursor: config.draw_cursor,
        }
    }
}

impl From<&HierarchyConfig> for HierarchyPolicy {
    fn from(config: &HierarchyConfig) -> Self {
        Self {
            process_thread_fallback: config.process_thread_fallback,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            Path::new(&home).join(path.strip_prefix("~").unwrap_or(path))
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: SessionConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let frame_rate = self.capture.frame_rate;
        if !frame_rate.is_finite() || frame_rate == 0.0 {
            anyhow::bail!(
                "Invalid capture frame_rate {}: must be finite and non-zero",
                frame_rate
            );
        }

        if self.capture.middle_priority_max_z < 0 {
            anyhow::bail!(
                "Invalid middle_priority_max_z {}: must not be negative",
                self.capture.middle_priority_max_z
            );
        }

        if !self.cursor.frame_rate.is_finite() {
            anyhow::bail!("Invalid cursor frame_rate: must be finite");
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }

    /// Default schedule applied by [`Session::schedule_default`](crate::session::Session::schedule_default)
    pub fn default_schedule(&self) -> CaptureSchedule {
        CaptureSchedule::from(&self.capture)
    }
}
