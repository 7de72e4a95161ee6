//! Query collaborator consumed by the bulk builder
//!
//! A [`QuerySource`] answers the handful of questions needed to build a
//! [`Layout`](crate::layout::Layout): which GPUs, displays and screens exist,
//! plus the raw modeline, metamode and geometry strings the parsers consume.
//! [`Snapshot`] is a recorded set of answers loaded from JSON.

use serde::{Deserialize, Serialize};

use crate::errors::{LayoutError, Result};
use crate::layout::{Aggregation, DisplayNames, GpuCaps};

/// One GPU as reported by the server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GpuInfo {
    pub id: u32,
    pub name: String,
    pub uuid: String,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub caps: GpuCaps,
    /// Per-GPU override of `Settings::doublescan_in_vtotal`
    #[serde(default)]
    pub doublescan_in_vtotal: Option<bool>,
}

/// One display connected to a GPU
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    pub target_id: u32,
    pub names: DisplayNames,
    /// Display is a serial digital output
    #[serde(default)]
    pub serial_video: bool,
}

/// One X screen
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScreenInfo {
    pub number: i32,
    /// Server ids of the GPUs driving the screen
    pub gpus: Vec<u32>,
    #[serde(default)]
    pub display_owner: Option<u32>,
    /// Any name the primary display answers to
    #[serde(default)]
    pub primary_display: Option<String>,
}

/// Blocking queries against the display server. Any error aborts a build.
pub trait QuerySource {
    fn gpus(&self) -> Result<Vec<GpuInfo>>;

    fn displays(&self, gpu: u32) -> Result<Vec<DisplayInfo>>;

    /// NUL-separated modeline list of a display
    fn modelines(&self, target_id: u32) -> Result<String>;

    fn screens(&self) -> Result<Vec<ScreenInfo>>;

    /// NUL-separated metamode list of a screen
    fn metamodes(&self, screen: i32) -> Result<String>;

    fn current_metamode(&self, screen: i32) -> Result<Option<String>>;

    /// `x=#, y=#, width=#, height=#`
    fn screen_rect(&self, screen: i32) -> Result<String>;

    /// `;`-separated auxiliary display placements
    fn aux_displays(&self) -> Result<String>;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DisplayRecord {
    #[serde(flatten)]
    pub info: DisplayInfo,
    #[serde(default)]
    pub modelines: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GpuRecord {
    #[serde(flatten)]
    pub info: GpuInfo,
    #[serde(default)]
    pub displays: Vec<DisplayRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScreenRecord {
    #[serde(flatten)]
    pub info: ScreenInfo,
    pub rect: String,
    #[serde(default)]
    pub metamodes: Vec<String>,
    #[serde(default)]
    pub current_metamode: Option<String>,
}

/// Recorded query answers
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    #[serde(default)]
    pub gpus: Vec<GpuRecord>,
    #[serde(default)]
    pub screens: Vec<ScreenRecord>,
    #[serde(default)]
    pub aux_displays: String,
}

impl Snapshot {
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| LayoutError::malformed(format!("snapshot: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LayoutError::malformed(format!("snapshot: {}", e)))
    }

    fn gpu_record(&self, gpu: u32) -> Result<&GpuRecord> {
        self.gpus
            .iter()
            .find(|g| g.info.id == gpu)
            .ok_or_else(|| LayoutError::query("displays", format!("no GPU {}", gpu)))
    }

    fn display_record(&self, target_id: u32) -> Result<&DisplayRecord> {
        self.gpus
            .iter()
            .flat_map(|g| &g.displays)
            .find(|d| d.info.target_id == target_id)
            .ok_or_else(|| LayoutError::query("modelines", format!("no display {}", target_id)))
    }

    fn screen_record(&self, query: &str, screen: i32) -> Result<&ScreenRecord> {
        self.screens
            .iter()
            .find(|s| s.info.number == screen)
            .ok_or_else(|| LayoutError::query(query, format!("no screen {}", screen)))
    }
}

impl QuerySource for Snapshot {
    fn gpus(&self) -> Result<Vec<GpuInfo>> {
        Ok(self.gpus.iter().map(|g| g.info.clone()).collect())
    }

    fn displays(&self, gpu: u32) -> Result<Vec<DisplayInfo>> {
        Ok(self
            .gpu_record(gpu)?
            .displays
            .iter()
            .map(|d| d.info.clone())
            .collect())
    }

    fn modelines(&self, target_id: u32) -> Result<String> {
        Ok(self.display_record(target_id)?.modelines.join("\0"))
    }

    fn screens(&self) -> Result<Vec<ScreenInfo>> {
        Ok(self.screens.iter().map(|s| s.info.clone()).collect())
    }

    fn metamodes(&self, screen: i32) -> Result<String> {
        Ok(self.screen_record("metamodes", screen)?.metamodes.join("\0"))
    }

    fn current_metamode(&self, screen: i32) -> Result<Option<String>> {
        Ok(self
            .screen_record("current_metamode", screen)?
            .current_metamode
            .clone())
    }

    fn screen_rect(&self, screen: i32) -> Result<String> {
        Ok(self.screen_record("screen_rect", screen)?.rect.clone())
    }

    fn aux_displays(&self) -> Result<String> {
        Ok(self.aux_displays.clone())
    }
}
