//! Entity types of the display topology graph
//!
//! Entities never hold references to each other: every link is a typed id
//! into the owning [`Layout`](super::Layout) arenas, and a Mode refers to its
//! ModeLine by index into the owning Display's list.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GpuId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScreenId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DisplayId(pub usize);

// ==============================================================================
// ModeLine
// ==============================================================================

bitflags! {
    /// Timing flags of a modeline (X config keywords)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModeLineFlags: u32 {
        const PHSYNC     = 1 << 0;
        const NHSYNC     = 1 << 1;
        const PVSYNC     = 1 << 2;
        const NVSYNC     = 1 << 3;
        const INTERLACE  = 1 << 4;
        const DOUBLESCAN = 1 << 5;
        const CSYNC      = 1 << 6;
        const PCSYNC     = 1 << 7;
        const NCSYNC     = 1 << 8;
        const HSKEW      = 1 << 9;
        const BCAST      = 1 << 10;
        const CUSTOM     = 1 << 11;
        const VSCAN      = 1 << 12;
    }
}

bitflags! {
    /// Where a modeline came from. A modeline reported by several origins
    /// carries all of them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModeLineSource: u8 {
        const XSERVER   = 1 << 0;
        const XCONFIG   = 1 << 1;
        const BUILTIN   = 1 << 2;
        const VESA      = 1 << 3;
        const EDID      = 1 << 4;
        const NVCONTROL = 1 << 5;
        const USER      = 1 << 6;
    }
}

impl ModeLineSource {
    /// Keyword used in the `source=` header token
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let source = match keyword.to_ascii_lowercase().as_str() {
            "xserver" => Self::XSERVER,
            "xconfig" => Self::XCONFIG,
            "builtin" => Self::BUILTIN,
            "vesa" => Self::VESA,
            "edid" => Self::EDID,
            "nv-control" => Self::NVCONTROL,
            "user" => Self::USER,
            _ => return None,
        };
        Some(source)
    }
}

/// The eight timing counters of a modeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Timings {
    pub hdisplay: i32,
    pub hsyncstart: i32,
    pub hsyncend: i32,
    pub htotal: i32,
    pub vdisplay: i32,
    pub vsyncstart: i32,
    pub vsyncend: i32,
    pub vtotal: i32,
}

impl Timings {
    pub fn from_array(v: [i32; 8]) -> Self {
        Self {
            hdisplay: v[0],
            hsyncstart: v[1],
            hsyncend: v[2],
            htotal: v[3],
            vdisplay: v[4],
            vsyncstart: v[5],
            vsyncend: v[6],
            vtotal: v[7],
        }
    }

    pub fn to_array(&self) -> [i32; 8] {
        [
            self.hdisplay,
            self.hsyncstart,
            self.hsyncend,
            self.htotal,
            self.vdisplay,
            self.vsyncstart,
            self.vsyncend,
            self.vtotal,
        ]
    }
}

/// A single supported display timing
#[derive(Debug, Clone, PartialEq)]
pub struct ModeLine {
    pub identifier: String,
    /// Pixel clock in MHz, kept as the server spelled it
    pub clock: String,
    pub timings: Timings,
    pub hskew: i32,
    pub vscan: i32,
    pub flags: ModeLineFlags,
    pub source: ModeLineSource,
    /// Display name given in the X config file, if any
    pub xconfig_name: Option<String>,
    /// Vertical refresh in Hz
    pub refresh_rate: f64,
}

impl ModeLine {
    /// Pixel clock as a number; `None` when it is not a finite float
    pub fn clock_mhz(&self) -> Option<f64> {
        self.clock.trim().parse::<f64>().ok().filter(|c| c.is_finite())
    }

    /// Visible size (hdisplay x vdisplay)
    pub fn size(&self) -> Size {
        Size::new(self.timings.hdisplay, self.timings.vdisplay)
    }
}

/// Serial digital video format with a fixed refresh rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialVideoFormat {
    pub name: String,
    pub rate: f64,
}

impl SerialVideoFormat {
    pub fn new(name: &str, rate: f64) -> Self {
        Self {
            name: name.to_string(),
            rate,
        }
    }

    /// Built-in SMPTE format table
    pub fn standard_table() -> Vec<SerialVideoFormat> {
        vec![
            Self::new("720x487i_59.94", 59.94),
            Self::new("720x576i_50.00", 50.0),
            Self::new("1280x720p_23.98", 23.976),
            Self::new("1280x720p_24.00", 24.0),
            Self::new("1280x720p_25.00", 25.0),
            Self::new("1280x720p_29.97", 29.97),
            Self::new("1280x720p_30.00", 30.0),
            Self::new("1280x720p_50.00", 50.0),
            Self::new("1280x720p_59.94", 59.94),
            Self::new("1280x720p_60.00", 60.0),
            Self::new("1920x1035i_59.94", 59.94),
            Self::new("1920x1035i_60.00", 60.0),
            Self::new("1920x1080i_47.96", 47.952),
            Self::new("1920x1080i_48.00", 48.0),
            Self::new("1920x1080i_50.00", 50.0),
            Self::new("1920x1080i_59.94", 59.94),
            Self::new("1920x1080i_60.00", 60.0),
            Self::new("1920x1080p_23.98", 23.976),
            Self::new("1920x1080p_24.00", 24.0),
            Self::new("1920x1080p_25.00", 25.0),
            Self::new("1920x1080p_29.97", 29.97),
            Self::new("1920x1080p_30.00", 30.0),
            Self::new("2048x1080p_24.00", 24.0),
        ]
    }
}

// ==============================================================================
// Mode
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Normal,
    Left,
    Invert,
    Right,
}

impl Rotation {
    /// Width and height trade places
    pub fn is_sideways(self) -> bool {
        matches!(self, Rotation::Left | Rotation::Right)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Reflection {
    #[default]
    None,
    X,
    Y,
    XY,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StereoEye {
    #[default]
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PixelShift {
    #[default]
    None,
    TopLeft4k,
    BottomRight4k,
    Full8k,
}

/// How an entity is placed relative to a sibling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelativeKind {
    RightOf,
    LeftOf,
    Above,
    Below,
    Clones,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement<T> {
    Absolute,
    Relative { kind: RelativeKind, target: T },
}

impl<T> Default for Placement<T> {
    fn default() -> Self {
        Placement::Absolute
    }
}

impl<T: PartialEq + Copy> Placement<T> {
    pub fn target(&self) -> Option<T> {
        match self {
            Placement::Absolute => None,
            Placement::Relative { target, .. } => Some(*target),
        }
    }

    pub fn targets(&self, id: T) -> bool {
        self.target() == Some(id)
    }
}

/// A ModeLine instantiated on one Display within one MetaMode.
///
/// The owning MetaMode is the Mode's index in its Display's mode list.
#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    /// Index into the owning Display's modelines; `None` means display off
    pub modeline: Option<usize>,
    pub viewport_in: Size,
    pub viewport_out: Rect,
    /// Panning domain, position included
    pub pan: Rect,
    pub rotation: Rotation,
    pub reflection: Reflection,
    pub stereo: StereoEye,
    pub pixel_shift: PixelShift,
    pub force_composition: bool,
    pub force_full_composition: bool,
    pub allow_gsync: bool,
    /// Synthesized to keep metamodes aligned, not user-specified
    pub dummy: bool,
    pub placement: Placement<DisplayId>,
}

impl Default for Mode {
    fn default() -> Self {
        Self {
            modeline: None,
            viewport_in: Size::default(),
            viewport_out: Rect::default(),
            pan: Rect::default(),
            rotation: Rotation::Normal,
            reflection: Reflection::None,
            stereo: StereoEye::None,
            pixel_shift: PixelShift::None,
            force_composition: false,
            force_full_composition: false,
            allow_gsync: true,
            dummy: false,
            placement: Placement::Absolute,
        }
    }
}

impl Mode {
    pub fn is_null(&self) -> bool {
        self.modeline.is_none()
    }

    /// A dummy NULL mode keeping the placement of `template`
    pub fn dummy_like(template: &Mode) -> Self {
        Self {
            pan: Rect::new(template.pan.x, template.pan.y, 0, 0),
            placement: template.placement,
            dummy: true,
            ..Self::default()
        }
    }
}

// ==============================================================================
// MetaMode
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MetaModeSource {
    XConfig,
    Implicit,
    #[default]
    NvControl,
    RandR,
}

impl MetaModeSource {
    pub fn as_str(self) -> &'static str {
        match self {
            MetaModeSource::XConfig => "xconfig",
            MetaModeSource::Implicit => "implicit",
            MetaModeSource::NvControl => "nv-control",
            MetaModeSource::RandR => "randr",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "xconfig" => Some(Self::XConfig),
            "implicit" => Some(Self::Implicit),
            "nv-control" => Some(Self::NvControl),
            "randr" => Some(Self::RandR),
            _ => None,
        }
    }
}

/// A whole-screen configuration; its modes live in the linked Displays'
/// mode lists at this MetaMode's index.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaMode {
    pub id: i32,
    pub source: MetaModeSource,
    pub switchable: bool,
    /// The record exactly as the server reported it
    pub string: String,
}

impl Default for MetaMode {
    fn default() -> Self {
        Self {
            id: -1,
            source: MetaModeSource::NvControl,
            switchable: true,
            string: String::new(),
        }
    }
}

// ==============================================================================
// Display / Screen / Gpu
// ==============================================================================

/// All the names a display answers to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayNames {
    /// Human readable, e.g. "DELL U2410 (DFP-0)"
    pub log: String,
    /// Generic connector class, e.g. "DFP"
    pub type_base: String,
    /// e.g. "DFP-0"
    pub type_id: String,
    #[serde(default)]
    pub dp_guid: Option<String>,
    #[serde(default)]
    pub edid_hash: Option<String>,
    /// Portable name, e.g. "DPY-1"
    pub target_id: String,
    /// e.g. "DP-0"
    pub randr: String,
}

impl DisplayNames {
    /// Names that identify exactly one display
    pub fn exact_names(&self) -> impl Iterator<Item = &str> {
        [
            Some(self.type_id.as_str()),
            self.dp_guid.as_deref(),
            self.edid_hash.as_deref(),
            Some(self.target_id.as_str()),
            Some(self.randr.as_str()),
            Some(self.log.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct Display {
    pub names: DisplayNames,
    pub target_id: u32,
    pub modelines: Vec<ModeLine>,
    /// One entry per MetaMode of the linked Screen
    pub modes: Vec<Mode>,
    pub cur_mode: Option<usize>,
    pub screen: Option<ScreenId>,
    pub gpu: Option<GpuId>,
    pub serial_video: Option<Vec<SerialVideoFormat>>,
}

impl Display {
    pub fn new(target_id: u32, names: DisplayNames) -> Self {
        Self {
            names,
            target_id,
            modelines: Vec::new(),
            modes: Vec::new(),
            cur_mode: None,
            screen: None,
            gpu: None,
            serial_video: None,
        }
    }

    pub fn find_modeline(&self, identifier: &str) -> Option<usize> {
        self.modelines.iter().position(|m| m.identifier == identifier)
    }

    pub fn modeline_of(&self, mode: &Mode) -> Option<&ModeLine> {
        mode.modeline.and_then(|idx| self.modelines.get(idx))
    }

    /// Most recent mode that was not synthesized
    pub fn last_real_mode(&self) -> Option<&Mode> {
        self.modes.iter().rev().find(|m| !m.dummy)
    }
}

#[derive(Debug, Clone)]
pub struct Screen {
    pub number: i32,
    pub metamodes: Vec<MetaMode>,
    pub displays: Vec<DisplayId>,
    pub cur_metamode: Option<usize>,
    pub gpus: Vec<GpuId>,
    pub display_owner: Option<GpuId>,
    pub primary_display: Option<DisplayId>,
    pub rect: Rect,
    pub placement: Placement<ScreenId>,
}

impl Screen {
    pub fn new(number: i32) -> Self {
        Self {
            number,
            metamodes: Vec::new(),
            displays: Vec::new(),
            cur_metamode: None,
            gpus: Vec::new(),
            display_owner: None,
            primary_display: None,
            rect: Rect::default(),
            placement: Placement::Absolute,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationType {
    #[default]
    None,
    Sli,
    BaseMosaic,
    SliMosaic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    #[serde(default)]
    pub kind: AggregationType,
    #[serde(default)]
    pub enabled: bool,
}

impl Aggregation {
    /// Display names collide across GPUs under mosaic and need the GPU
    /// qualifier
    pub fn spans_gpus(&self) -> bool {
        self.enabled
            && matches!(
                self.kind,
                AggregationType::BaseMosaic | AggregationType::SliMosaic
            )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuCaps {
    pub max_width: i32,
    pub max_height: i32,
    pub max_displays: i32,
    #[serde(default)]
    pub multigpu_primary_capable: bool,
}

#[derive(Debug, Clone)]
pub struct Gpu {
    /// Server-side GPU index
    pub id: u32,
    pub name: String,
    pub uuid: String,
    pub displays: Vec<DisplayId>,
    pub aggregation: Aggregation,
    pub caps: GpuCaps,
    /// The server already folded doublescan into vtotal
    pub doublescan_in_vtotal: bool,
}

impl Gpu {
    pub fn new(id: u32, name: &str, uuid: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            uuid: uuid.to_string(),
            displays: Vec::new(),
            aggregation: Aggregation::default(),
            caps: GpuCaps::default(),
            doublescan_in_vtotal: false,
        }
    }
}

/// Display that lives outside every Screen but shares the desktop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxDisplay {
    pub name: Option<String>,
    pub screen: Option<i32>,
    pub rect: Rect,
}
