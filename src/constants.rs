//! Grammar keywords and numeric constants
//!
//! Every literal the parsers and serializers agree on lives here, so the
//! two directions cannot drift apart.

/// Configuration file location
pub mod config {
    /// Directory under the user config dir
    pub const APP_DIR: &str = "display-topology";

    /// Settings file name
    pub const FILENAME: &str = "settings.json";
}

/// Separators shared by the string encodings
pub mod grammar {
    /// Separates the `token=value` header from the body of a record
    pub const HEADER_SEPARATOR: &str = "::";

    /// Literal mode name / metamode body meaning "display off"
    pub const NULL_MODE: &str = "NULL";

    /// Separator between per-display segments when serializing a metamode
    pub const SEGMENT_JOIN: &str = ", ";

    /// Separator between records of the auxiliary display placement string
    pub const AUX_RECORD_SEPARATOR: char = ';';
}

/// Token names for modeline headers
pub mod modeline_tokens {
    pub const SOURCE: &str = "source";
    pub const XCONFIG_NAME: &str = "xconfig-name";
}

/// Token names for metamode headers
pub mod metamode_tokens {
    pub const ID: &str = "id";
    pub const SOURCE: &str = "source";
    pub const SWITCHABLE: &str = "switchable";
}

/// Token names inside a mode's `{...}` block
pub mod mode_tokens {
    pub const STEREO: &str = "stereo";
    pub const VIEWPORT_IN: &str = "viewportin";
    pub const VIEWPORT_OUT: &str = "viewportout";
    pub const ROTATION: &str = "rotation";
    pub const REFLECTION: &str = "reflection";
    pub const PIXEL_SHIFT: &str = "PixelShiftMode";
    pub const FORCE_COMPOSITION: &str = "ForceCompositionPipeline";
    pub const FORCE_FULL_COMPOSITION: &str = "ForceFullCompositionPipeline";
    pub const ALLOW_GSYNC: &str = "AllowGSYNC";
}

/// Geometry limits
pub mod geometry {
    /// Smallest width/height an underscanned ViewPortOut may shrink to
    pub const MIN_VIEWPORT_OUT: i32 = 10;
}

/// Refresh rate computation factors
pub mod refresh {
    /// Clock values are given in MHz
    pub const CLOCK_SCALE: f64 = 1_000_000.0;

    /// Doublescan modes scan every line twice
    pub const DOUBLESCAN_FACTOR: f64 = 0.5;

    /// Interlaced modes report field rate, not frame rate
    pub const INTERLACE_FACTOR: f64 = 2.0;
}
