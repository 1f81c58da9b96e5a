//! Compile configuration.

use crate::export::format::{BSP2, BSP29, FormatProfile, QUAKE2};
use crate::float_types::{DEFAULT_WORLD_EXTENT, Real, tolerance};

/// What to do when the outside fill reaches an occupied leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeakSeverity {
    /// Log the leak, write the leak file and keep the unfilled tree
    #[default]
    Warn,
    /// Abort the compile
    Fatal,
}

/// Output file flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Bsp29,
    Bsp2,
    Quake2,
}

impl Target {
    pub fn profile(self) -> &'static dyn FormatProfile {
        match self {
            Target::Bsp29 => &BSP29,
            Target::Bsp2 => &BSP2,
            Target::Quake2 => &QUAKE2,
        }
    }
}

/// Every knob of one compile.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Plane-side epsilon for winding splits
    pub on_epsilon: Real,
    /// Maximum coordinate magnitude; also the half-size of base windings
    pub world_extent: Real,
    /// Use midsplit while a node is larger than this on any axis (0 disables)
    pub max_node_size: Real,
    /// Use midsplit while a node holds more than this fraction of the model's faces (0 disables)
    pub midsplit_surf_fraction: Real,
    /// Always build the expensive tree, even on the first pass
    pub force_good_tree: bool,
    pub no_fill: bool,
    pub no_clip: bool,
    /// Keep faces textured `skip`
    pub no_skip: bool,
    /// Treat detail entities as structural
    pub no_detail: bool,
    pub no_tjunc: bool,
    pub leak_severity: LeakSeverity,
    /// Spacing of points in the leak file
    pub leak_dist: Real,
    pub omit_detail: bool,
    pub omit_detail_wall: bool,
    pub omit_detail_illusionary: bool,
    pub omit_detail_fence: bool,
    pub obj_export: bool,
    pub write_portal_file: bool,
    /// Liquids are see-through for the portal file
    pub transwater: bool,
    pub target: Target,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            on_epsilon: tolerance(),
            world_extent: DEFAULT_WORLD_EXTENT,
            max_node_size: 1024.0,
            midsplit_surf_fraction: 0.0,
            force_good_tree: false,
            no_fill: false,
            no_clip: false,
            no_skip: false,
            no_detail: false,
            no_tjunc: false,
            leak_severity: LeakSeverity::Warn,
            leak_dist: 2.0,
            omit_detail: false,
            omit_detail_wall: false,
            omit_detail_illusionary: false,
            omit_detail_fence: false,
            obj_export: false,
            write_portal_file: true,
            transwater: true,
            target: Target::Bsp29,
        }
    }
}
