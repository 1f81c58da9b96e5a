//! Compile errors
//!
//! Everything in here aborts the whole compile. Recoverable problems (a
//! degenerate face, an unknown contents value, ...) are logged with
//! `log::warn!` where they happen and never reach these types.

use crate::float_types::Real;
use nalgebra::Point3;

/// Problems found while reading `.map` source text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapParseError {
    /// The file ended inside an entity, brush or string
    #[error("line {line}: unexpected end of file while reading {context}")]
    UnexpectedEof { line: usize, context: &'static str },
    /// A quoted string ran into the end of its line
    #[error("line {line}: unterminated string")]
    UnterminatedString { line: usize },
    /// Some other token was found where a specific one was required
    #[error("line {line}: expected {expected}, found '{found}'")]
    Expected {
        line: usize,
        expected: &'static str,
        found: String,
    },
    /// A numeric field could not be parsed
    #[error("line {line}: invalid number '{token}'")]
    BadNumber { line: usize, token: String },
}

/// All the ways a compile can fail.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Malformed or unterminated source
    #[error(transparent)]
    Parse(#[from] MapParseError),

    /// A brush vertex lies outside `±world_extent`
    #[error("line {line}: brush vertex {coord} exceeds the world extent of {extent}")]
    WorldExtent {
        line: usize,
        coord: Point3<Real>,
        extent: Real,
    },

    /// A brush with fewer than four distinct planes cannot enclose a volume
    #[error("line {line}: brush has only {count} distinct planes (need at least 4)")]
    TooFewPlanes { line: usize, count: usize },

    /// Every side of the brush clipped away
    #[error("line {line}: brush has no valid faces")]
    EmptyBrush { line: usize },

    /// A collision hull of a brush entity ended up without brushes
    #[error("entity {entity} ({classname}) has no valid brushes")]
    NoValidBrushes { entity: usize, classname: String },

    /// The solid BSP builder could not choose a plane for non-empty geometry
    #[error("no splitting plane found for a node holding {faces} faces")]
    NoSplitPlane { faces: usize },

    /// The map leaks and leaks are configured to be fatal
    #[error("map leaks: entity {entity} ({classname}) reaches the outside via {portals} portals")]
    Leak {
        entity: usize,
        classname: String,
        portals: usize,
    },

    /// Output or read-back of a binary file failed
    #[error("BSP format error: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
