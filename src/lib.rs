//! Core of a Quake map compiler: convex brushes to a solid BSP tree with
//! leak detection, written out as a BSP file.
//!
//! Stages, in pipeline order:
//! - [`brush`]: half-space brushes to convex polygonal brushes
//! - [`csg`] and [`merge`]: overlapping brushes to a skin with no hidden faces
//! - [`bsp`]: solid BSP construction
//! - [`portals`]: leaf adjacency
//! - [`outside`]: outside fill and leak detection
//! - [`areas`]: area numbering for Quake II
//! - [`tjunc`]: T-junction repair
//! - [`export`]: output tables and binary formats
//!
//! [`compile`] drives them for every entity and hull.
//!
//! # Features
//! #### Default
//! - **f64**: use f64 as Real
//! - **parallel**: use rayon for brush loading, CSG, merging and split scoring
//!
//! #### Optional
//! - **f32**: use f32 as Real, this conflicts with f64

#![forbid(unsafe_code)]
#![warn(clippy::missing_const_for_fn, clippy::approx_constant, clippy::all)]

pub mod areas;
pub mod brush;
pub mod bsp;
pub mod compile;
pub mod contents;
pub mod context;
pub mod csg;
pub mod errors;
pub mod export;
pub mod float_types;
pub mod map;
pub mod merge;
pub mod options;
pub mod outside;
pub mod plane;
pub mod portals;
pub mod tjunc;
pub mod winding;

#[cfg(any(all(feature = "f64", feature = "f32"), not(any(feature = "f64", feature = "f32"))))]
compile_error!("Either 'f64' or 'f32' feature must be specified, but not both");

pub use compile::{Compiled, compile_file, compile_map};
pub use context::CompileContext;
pub use errors::{CompileError, MapParseError};
pub use options::{CompileOptions, LeakSeverity, Target};
