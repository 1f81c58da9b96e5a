//! Point file tracing a leak, for loading into an editor.

use crate::errors::CompileError;
use crate::float_types::Real;
use crate::outside::LeakReport;
use nalgebra::Point3;
use std::fmt::Write as _;
use std::path::Path;

/// Points every `spacing` units along the leak polyline, ending on its last
/// vertex.
pub fn leak_points(report: &LeakReport, spacing: Real) -> Vec<Point3<Real>> {
    let spacing = if spacing > 0.0 { spacing } else { 2.0 };
    let mut points = Vec::new();
    for pair in report.path.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let dir = end - start;
        let length = dir.norm();
        let steps = (length / spacing).floor() as usize;
        for i in 0..steps.max(1) {
            let t = if steps == 0 { 0.0 } else { i as Real / steps as Real };
            points.push(start + dir * t);
        }
    }
    if let Some(last) = report.path.last() {
        points.push(*last);
    }
    points
}

pub fn write_leak_file(path: &Path, report: &LeakReport, spacing: Real) -> Result<(), CompileError> {
    let points = leak_points(report, spacing);
    let mut text = String::new();
    for p in &points {
        let _ = writeln!(text, "{:.6} {:.6} {:.6}", p.x, p.y, p.z);
    }
    std::fs::write(path, text)?;
    log::info!("leak file {} written with {} points", path.display(), points.len());
    Ok(())
}
