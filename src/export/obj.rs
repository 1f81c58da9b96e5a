//! Wavefront OBJ dump of faces, one group per texture.

use crate::context::CompileContext;
use crate::csg::Face;
use crate::errors::CompileError;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

pub fn obj_text<'f>(ctx: &CompileContext, faces: impl IntoIterator<Item = &'f Face>) -> String {
    let mut groups: BTreeMap<String, Vec<&Face>> = BTreeMap::new();
    for face in faces {
        let texture = ctx.texinfos.get(face.texinfo).texture;
        groups.entry(texture).or_default().push(face);
    }

    let mut text = String::new();
    let mut next_vertex = 1;
    for (texture, faces) in &groups {
        let _ = writeln!(text, "g {texture}");
        for face in faces {
            for p in &face.winding.points {
                let _ = writeln!(text, "v {:.6} {:.6} {:.6}", p.x, p.y, p.z);
            }
            // OBJ winds counter-clockwise
            text.push('f');
            let n = face.winding.len();
            for i in (0..n).rev() {
                let _ = write!(text, " {}", next_vertex + i);
            }
            text.push('\n');
            next_vertex += n;
        }
    }
    text
}

pub fn write_obj<'f>(
    ctx: &CompileContext,
    path: &Path,
    faces: impl IntoIterator<Item = &'f Face>,
) -> Result<(), CompileError> {
    std::fs::write(path, obj_text(ctx, faces))?;
    log::info!("wrote {}", path.display());
    Ok(())
}
