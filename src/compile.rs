//! Pipeline driver: every entity through every hull, then the output file.

use crate::areas::{AreaMap, flood_areas};
use crate::brush::load_entity;
use crate::bsp::{Tree, build_tree};
use crate::context::CompileContext;
use crate::csg::csg_faces;
use crate::errors::CompileError;
use crate::export::leakfile::write_leak_file;
use crate::export::obj::write_obj;
use crate::export::prt::portal_file_text;
use crate::export::{BspBuilder, BspData, write_bsp};
use crate::float_types::Real;
use crate::map::{Entity, MapFile, parse_map};
use crate::merge::merge_surfaces;
use crate::options::{CompileOptions, LeakSeverity};
use crate::outside::{FillOutcome, LeakReport, fill_outside};
use crate::portals::{PortalGraph, portalize};
use crate::tjunc::fix_tree_tjunctions;
use nalgebra::Point3;
use std::path::{Path, PathBuf};

/// What one entity contributed to the output.
#[derive(Debug, Clone)]
pub struct EntityResult {
    pub model: usize,
    /// Centre of the entity's origin brush
    pub origin: Option<Point3<Real>>,
    pub leak: Option<LeakReport>,
    /// PRT1 text, worldspawn only
    pub portal_text: Option<String>,
    pub areas: Option<AreaMap>,
}

/// Result of a whole compile.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub data: BspData,
    pub leak: Option<LeakReport>,
    pub portal_text: Option<String>,
    pub areas: Option<AreaMap>,
}

fn side_path(output: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{stem}{suffix}.{extension}"))
}

/// Classnames whose entity disappears once its brushes joined worldspawn.
fn is_removed_group(classname: &str) -> bool {
    matches!(
        classname,
        "func_group"
            | "func_detail"
            | "func_detail_wall"
            | "func_detail_illusionary"
            | "func_detail_fence"
    )
}

/// Portalize, fill and rebuild a world tree. Returns the final tree, its
/// portals and the leak, if any.
fn fill_and_rebuild(
    ctx: &CompileContext,
    mut tree: Tree,
    entities: &[Entity],
    hull: usize,
    output: Option<&Path>,
) -> Result<(Tree, PortalGraph, Option<LeakReport>), CompileError> {
    let graph = portalize(ctx, &tree);
    if ctx.options.no_fill {
        return Ok((tree, graph, None));
    }

    match fill_outside(ctx, &mut tree, &graph, entities) {
        FillOutcome::Filled { .. } => {
            let mut surfaces = tree.gather_faces();
            if hull == 0 {
                surfaces = merge_surfaces(ctx, surfaces);
            }
            let tree = build_tree(ctx, surfaces, false)?;
            let graph = portalize(ctx, &tree);
            Ok((tree, graph, None))
        },
        FillOutcome::Leaked(report) => {
            if hull > 0 {
                log::debug!("hull {hull} leaks, keeping the unfilled tree");
                return Ok((tree, graph, None));
            }
            if let Some(output) = output {
                write_leak_file(&output.with_extension("pts"), &report, ctx.options.leak_dist)?;
            }
            if ctx.options.leak_severity == LeakSeverity::Fatal {
                log::error!("leaks are fatal, aborting");
                return Err(CompileError::Leak {
                    entity: report.occupant.entity,
                    classname: report.occupant.classname.clone(),
                    portals: report.portals.len(),
                });
            }
            Ok((tree, graph, Some(report)))
        },
        FillOutcome::Skipped => Ok((tree, graph, None)),
    }
}

/// Compile one entity for every hull of the target and add it to `builder`.
/// Entities without brushes (other than worldspawn) have no model.
pub fn process_entity(
    ctx: &CompileContext,
    builder: &mut BspBuilder,
    map: &MapFile,
    index: usize,
    output: Option<&Path>,
) -> Result<Option<EntityResult>, CompileError> {
    let entity = &map.entities[index];
    if index > 0 && entity.brushes.is_empty() {
        return Ok(None);
    }
    let is_world = index == 0;
    let options = &ctx.options;
    let profile = builder.profile();
    log::info!("---- Entity {index} ({}) ----", entity.classname());

    let loaded = load_entity(ctx, entity, is_world, 0, None)?;
    loaded.stats.log();
    log::info!("{:8} planes", ctx.planes.len());

    let surfaces = csg_faces(ctx, &loaded.brushes);
    log::info!("{:8} surfaces", surfaces.len());
    if options.obj_export && is_world {
        if let Some(output) = output {
            write_obj(
                ctx,
                &side_path(output, "_post_csg", "obj"),
                surfaces.iter().flat_map(|s| s.faces.iter()),
            )?;
        }
    }
    let surfaces = merge_surfaces(ctx, surfaces);

    let midsplit = is_world && !options.force_good_tree;
    let mut tree = build_tree(ctx, surfaces, midsplit)?;
    let mut leak = None;
    let mut world_graph: Option<PortalGraph> = None;
    let mut areas = None;
    if is_world {
        let (filled, graph, report) = fill_and_rebuild(ctx, tree, &map.entities, 0, output)?;
        tree = filled;
        leak = report;
        if profile.has_brush_lists() {
            areas = Some(flood_areas(&tree, &graph, &loaded.brushes));
        }
        world_graph = options.write_portal_file.then_some(graph);
    }

    if !options.no_tjunc {
        fix_tree_tjunctions(&mut tree, options.no_skip);
    }
    if profile.resolves_detail() {
        tree.resolve_detail(0);
    }
    if options.obj_export && is_world {
        if let Some(output) = output {
            write_obj(
                ctx,
                &side_path(output, "_final", "obj"),
                tree.nodes.iter().flat_map(|n| n.faces.iter()),
            )?;
        }
    }

    let brush_base = if profile.has_brush_lists() {
        Some(builder.add_brush_list(&loaded.brushes)?)
    } else {
        None
    };
    let export = builder.add_model_faces(&tree, loaded.origin, brush_base, areas.as_ref())?;
    if let Some(clip_bounds) = &loaded.clip_bounds {
        builder.extend_model_bounds(export.model, clip_bounds)?;
    }
    let portal_text = world_graph
        .map(|graph| portal_file_text(&tree, &graph, &export, options.transwater));
    if let Some(areas) = &areas {
        builder.add_areas(areas, |entity| map.area_portal_number(entity))?;
    }

    for (hull, hull_box) in profile.hulls().iter().enumerate().skip(1) {
        if options.no_clip {
            let head = builder.data().models[export.model].head_nodes[0];
            builder.set_head_node(export.model, hull, head)?;
            continue;
        }
        log::info!("---- Hull {hull} ----");
        let loaded = load_entity(ctx, entity, is_world, hull, Some(hull_box))?;
        if loaded.brushes.is_empty() {
            return Err(CompileError::NoValidBrushes {
                entity: index,
                classname: entity.classname().to_string(),
            });
        }
        let surfaces = csg_faces(ctx, &loaded.brushes);
        let mut tree = build_tree(ctx, surfaces, true)?;
        if is_world && !options.no_fill {
            tree = fill_and_rebuild(ctx, tree, &map.entities, hull, None)?.0;
        }
        tree.resolve_detail(hull);
        builder.add_clip_hull(export.model, hull, &tree)?;
    }

    Ok(Some(EntityResult {
        model: export.model,
        origin: loaded.origin,
        leak,
        portal_text,
        areas,
    }))
}

/// Compile a parsed map. With `output`, the BSP file and its side files
/// (portal file, leak points, OBJ dumps) are written next to it.
pub fn compile_map(
    ctx: &CompileContext,
    map: &mut MapFile,
    output: Option<&Path>,
) -> Result<Compiled, CompileError> {
    map.merge_world_brush_entities(&ctx.options);
    map.fix_rotate_origins();
    let profile = ctx.options.target.profile();
    let mut builder = BspBuilder::new(ctx, profile);

    let mut world: Option<EntityResult> = None;
    let mut model_keys: Vec<(usize, usize, Option<Point3<Real>>)> = Vec::new();
    for index in 0..map.entities.len() {
        let Some(result) = process_entity(ctx, &mut builder, map, index, output)? else {
            continue;
        };
        if index == 0 {
            world = Some(result);
        } else {
            model_keys.push((index, result.model, result.origin));
        }
    }

    for (index, model, origin) in model_keys {
        let entity = &mut map.entities[index];
        entity.set("model", &format!("*{model}"));
        if let Some(o) = origin {
            entity.set("origin", &format!("{} {} {}", o.x, o.y, o.z));
        }
    }
    let kept: Vec<Entity> = map
        .entities
        .iter()
        .filter(|e| !is_removed_group(e.classname()))
        .cloned()
        .collect();
    let data = builder.finish(&kept);

    let (leak, portal_text, areas) = match world {
        Some(w) => (w.leak, w.portal_text, w.areas),
        None => (None, None, None),
    };

    if let Some(output) = output {
        write_bsp(output, &data, profile)?;
        if let Some(text) = &portal_text {
            if leak.is_none() {
                std::fs::write(output.with_extension("prt"), text)?;
                log::info!("wrote {}", output.with_extension("prt").display());
            }
        }
    }

    Ok(Compiled {
        data,
        leak,
        portal_text,
        areas,
    })
}

/// Read, compile and write one map file.
pub fn compile_file(
    input: &Path,
    output: &Path,
    options: CompileOptions,
) -> Result<Compiled, CompileError> {
    let text = std::fs::read_to_string(input)?;
    let mut map = parse_map(&text)?;
    log::info!("{} entities read from {}", map.entities.len(), input.display());
    let ctx = CompileContext::new(options);
    compile_map(&ctx, &mut map, Some(output))
}
