//! qbsp command line: `qbsp [options] sourcefile [destfile]`

use qbsp::float_types::{Real, set_tolerance};
use qbsp::{CompileOptions, LeakSeverity, Target, compile_file};
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "\
usage: qbsp [options] sourcefile [destfile]

options:
   -nofill                  Don't perform outside filling
   -noclip                  Don't build clip hulls
   -noskip                  Keep faces with the 'skip' texture
   -nodetail                Convert func_detail to structural
   -notjunc                 Don't fix T-junctions
   -notranswater            Liquids block the portal file
   -noprt                   Don't write the portal file
   -forcegoodtree           Use the expensive split heuristic on every pass
   -leaktest                Fail the compile if the map leaks
   -leakdist [n]            Space between leak file points (default 2)
   -maxnodesize [n]         Midsplit nodes larger than this (default 1024, 0 disables)
   -midsplitsurffraction [f] Midsplit nodes holding more than this share of faces
   -epsilon [n]             Plane side epsilon (default 0.0001)
   -worldextent [n]         Largest coordinate accepted (default 65536)
   -objexport               Write OBJ dumps after CSG and after the final tree
   -omitdetail              Drop func_detail brushes
   -omitdetailwall          Drop func_detail_wall brushes
   -omitdetailillusionary   Drop func_detail_illusionary brushes
   -omitdetailfence         Drop func_detail_fence brushes
   -bsp2                    Write BSP2
   -q2bsp                   Write a Quake II BSP
   -verbose                 Log per-stage detail
   -quiet                   Log warnings and errors only";

#[derive(Debug)]
struct Args {
    options: CompileOptions,
    input: PathBuf,
    output: PathBuf,
    filter: &'static str,
}

fn number(flag: &str, value: Option<String>) -> Result<Real, String> {
    let value = value.ok_or_else(|| format!("-{flag} needs an argument"))?;
    value
        .parse::<Real>()
        .map_err(|_| format!("-{flag}: '{value}' is not a number"))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut options = CompileOptions::default();
    let mut filter = "info";
    let mut files = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let Some(flag) = arg.strip_prefix('-') else {
            files.push(PathBuf::from(arg));
            continue;
        };
        match flag.to_ascii_lowercase().as_str() {
            "nofill" => options.no_fill = true,
            "noclip" => options.no_clip = true,
            "noskip" => options.no_skip = true,
            "nodetail" => options.no_detail = true,
            "notjunc" => options.no_tjunc = true,
            "notranswater" => options.transwater = false,
            "noprt" => options.write_portal_file = false,
            "forcegoodtree" => options.force_good_tree = true,
            "leaktest" => options.leak_severity = LeakSeverity::Fatal,
            "leakdist" => options.leak_dist = number(flag, args.next())?,
            "maxnodesize" => options.max_node_size = number(flag, args.next())?,
            "midsplitsurffraction" => {
                options.midsplit_surf_fraction = number(flag, args.next())?.clamp(0.0, 1.0)
            },
            "epsilon" => options.on_epsilon = number(flag, args.next())?,
            "worldextent" => options.world_extent = number(flag, args.next())?,
            "objexport" => options.obj_export = true,
            "omitdetail" => options.omit_detail = true,
            "omitdetailwall" => options.omit_detail_wall = true,
            "omitdetailillusionary" => options.omit_detail_illusionary = true,
            "omitdetailfence" => options.omit_detail_fence = true,
            "bsp2" => options.target = Target::Bsp2,
            "q2bsp" => options.target = Target::Quake2,
            "verbose" => filter = "debug",
            "quiet" => filter = "warn",
            _ => return Err(format!("unknown option '{arg}'")),
        }
    }

    let mut files = files.into_iter();
    let input = files.next().ok_or("no source file given")?;
    let output = files
        .next()
        .unwrap_or_else(|| input.with_extension("bsp"));
    if files.next().is_some() {
        return Err("too many file arguments".to_string());
    }
    let input = if input.extension().is_none() {
        input.with_extension("map")
    } else {
        input
    };

    Ok(Args {
        options,
        input,
        output,
        filter,
    })
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}\n\n{USAGE}");
            return ExitCode::FAILURE;
        },
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.filter)).init();
    set_tolerance(args.options.on_epsilon);
    log::info!("---- qbsp {} ----", env!("CARGO_PKG_VERSION"));

    match compile_file(&args.input, &args.output, args.options) {
        Ok(compiled) => {
            if compiled.leak.is_some() {
                log::warn!("map leaked; no portal file written");
            }
            ExitCode::SUCCESS
        },
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        },
    }
}
