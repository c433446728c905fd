// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - bin/rddev.rs
 *
 * Copyright (C) 2024 rawdev contributors
 *
 * This program is free software: you can redistribute it and/or
 * modify it under the terms of the GNU Lesser General Public License
 * as published by the Free Software Foundation, either version 3 of
 * the License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
 * Lesser General Public License for more details.
 *
 * You should have received a copy of the GNU Lesser General Public
 * License along with this program.  If not, see
 * <http://www.gnu.org/licenses/>.
 */

//! Command line RAW developer. One image out per file in; any
//! unrecoverable error skips the file and sets the exit status.

use std::io::Write;
use std::path::PathBuf;

use getopts::Options;

use rawdev::{
    develop, identify_file, write_pnm, write_tiff, DemosaicAlgorithm, HighlightMode, OutputSpace,
    Params, Stream,
};

fn usage(opts: &Options) -> ! {
    print!("{}", opts.usage("Usage: rddev [OPTION]... [FILE]..."));
    std::process::exit(1);
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut opts = Options::new();
    opts.optflag("v", "", "Print verbose messages");
    opts.optflag("c", "", "Write image data to standard output");
    opts.optflag("I", "", "Read image data from standard input");
    opts.optflag("i", "", "Identify files without decoding them");
    opts.optflag("w", "", "Use camera white balance, if possible");
    opts.optflag("a", "", "Average the whole image for white balance");
    opts.optopt("A", "", "Average a grey box for white balance", "<x y w h>");
    opts.optopt("r", "", "Set custom white balance", "<r g b g>");
    opts.optflag("M", "", "Use the embedded color matrix");
    opts.optopt("P", "", "Fix the dead pixels listed in this file", "<file>");
    opts.optopt("K", "", "Subtract dark frame (16-bit raw PGM)", "<file>");
    opts.optopt("k", "", "Set the darkness level", "<num>");
    opts.optopt("S", "", "Set the saturation level", "<num>");
    opts.optopt("n", "", "Set threshold for wavelet denoising", "<num>");
    opts.optopt("H", "", "Highlight mode (0=clip, 1=unclip, 2=blend, 3+=rebuild)", "<num>");
    opts.optopt("t", "", "Flip image (0=none, 3=180, 5=90CCW, 6=90CW)", "<num>");
    opts.optopt("o", "", "Output colorspace (0..6)", "<num>");
    opts.optflag("d", "", "Document mode (no color, no interpolation)");
    opts.optflag("D", "", "Document mode without scaling (totally raw)");
    opts.optopt("b", "", "Adjust brightness", "<num>");
    opts.optopt("g", "", "Set custom gamma curve", "<p ts>");
    opts.optflag("W", "", "Don't automatically brighten the image");
    opts.optflag("h", "", "Half-size color image (twice as fast as -q 0)");
    opts.optflag("f", "", "Interpolate RGGB as four colors");
    opts.optopt("q", "", "Set the interpolation quality (0..3)", "<num>");
    opts.optopt("m", "", "Apply a cleanup pass on the output", "<num>");
    opts.optopt("s", "", "Select shot number or \"all\"", "<num>");
    opts.optopt("C", "", "Correct chromatic aberration", "<r b>");
    opts.optflag("j", "", "Don't stretch or rotate raw pixels");
    opts.optflag("T", "", "Write TIFF instead of PPM");
    opts.optflag("4", "", "Linear 16-bit, same as -6 -W -g 1 1");
    opts.optflag("6", "", "Write 16-bit output");
    opts.optopt("p", "", "Apply output ICC profile (accepted, unused)", "<file>");

    let matches = match opts.parse(&args) {
        Ok(m) => m,
        Err(err) => {
            eprintln!("rddev: {}", err);
            usage(&opts);
        }
    };
    if matches.free.is_empty() {
        usage(&opts);
    }

    let mut params = Params {
        verbose: matches.opt_present("v"),
        write_to_stdout: matches.opt_present("c"),
        read_from_stdin: matches.opt_present("I"),
        identify_only: matches.opt_present("i"),
        use_camera_wb: matches.opt_present("w"),
        use_auto_wb: matches.opt_present("a"),
        use_camera_matrix: matches.opt_present("M"),
        no_auto_bright: matches.opt_present("W"),
        half_size: matches.opt_present("h"),
        four_color_rgb: matches.opt_present("f"),
        use_fuji_rotate: !matches.opt_present("j"),
        output_tiff: matches.opt_present("T"),
        bad_pixels: matches.opt_str("P").map(PathBuf::from),
        dark_frame: matches.opt_str("K").map(PathBuf::from),
        output_profile: matches.opt_str("p").map(PathBuf::from),
        ..Params::default()
    };
    if params.verbose {
        simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init()
            .ok();
    } else {
        simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Warn)
            .init()
            .ok();
    }

    // Every option's arity is validated here, explicitly.
    let mut multi_all = false;
    let mut status = 0;
    let parse_f32 = |s: Option<String>, what: &str| -> Option<f32> {
        s.map(|v| match v.parse() {
            Ok(v) => v,
            Err(_) => {
                eprintln!("rddev: bad value for {}", what);
                std::process::exit(1);
            }
        })
    };
    if let Some(v) = parse_f32(matches.opt_str("b"), "-b") {
        params.brightness = v;
    }
    if let Some(v) = parse_f32(matches.opt_str("n"), "-n") {
        params.threshold = v;
    }
    if let Some(v) = matches.opt_str("k") {
        params.user_black = v.parse().ok();
    }
    if let Some(v) = matches.opt_str("S") {
        params.user_sat = v.parse().ok();
    }
    if let Some(v) = matches.opt_str("H") {
        params.highlight = HighlightMode::from_level(v.parse().unwrap_or(0));
    }
    if let Some(v) = matches.opt_str("t") {
        params.user_flip = v.parse().ok();
    }
    if let Some(v) = matches.opt_str("o") {
        let space: u32 = v.parse().unwrap_or(1);
        params.output_space = OutputSpace::try_from(space).unwrap_or(OutputSpace::SRgb);
    }
    if let Some(v) = matches.opt_str("q") {
        let q: u32 = v.parse().unwrap_or(3);
        params.user_qual = DemosaicAlgorithm::try_from(q.min(3)).ok();
    }
    if let Some(v) = matches.opt_str("m") {
        params.med_passes = v.parse().unwrap_or(0);
    }
    if let Some(v) = matches.opt_str("s") {
        if v == "all" {
            multi_all = true;
            params.multi_out = true;
        } else {
            params.shot_select = v.parse().unwrap_or(0);
        }
    }
    if let Some(v) = matches.opt_str("g") {
        let parts: Vec<f64> = v
            .split_whitespace()
            .filter_map(|p| p.parse().ok())
            .collect();
        if parts.len() != 2 {
            eprintln!("rddev: -g wants <power toe_slope>");
            std::process::exit(1);
        }
        params.gamma = [parts[0], parts[1]];
        // BT.709 and sRGB both give the power as > 1 on the command
        // line; the curve wants the reciprocal.
        if params.gamma[0] > 1.0 {
            params.gamma[0] = 1.0 / params.gamma[0];
        }
    }
    if let Some(v) = matches.opt_str("r") {
        let parts: Vec<f32> = v
            .split_whitespace()
            .filter_map(|p| p.parse().ok())
            .collect();
        if parts.len() != 4 {
            eprintln!("rddev: -r wants four multipliers");
            std::process::exit(1);
        }
        params.user_mul.copy_from_slice(&parts);
    }
    if let Some(v) = matches.opt_str("A") {
        let parts: Vec<u32> = v
            .split_whitespace()
            .filter_map(|p| p.parse().ok())
            .collect();
        if parts.len() != 4 {
            eprintln!("rddev: -A wants <x y w h>");
            std::process::exit(1);
        }
        params.grey_box.copy_from_slice(&parts);
        params.use_auto_wb = true;
    }
    if let Some(v) = matches.opt_str("C") {
        let parts: Vec<f64> = v
            .split_whitespace()
            .filter_map(|p| p.parse().ok())
            .collect();
        if parts.len() != 2 {
            eprintln!("rddev: -C wants <red blue>");
            std::process::exit(1);
        }
        params.aber = [1.0 / parts[0], 1.0 / parts[1]];
    }
    if matches.opt_present("d") {
        params.document_mode = 1;
    }
    if matches.opt_present("D") {
        params.document_mode = 2;
        params.no_auto_bright = true;
    }
    if matches.opt_present("6") {
        params.output_bps = 16;
    }
    if matches.opt_present("4") {
        params.output_bps = 16;
        params.no_auto_bright = true;
        params.gamma = [1.0, 1.0];
    }

    for file in &matches.free {
        let shots = if multi_all { u32::MAX } else { 1 };
        let mut shot = params.shot_select;
        loop {
            let mut p = params.clone();
            p.shot_select = shot;
            match process_one(file, &p, multi_all) {
                Ok(more_shots) => {
                    shot += 1;
                    if shot >= more_shots.min(shots) || !multi_all {
                        break;
                    }
                }
                Err(err) => {
                    eprintln!("{}: {}", file, err);
                    status = 1;
                    break;
                }
            }
        }
    }
    std::process::exit(status);
}

/// Develop one file (or one shot of it). Returns the number of
/// shots so `-s all` can iterate.
fn process_one(file: &str, params: &Params, multi: bool) -> rawdev::Result<u32> {
    let open = || -> rawdev::Result<Stream> {
        if params.read_from_stdin {
            let mut buffer = Vec::new();
            std::io::Read::read_to_end(&mut std::io::stdin(), &mut buffer)?;
            Ok(Stream::new(Box::new(std::io::Cursor::new(buffer))))
        } else {
            Ok(Stream::new(Box::new(std::fs::File::open(file)?)))
        }
    };

    if params.identify_only {
        let desc = identify_file(open()?, params.clone(), file)?;
        println!("{} is a {} {} image.", file, desc.make, desc.model);
        return Ok(desc.is_raw);
    }

    let mut ctx = develop(open()?, params.clone(), file)?;
    let shots = ctx.desc.is_raw;

    let ext = if params.output_tiff {
        "tiff"
    } else if ctx.desc.colors == 1 {
        "pgm"
    } else if ctx.desc.colors == 4 {
        "pam"
    } else {
        "ppm"
    };
    let write = |ctx: &mut rawdev::FileContext, out: &mut dyn Write| -> rawdev::Result<()> {
        if params.output_tiff {
            write_tiff(ctx, out)
        } else {
            write_pnm(ctx, out)
        }
    };
    if params.write_to_stdout {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        write(&mut ctx, &mut lock)?;
    } else {
        let stem = std::path::Path::new(file)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file.to_string());
        let name = if multi {
            format!("{}_{}.{}", stem, params.shot_select, ext)
        } else {
            format!("{}.{}", stem, ext)
        };
        let path = std::path::Path::new(file).with_file_name(name);
        if params.verbose {
            eprintln!("Writing data to {}...", path.display());
        }
        let mut out = std::fs::File::create(path)?;
        write(&mut ctx, &mut out)?;
    }
    Ok(shots)
}
