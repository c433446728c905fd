// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - pipeline/xtrans.rs
 *
 * Copyright (C) 2024 rawdev contributors
 *
 * This library is free software: you can redistribute it and/or
 * modify it under the terms of the GNU Lesser General Public License
 * as published by the Free Software Foundation, either version 3 of
 * the License, or (at your option) any later version.
 *
 * This library is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
 * Lesser General Public License for more details.
 *
 * You should have received a copy of the GNU Lesser General Public
 * License along with this library.  If not, see
 * <http://www.gnu.org/licenses/>.
 */

//! X-Trans interpolation, a 6x6-aware directional variant. Greens
//! come from the gradient-selected direction, chroma from colour
//! differences; the 3-pass mode refines the chroma twice more.

use log::debug;
use rayon::prelude::*;

use crate::pipeline::{demosaic, FileContext};
use crate::utils::clip16;
use crate::Result;

pub(crate) fn interpolate(ctx: &mut FileContext, passes: u32) -> Result<()> {
    debug!("{}: {}-pass X-Trans interpolation", ctx.input, passes);
    demosaic::border_interpolate(ctx, 2);

    let width = ctx.image.width as i32;
    let height = ctx.image.height as i32;
    let cfa = ctx.desc.cfa.clone();
    let fc = |r: i32, c: i32| cfa.fc(r as u32, c as u32);

    // Greens first. Every X-Trans row and column has a green within
    // two sites; estimate along the axis with the smaller gradient.
    let src = ctx.image.data.clone();
    let green: Vec<(usize, u16)> = (2..height - 2)
        .into_par_iter()
        .flat_map_iter(|row| {
            let src = &src;
            let cfa = &cfa;
            (2..width - 2).filter_map(move |col| {
                let f = cfa.fc(row as u32, col as u32);
                if f == 1 {
                    return None;
                }
                let at = |r: i32, c: i32| -> i32 { src[((r * width + c) * 4) as usize
                    + cfa.fc(r as u32, c as u32)] as i32 };
                let g_at = |r: i32, c: i32| -> Option<i32> {
                    if cfa.fc(r as u32, c as u32) == 1 {
                        Some(src[((r * width + c) * 4) as usize + 1] as i32)
                    } else {
                        None
                    }
                };
                // Nearest greens along each axis, up to distance 2.
                let pick = |dr: i32, dc: i32| -> Option<(i32, i32)> {
                    for step in 1..=2 {
                        if let Some(g) = g_at(row + dr * step, col + dc * step) {
                            return Some((g, step));
                        }
                    }
                    None
                };
                let h = (pick(0, -1), pick(0, 1));
                let v = (pick(-1, 0), pick(1, 0));
                let grad_h = (at(row, col - 1) - at(row, col + 1)).abs();
                let grad_v = (at(row - 1, col) - at(row + 1, col)).abs();
                let mean = |pair: (Option<(i32, i32)>, Option<(i32, i32)>)| -> Option<i32> {
                    match pair {
                        (Some((a, wa)), Some((b, wb))) => {
                            // Weight by inverse distance.
                            Some((a * wb + b * wa) / (wa + wb))
                        }
                        (Some((a, _)), None) | (None, Some((a, _))) => Some(a),
                        (None, None) => None,
                    }
                };
                let estimate = match (mean(h), mean(v)) {
                    (Some(h), Some(v)) => {
                        if grad_h < grad_v {
                            h
                        } else if grad_v < grad_h {
                            v
                        } else {
                            (h + v) / 2
                        }
                    }
                    (Some(h), None) => h,
                    (None, Some(v)) => v,
                    (None, None) => return None,
                };
                Some((
                    ((row * width + col) * 4 + 1) as usize,
                    clip16(estimate),
                ))
            })
        })
        .collect();
    for (idx, g) in green {
        ctx.image.data[idx] = g;
    }

    // Chroma from colour differences, optionally refined.
    let chroma_passes = if passes >= 3 { 3 } else { 1 };
    for _ in 0..chroma_passes {
        let src = ctx.image.data.clone();
        for row in 2..height - 2 {
            for col in 2..width - 2 {
                let f = fc(row, col);
                let base = ((row * width + col) * 4) as usize;
                let g = src[base + 1] as i32;
                for ch in [0_usize, 2] {
                    if ch == f {
                        continue;
                    }
                    let mut sum = 0_i64;
                    let mut n = 0_i64;
                    for dr in -2_i32..=2 {
                        for dc in -2_i32..=2 {
                            if dr == 0 && dc == 0 {
                                continue;
                            }
                            let r = row + dr;
                            let c = col + dc;
                            if fc(r, c) == ch {
                                let idx = ((r * width + c) * 4) as usize;
                                sum += src[idx + ch] as i64 - src[idx + 1] as i64;
                                n += 1;
                            }
                        }
                    }
                    if n > 0 {
                        ctx.image.data[base + ch] = clip16(g + (sum / n) as i32);
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use crate::io::Stream;
    use crate::mosaic::CfaPattern;
    use crate::params::Params;
    use crate::pipeline::FileContext;

    /// The classic X-Trans layout.
    pub(crate) const XTRANS: [[u8; 6]; 6] = [
        [1, 1, 0, 1, 1, 2],
        [1, 1, 2, 1, 1, 0],
        [2, 0, 1, 0, 2, 1],
        [1, 1, 2, 1, 1, 0],
        [1, 1, 0, 1, 1, 2],
        [0, 2, 1, 2, 0, 1],
    ];

    #[test]
    fn test_xtrans_coverage() {
        let stream = Stream::new(Box::new(std::io::Cursor::new(Vec::new())));
        let mut ctx = FileContext::new(stream, Params::default(), "test");
        ctx.desc.width = 12;
        ctx.desc.height = 12;
        ctx.desc.cfa = CfaPattern::XTrans(XTRANS);
        ctx.alloc_image().unwrap();
        for row in 0..12_u32 {
            for col in 0..12_u32 {
                let c = ctx.desc.fc(row, col);
                ctx.image.data[(row * 12 + col) as usize * 4 + c] = 600;
            }
        }
        super::interpolate(&mut ctx, 1).unwrap();
        for row in 2..10_u32 {
            for col in 2..10_u32 {
                let pix = ctx.image.pixel_at(row, col).unwrap();
                for c in 0..3 {
                    assert_ne!(pix[c], 0, "channel {} empty at {},{}", c, row, col);
                }
            }
        }
    }
}
