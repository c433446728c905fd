// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - pipeline/highlight.rs
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

//! Highlight recovery: blend through an orthonormal basis, or
//! rebuild by ratio diffusion at quarter scale. Clip and unclip are
//! handled by the scaling stage's choice of normalization.

use log::debug;

use crate::params::HighlightMode;
use crate::pipeline::FileContext;
use crate::utils::clip16;
use crate::Result;

pub(crate) fn run(ctx: &mut FileContext) -> Result<()> {
    if ctx.desc.colors != 3 {
        return Ok(());
    }
    match ctx.params.highlight {
        HighlightMode::Clip | HighlightMode::Unclip => Ok(()),
        HighlightMode::Blend => {
            blend_highlights(ctx);
            Ok(())
        }
        HighlightMode::Rebuild(level) => {
            recover_highlights(ctx, level);
            Ok(())
        }
    }
}

/// Decompose into a saturation-preserving subspace and a clipped
/// copy through a fixed orthonormal basis; rescale by the ratio of
/// chromatic magnitudes.
pub(crate) fn blend_highlights(ctx: &mut FileContext) {
    // Orthonormal basis pairs for 3 colours.
    static TRANS: [[f64; 3]; 3] = [
        [1.0, 1.0, 1.0],
        [1.7320508, -1.7320508, 0.0],
        [-1.0, -1.0, 2.0],
    ];
    static ITRANS: [[f64; 3]; 3] = [
        [1.0, 0.8660254, -0.5],
        [1.0, -0.8660254, -0.5],
        [1.0, 0.0, 1.0],
    ];
    debug!("{}: blending highlights", ctx.input);
    let clip = ctx.desc.maximum.min(65535) as i32;

    for pix in ctx.image.data.chunks_exact_mut(4) {
        if !(0..3).any(|c| pix[c] as i32 > clip) {
            continue;
        }
        // cam[0] is the unclipped pixel, cam[1] the clipped copy.
        let mut cam = [[0.0_f64; 3]; 2];
        let mut lab = [[0.0_f64; 3]; 2];
        for c in 0..3 {
            cam[0][c] = pix[c] as f64;
            cam[1][c] = (pix[c] as i32).min(clip) as f64;
        }
        for i in 0..2 {
            for c in 0..3 {
                lab[i][c] = (0..3).map(|j| TRANS[c][j] * cam[i][j]).sum();
            }
        }
        // Chromatic magnitude over channels 1..N-1.
        let mut sum = [0.0_f64; 2];
        for i in 0..2 {
            for c in 1..3 {
                sum[i] += lab[i][c] * lab[i][c];
            }
        }
        let chratio = if sum[0] > 0.0 {
            (sum[1] / sum[0]).sqrt()
        } else {
            1.0
        };
        for c in 1..3 {
            lab[0][c] *= chratio;
        }
        for (c, p) in pix.iter_mut().take(3).enumerate() {
            let v: f64 = (0..3).map(|j| ITRANS[c][j] * lab[0][j]).sum::<f64>() / 3.0;
            *p = clip16(v as i32);
        }
    }
}

/// At quarter scale, locate pixels clipped in one channel but not in
/// green, diffuse their channel ratio outward and apply the smoothed
/// ratio to the clipped pixels only.
pub(crate) fn recover_highlights(ctx: &mut FileContext, level: u8) {
    debug!("{}: rebuilding highlights", ctx.input);
    let width = ctx.image.width as usize;
    let height = ctx.image.height as usize;
    let maximum = ctx.desc.maximum.min(65535) as f32;
    let grow = (2.0_f32).powf(4.0 - level as f32);
    let scale = [
        ctx.desc.pre_mul[0],
        ctx.desc.pre_mul[1],
        ctx.desc.pre_mul[2],
    ];

    let qwidth = width >> 2;
    let qheight = height >> 2;
    if qwidth == 0 || qheight == 0 {
        return;
    }

    for c in [0_usize, 2] {
        let csat = maximum * scale[c] / scale[1];
        let kc = scale[1] / scale[c];
        // Quarter-scale ratio map: channel over green.
        let mut map = vec![-1.0_f32; qwidth * qheight];
        for qr in 0..qheight {
            for qc_ in 0..qwidth {
                let mut sum = 0.0_f32;
                let mut n = 0;
                let mut clipped = false;
                for row in qr * 4..(qr * 4 + 4).min(height) {
                    for col in qc_ * 4..(qc_ * 4 + 4).min(width) {
                        let idx = (row * width + col) * 4;
                        let v = ctx.image.data[idx + c] as f32;
                        let g = ctx.image.data[idx + 1] as f32;
                        if v >= csat {
                            clipped = true;
                        } else if g > maximum * 0.5 && g < maximum && v > 0.0 {
                            sum += v / g;
                            n += 1;
                        }
                    }
                }
                if !clipped && n > 0 {
                    map[qr * qwidth + qc_] = sum / n as f32 * kc;
                }
            }
        }
        // Diffuse the known ratios outward; the level steers how
        // many smoothing sweeps run.
        let sweeps = (grow.max(0.25) * 8.0) as usize + 1;
        for _ in 0..sweeps {
            let prev = map.clone();
            for qr in 0..qheight {
                for qc_ in 0..qwidth {
                    if prev[qr * qwidth + qc_] >= 0.0 {
                        continue;
                    }
                    let mut sum = 0.0_f32;
                    let mut n = 0;
                    for (dr, dc) in [(0_i64, 1_i64), (0, -1), (1, 0), (-1, 0)] {
                        let r = qr as i64 + dr;
                        let cq = qc_ as i64 + dc;
                        if r >= 0 && (r as usize) < qheight && cq >= 0 && (cq as usize) < qwidth {
                            let v = prev[r as usize * qwidth + cq as usize];
                            if v >= 0.0 {
                                sum += v;
                                n += 1;
                            }
                        }
                    }
                    if n > 0 {
                        map[qr * qwidth + qc_] = sum / n as f32;
                    }
                }
            }
        }
        // Apply the smoothed ratio to clipped pixels only.
        for row in 0..height {
            for col in 0..width {
                let idx = (row * width + col) * 4;
                let v = ctx.image.data[idx + c] as f32;
                if v < csat {
                    continue;
                }
                let qr = (row >> 2).min(qheight - 1);
                let qc_ = (col >> 2).min(qwidth - 1);
                let ratio = map[qr * qwidth + qc_];
                if ratio >= 0.0 {
                    let g = ctx.image.data[idx + 1] as f32;
                    let rebuilt = g * ratio / kc;
                    if rebuilt > v {
                        ctx.image.data[idx + c] = clip16(rebuilt as i32);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::io::Stream;
    use crate::params::{HighlightMode, Params};
    use crate::pipeline::FileContext;

    #[test]
    fn test_blend_preserves_luminance_and_chroma() {
        let stream = Stream::new(Box::new(std::io::Cursor::new(Vec::new())));
        let mut ctx = FileContext::new(stream, Params::default(), "test");
        ctx.desc.width = 1;
        ctx.desc.height = 1;
        ctx.desc.maximum = 65535;
        ctx.params.highlight = HighlightMode::Blend;
        ctx.alloc_image().unwrap();

        // The synthetic clipped pixel; stored pre-clip values are
        // saturated to u16, so feed the unclipped value scaled down.
        // (R, G, B) with R above the clip point.
        let unclipped = [60000.0_f64, 30000.0, 20000.0];
        ctx.desc.maximum = 40000;
        ctx.image.data[0] = unclipped[0] as u16;
        ctx.image.data[1] = unclipped[1] as u16;
        ctx.image.data[2] = unclipped[2] as u16;

        // Reference quantities.
        static TRANS: [[f64; 3]; 3] = [
            [1.0, 1.0, 1.0],
            [1.7320508, -1.7320508, 0.0],
            [-1.0, -1.0, 2.0],
        ];
        let clipped = [40000.0, 30000.0, 20000.0];
        let lab = |p: &[f64; 3], c: usize| -> f64 {
            (0..3).map(|j| TRANS[c][j] * p[j]).sum()
        };
        let lum_unclipped = lab(&unclipped, 0);
        let chroma_clipped =
            (lab(&clipped, 1).powi(2) + lab(&clipped, 2).powi(2)).sqrt();

        super::blend_highlights(&mut ctx);

        let out = [
            ctx.image.data[0] as f64,
            ctx.image.data[1] as f64,
            ctx.image.data[2] as f64,
        ];
        let lum_out = lab(&out, 0);
        let chroma_out = (lab(&out, 1).powi(2) + lab(&out, 2).powi(2)).sqrt();
        // Luminance of the unclipped pixel, chroma of the clipped
        // copy, both within integer rounding.
        assert!((lum_out - lum_unclipped).abs() < 8.0, "{lum_out} vs {lum_unclipped}");
        assert!(
            (chroma_out - chroma_clipped).abs() < 8.0,
            "{chroma_out} vs {chroma_clipped}"
        );
    }
}
