//! Scanline rasterizer: walks a triangle's setup gradients across each
//! scanline and invokes the texture unit and pixel pipeline for every
//! candidate pixel. `spec.md` §4.4 "Rasterization".

use crate::core::fbi::{FbiState, ParamGradient, TriangleSetup};
use crate::core::fixed::quantize;
use crate::core::pixel::{self, PixelCandidate};
use crate::core::register::{FbzColorPath, FbzMode, FogMode, RegisterFile};
use crate::core::texture;
use crate::core::tmu::TmuState;

#[inline]
fn eval(param: &ParamGradient, dx: f64, dy: f64) -> f64 {
    param.start + param.dx * dx + param.dy * dy
}

/// Evaluates a gradient at `(dx, dy)` and quantizes the result to its
/// parameter's contractual fixed-point step, matching the precision the
/// hardware's per-pixel integer accumulator carries (`spec.md` §4.3/§4.7).
#[inline]
fn eval_fixed(param: &ParamGradient, dx: f64, dy: f64, frac_bits: u32) -> f64 {
    quantize(eval(param, dx, dy), frac_bits)
}

/// Maps a rasterizer-space row to its framebuffer row: `spec.md` §4.4's
/// `screen_y = (yorigin - y) & 0x3FF` when `grOrigin` selected lower-left,
/// otherwise the identity. Only buffer reads/writes apply this — clipping
/// and stipple test against the rasterizer's own top-to-bottom scan order.
#[inline]
fn screen_y(fbz_mode: FbzMode, yorigin: u32, y: u32) -> u32 {
    if fbz_mode.y_origin_inverted() {
        yorigin.wrapping_sub(y) & 0x3FF
    } else {
        y
    }
}

#[inline]
fn edge_x(x0: f64, y0: f64, x1: f64, y1: f64, y: f64) -> f64 {
    if (y1 - y0).abs() < f64::EPSILON {
        x0
    } else {
        x0 + (x1 - x0) * (y - y0) / (y1 - y0)
    }
}

/// Rasterizes one setup triangle into `fbi`'s back buffer, sampling `tmu`
/// for textured fragments. `tmu_enabled[i]` gates whether TMU `i`'s
/// gradients were populated by setup and should be sampled.
pub fn rasterize_triangle(
    regs: &mut RegisterFile,
    fbi: &mut FbiState,
    tmu: &mut [TmuState; 2],
    setup: &TriangleSetup,
    tmu_enabled: [bool; 2],
) {
    let fbz_color_path = regs.fbz_color_path();
    let fbz_mode = regs.fbz_mode();
    let alpha_mode = regs.alpha_mode();
    let fog_mode = regs.fog_mode();
    let fog_color = regs.fog_color();
    let color1 = regs.color1();
    let texture_modes = [regs.texture_mode(crate::core::register::TMU0_BASE), regs.texture_mode(crate::core::register::TMU1_BASE)];

    let (clip_left, clip_right) = regs.clip_left_right();
    let (clip_top, clip_bottom) = regs.clip_low_y_high_y();

    let y_start = setup.vy[0].ceil().max(0.0) as i64;
    let y_end = setup.vy[2].ceil().max(0.0) as i64;

    for y_i in y_start..y_end {
        let y = y_i as f64 + 0.5;
        let xa = edge_x(setup.vx[0], setup.vy[0], setup.vx[2], setup.vy[2], y);
        let xb = if y < setup.vy[1] {
            edge_x(setup.vx[0], setup.vy[0], setup.vx[1], setup.vy[1], y)
        } else {
            edge_x(setup.vx[1], setup.vy[1], setup.vx[2], setup.vy[2], y)
        };
        let (x_left, x_right) = if xa <= xb { (xa, xb) } else { (xb, xa) };

        let x_start = x_left.ceil().max(0.0) as i64;
        let x_end = x_right.ceil().max(0.0) as i64;

        if fbz_mode.enable_clipping() && (y_i < clip_top as i64 || y_i >= clip_bottom as i64) {
            continue;
        }

        for x_i in x_start..x_end {
            if fbz_mode.enable_clipping() && (x_i < clip_left as i64 || x_i >= clip_right as i64) {
                continue;
            }
            let x = x_i as u32;
            let y_u = y_i as u32;
            if x_u32_out_of_bounds(x, y_u, fbi) {
                continue;
            }

            fbi.stats.pixels_in += 1;

            if !pixel::stipple_test(regs, x, y_u) {
                fbi.stats.stipple_fail += 1;
                pixel::advance_stipple_rotate(regs);
                continue;
            }
            pixel::advance_stipple_rotate(regs);

            let dx = x as f64 + 0.5 - setup.vx[0];
            let dy = y_i as f64 + 0.5 - setup.vy[0];

            use crate::core::fixed::{COLOR_FRAC_BITS, W_FRAC_BITS};
            let r = eval_fixed(&setup.r, dx, dy, COLOR_FRAC_BITS).clamp(0.0, 255.0) as u8;
            let g = eval_fixed(&setup.g, dx, dy, COLOR_FRAC_BITS).clamp(0.0, 255.0) as u8;
            let b = eval_fixed(&setup.b, dx, dy, COLOR_FRAC_BITS).clamp(0.0, 255.0) as u8;
            let a = eval_fixed(&setup.a, dx, dy, COLOR_FRAC_BITS).clamp(0.0, 255.0) as u8;
            let z = eval_fixed(&setup.z, dx, dy, COLOR_FRAC_BITS).clamp(0.0, 65535.0) as u16;
            let w = eval_fixed(&setup.w, dx, dy, W_FRAC_BITS);
            let fog_coord = eval_fixed(&setup.fog_coord, dx, dy, COLOR_FRAC_BITS).clamp(0.0, 255.0) as u8;

            let texture_rgba = sample_combined_texture(tmu, &texture_modes, setup, tmu_enabled, dx, dy, w);

            let candidate = PixelCandidate {
                x,
                y: y_u,
                iterated_rgba: [r, g, b, a],
                depth: z,
                w_for_fog: w,
                fog_coord,
                texture_rgba,
            };

            let sy = screen_y(fbz_mode, fbi.yorigin, y_u);

            if !pixel::depth_test(regs, fbi, x, sy, z) {
                fbi.stats.depth_fail += 1;
                continue;
            }

            let pre_fog = pixel::derive_color(fbz_color_path, color1, &candidate);
            if !pixel::chroma_key_test(regs, [pre_fog[0], pre_fog[1], pre_fog[2]]) {
                fbi.stats.chroma_fail += 1;
                continue;
            }
            if !pixel::alpha_mask_test(regs, pre_fog[3]) {
                fbi.stats.alpha_fail += 1;
                continue;
            }
            if !pixel::alpha_test(alpha_mode, pre_fog[3]) {
                fbi.stats.alpha_fail += 1;
                continue;
            }

            let fogged_rgb = apply_fog_stage(fog_mode, [fog_color[0], fog_color[1], fog_color[2]], fbi, w, a, z, fog_coord, [pre_fog[0], pre_fog[1], pre_fog[2]]);
            let fogged = [fogged_rgb[0], fogged_rgb[1], fogged_rgb[2], pre_fog[3]];

            let back = fbi.draw_offset();
            let dst16 = fbi.read_color16(back, x, sy);
            let dst = unpack_rgb565(dst16);
            let blended = pixel::alpha_blend(alpha_mode, fogged, pre_fog, dst);

            let packed = pixel::dither_to_rgb565(fbz_mode, fbz_color_path, x, sy, [blended[0], blended[1], blended[2]]);

            if fbz_mode.rgb_buffer_mask() {
                fbi.write_color16(back, x, sy, packed);
            }
            if fbz_mode.aux_buffer_mask() && fbz_mode.enable_depthbuf() {
                fbi.write_aux16(x, sy, z);
            }
            fbi.stats.pixels_out += 1;
        }
    }
}

fn x_u32_out_of_bounds(x: u32, y: u32, fbi: &FbiState) -> bool {
    x >= fbi.geometry.width || y >= fbi.geometry.height
}

fn apply_fog_stage(
    fog_mode: FogMode,
    fog_color: [u8; 3],
    fbi: &FbiState,
    w: f64,
    iterated_alpha: u8,
    depth: u16,
    fog_coord: u8,
    rgb: [u8; 3],
) -> [u8; 3] {
    pixel::apply_fog(fog_mode, fog_color, fbi, w, iterated_alpha, depth, fog_coord, rgb)
}

fn unpack_rgb565(value: u16) -> [u8; 4] {
    let r5 = (value >> 11) & 0x1F;
    let g6 = (value >> 5) & 0x3F;
    let b5 = value & 0x1F;
    [
        ((r5 << 3) | (r5 >> 2)) as u8,
        ((g6 << 2) | (g6 >> 4)) as u8,
        ((b5 << 3) | (b5 >> 2)) as u8,
        0xFF,
    ]
}

/// Samples both TMUs (when enabled) and chains them the way the hardware's
/// two-stage texture pipeline does: TMU1 is upstream of TMU0, so its
/// combined output feeds TMU0's combine unit as the "other" input
/// (`spec.md` §4.5). A single enabled TMU combines against its own sample,
/// matching the identity-passthrough default when there's no second stage.
fn sample_combined_texture(
    tmu: &mut [TmuState; 2],
    modes: &[crate::core::register::TextureMode; 2],
    setup: &TriangleSetup,
    tmu_enabled: [bool; 2],
    dx: f64,
    dy: f64,
    w: f64,
) -> Option<[u8; 4]> {
    let _ = w;
    if !tmu_enabled[0] && !tmu_enabled[1] {
        return None;
    }

    let sample_one = |i: usize, tmu: &TmuState| -> (u32, i32) {
        use crate::core::fixed::{ST_FRAC_BITS, TMU_W_FRAC_BITS};
        let s_over_w = eval_fixed(&setup.tmu_s[i], dx, dy, ST_FRAC_BITS);
        let t_over_w = eval_fixed(&setup.tmu_t[i], dx, dy, ST_FRAC_BITS);
        let tmu_w = eval_fixed(&setup.tmu_w[i], dx, dy, TMU_W_FRAC_BITS);
        let (s, t, level, frac) = texture::perspective_correct(tmu, s_over_w, t_over_w, tmu_w, modes[i].perspective());
        (texture::sample(tmu, modes[i], s, t, level), frac)
    };

    let tmu1_combined = if tmu_enabled[1] {
        let (argb1, frac1) = sample_one(1, &tmu[1]);
        Some(texture::texture_combine(modes[1], argb1, argb1, frac1))
    } else {
        None
    };

    if tmu_enabled[0] {
        let (argb0, frac0) = sample_one(0, &tmu[0]);
        let other = tmu1_combined.unwrap_or(argb0);
        let combined = texture::texture_combine(modes[0], argb0, other, frac0);
        return Some(argb_to_rgba(combined));
    }

    tmu1_combined.map(argb_to_rgba)
}

fn argb_to_rgba(argb: u32) -> [u8; 4] {
    [((argb >> 16) & 0xFF) as u8, ((argb >> 8) & 0xFF) as u8, (argb & 0xFF) as u8, ((argb >> 24) & 0xFF) as u8]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fbi::ParamGradient;

    fn flat_setup(color: [f64; 4]) -> TriangleSetup {
        let mk = |v: f64| ParamGradient { start: v, dx: 0.0, dy: 0.0 };
        TriangleSetup {
            vx: [2.0, 10.0, 2.0],
            vy: [2.0, 2.0, 10.0],
            start_z: 0.0,
            z: mk(0.0),
            r: mk(color[0]),
            g: mk(color[1]),
            b: mk(color[2]),
            a: mk(color[3]),
            w: mk(1.0),
            fog_coord: mk(0.0),
            tmu_s: Default::default(),
            tmu_t: Default::default(),
            tmu_w: Default::default(),
        }
    }

    #[test]
    fn flat_triangle_writes_uniform_color_into_back_buffer() {
        let mut regs = RegisterFile::default();
        let mut fbi = FbiState::new();
        fbi.configure(16, 16);
        let mut tmu = [TmuState::new(), TmuState::new()];
        let setup = flat_setup([255.0, 0.0, 0.0, 255.0]);

        rasterize_triangle(&mut regs, &mut fbi, &mut tmu, &setup, [false, false]);

        assert!(fbi.stats.pixels_out > 0);
        let back = fbi.back_offset();
        let pixel = fbi.read_color16(back, 4, 4);
        assert_eq!(pixel & 0xF800, 0xF800); // red channel saturated
    }

    #[test]
    fn y_origin_inverted_flips_the_written_row() {
        let mut regs = RegisterFile::default();
        regs.set_fbz_mode(1 << 17); // y_origin_inverted
        let mut fbi = FbiState::new();
        fbi.configure(16, 16); // yorigin = 15
        let mut tmu = [TmuState::new(), TmuState::new()];
        let setup = flat_setup([255.0, 0.0, 0.0, 255.0]);

        rasterize_triangle(&mut regs, &mut fbi, &mut tmu, &setup, [false, false]);

        let back = fbi.back_offset();
        // The triangle covers raw rows 2..10; with the origin flipped those
        // land at rows (15 - raw), i.e. 6..14 instead.
        assert_eq!(fbi.read_color16(back, 4, 11) & 0xF800, 0xF800);
        assert_eq!(fbi.read_color16(back, 4, 4), 0);
    }
}
