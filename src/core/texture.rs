//! Texture unit: perspective-correct S/T, LOD selection, format decode and
//! point/bilinear filtering. `spec.md` §4.5 "Texture mapping".

use crate::core::fixed::{clamp_to_uint8, LOD_FRAC_BITS};
use crate::core::lut::{decode_ai88, decode_table_texel, fast_reciplog, TableFormat, RECIP_OUTPUT_PREC};
use crate::core::register::{TextureBlendFactor, TextureCombine, TextureFormat, TextureMode};
use crate::core::tmu::TmuState;

/// Perspective-divides iterated S/T/W and picks a mipmap level. Returns
/// `(s, t, level, lod_frac)`: `s`/`t` in texel space, `level` the selected
/// mipmap, `lod_frac` the LOD's fractional part for trilinear/dither use.
/// `spec.md` §4.5 "Perspective correction".
pub fn perspective_correct(tmu: &TmuState, s_over_w: f64, t_over_w: f64, w: f64, perspective: bool) -> (f64, f64, u32, i32) {
    let (s, t) = if perspective && w > 0.0 {
        let w_fixed = ((w * (1u64 << 30) as f64) as u32).max(1);
        let (recip, _) = fast_reciplog(w_fixed);
        let inv_w = recip as f64 / (1i64 << RECIP_OUTPUT_PREC) as f64;
        (s_over_w * inv_w, t_over_w * inv_w)
    } else {
        (s_over_w, t_over_w)
    };

    let (level, lod_frac) = select_lod(tmu, w, perspective);
    (s, t, level, lod_frac)
}

fn select_lod(tmu: &TmuState, w: f64, perspective: bool) -> (u32, i32) {
    // log2(w) grows as the surface recedes (w shrinks toward 0 for points
    // far from the eye under this convention), matching LOD increasing
    // with distance.
    let raw_lod = if perspective && w > 0.0 {
        let w_fixed = (w * (1u64 << 30) as f64).max(1.0) as u32;
        let (_, log2w) = fast_reciplog(w_fixed);
        log2w
    } else {
        0
    };
    let lod = raw_lod + tmu.lodbias;
    let clamped = lod.clamp(tmu.lodmin, tmu.lodmax);
    let level = (clamped >> LOD_FRAC_BITS).clamp(0, 7) as u32;
    let frac = clamped & ((1 << LOD_FRAC_BITS) - 1);
    (level, frac)
}

/// Byte offset and wrap masks for one mipmap level (already halved per
/// `TmuState::mask_for_level`).
fn level_geometry(tmu: &TmuState, level: u32) -> (usize, u32, u32) {
    let (wmask, hmask) = tmu.mask_for_level(level);
    (tmu.lod_offset[level as usize] as usize, wmask, hmask)
}

fn fetch_texel(tmu: &TmuState, mode: TextureMode, offset: usize, wmask: u32, hmask: u32, s_int: u32, t_int: u32) -> u32 {
    let format = mode.format();
    let x = s_int & wmask;
    let y = t_int & hmask;
    let row_texels = wmask + 1;
    let texel_index = (y * row_texels + x) as usize;

    match format {
        TextureFormat::Palette8 => {
            let idx = tmu.read_texel8(offset + texel_index) as usize;
            tmu.palette[idx]
        }
        TextureFormat::AlphaPalette88 => {
            let raw = tmu.read_texel16(offset + texel_index * 2);
            let idx = (raw & 0xFF) as usize;
            let alpha = (raw >> 8) & 0xFF;
            (tmu.palette[idx] & 0x00FF_FFFF) | ((alpha as u32) << 24)
        }
        TextureFormat::Ai88 => decode_ai88(tmu.read_texel16(offset + texel_index * 2) as u32),
        TextureFormat::Yiq422 | TextureFormat::Ayiq8422 => 0,
        TextureFormat::Argb8332 => {
            let raw = tmu.read_texel16(offset + texel_index * 2);
            let alpha = (raw >> 8) & 0xFF;
            (decode_table_texel(TableFormat::Rgb332, (raw & 0xFF) as u32) & 0x00FF_FFFF) | ((alpha as u32) << 24)
        }
        other => {
            let table_fmt = match other {
                TextureFormat::Rgb332 => TableFormat::Rgb332,
                TextureFormat::Alpha8 => TableFormat::Alpha8,
                TextureFormat::Intensity8 => TableFormat::Intensity8,
                TextureFormat::Ai44 => TableFormat::Ai44,
                TextureFormat::Rgb565 => TableFormat::Rgb565,
                TextureFormat::Argb1555 => TableFormat::Argb1555,
                TextureFormat::Argb4444 => TableFormat::Argb4444,
                _ => unreachable!(),
            };
            let raw = if format.bytes_per_texel() == 1 {
                tmu.read_texel8(offset + texel_index) as u32
            } else {
                tmu.read_texel16(offset + texel_index * 2) as u32
            };
            decode_table_texel(table_fmt, raw)
        }
    }
}

fn lerp_channel(a: u32, b: u32, frac: u32) -> u32 {
    (a as i64 + (((b as i64 - a as i64) * frac as i64) >> 8)).clamp(0, 0xFF) as u32
}

fn lerp_argb(a: u32, b: u32, frac: u32) -> u32 {
    let mut out = 0u32;
    for shift in [24, 16, 8, 0] {
        let ca = (a >> shift) & 0xFF;
        let cb = (b >> shift) & 0xFF;
        out |= lerp_channel(ca, cb, frac) << shift;
    }
    out
}

/// Samples `tmu` at normalized texel coordinates `s`,`t` (integer part is
/// the texel index), applying point or bilinear filtering per `mode`.
/// Returns ARGB32 (`0xAARRGGBB`).
pub fn sample(tmu: &TmuState, mode: TextureMode, s: f64, t: f64, level: u32) -> u32 {
    let (offset, wmask, hmask) = level_geometry(tmu, level);

    if !mode.mag_filter_bilinear() {
        let s_int = ((s * 256.0) as i64 >> 8) as u32;
        let t_int = ((t * 256.0) as i64 >> 8) as u32;
        return fetch_texel(tmu, mode, offset, wmask, hmask, s_int, t_int);
    }

    // Bilinear filtering samples the four texels straddling the true
    // sample point, which sits half a texel (0x80 in 24.8 fixed point)
    // before the nearest integer index. `spec.md` §4.5.
    let s_fixed = (s * 256.0) as i64 - 0x80;
    let t_fixed = (t * 256.0) as i64 - 0x80;
    let s_int = (s_fixed >> 8) as u32;
    let t_int = (t_fixed >> 8) as u32;
    let s_frac = (s_fixed & 0xFF) as u32;
    let t_frac = (t_fixed & 0xFF) as u32;
    let c00 = fetch_texel(tmu, mode, offset, wmask, hmask, s_int, t_int);
    let c10 = fetch_texel(tmu, mode, offset, wmask, hmask, s_int.wrapping_add(1), t_int);
    let c01 = fetch_texel(tmu, mode, offset, wmask, hmask, s_int, t_int.wrapping_add(1));
    let c11 = fetch_texel(tmu, mode, offset, wmask, hmask, s_int.wrapping_add(1), t_int.wrapping_add(1));

    let top = lerp_argb(c00, c10, s_frac);
    let bottom = lerp_argb(c01, c11, s_frac);
    lerp_argb(top, bottom, t_frac)
}

fn combine_channel(local: u8, other: u8, combine: TextureCombine, a_local: u8, a_other: u8, factor: u8) -> u8 {
    let base = if combine.zero_other() {
        0i32
    } else if combine.sub_c_local() {
        other as i32 - local as i32
    } else {
        other as i32
    };
    let factor = if combine.reverse_blend() { 0xFF - factor } else { factor };
    let scaled = (base * factor as i32) / 255;
    let add = if combine.add_c_local() {
        local as i32
    } else if combine.add_a_local() {
        a_local as i32
    } else {
        0
    };
    let _ = a_other;
    let out = clamp_to_uint8(scaled + add);
    if combine.invert_output() {
        0xFF - out
    } else {
        out
    }
}

fn blend_factor_for(combine: TextureCombine, a_local: u8, a_other: u8, lod_frac: i32) -> u8 {
    match combine.blend_factor() {
        TextureBlendFactor::Zero => 0,
        TextureBlendFactor::CLocal => 0xFF, // per-channel c_local is folded in at the caller
        TextureBlendFactor::AOther => a_other,
        TextureBlendFactor::ALocal => a_local,
        TextureBlendFactor::LodDetail => clamp_to_uint8(0xFF - ((lod_frac << (8 - LOD_FRAC_BITS)) & 0xFF)),
        TextureBlendFactor::LodFraction => clamp_to_uint8((lod_frac << (8 - LOD_FRAC_BITS)) & 0xFF),
        TextureBlendFactor::One => 0xFF,
    }
}

/// Applies the texture combine unit: `out = (zero_other ? 0 : other [- local]) *
/// blend_factor + {0, local, a_local}`, then optional output inversion, run
/// separately for RGB and alpha. `spec.md` §4.5 "Texture combine". With no
/// chained second TMU, `other` defaults to this TMU's own local sample,
/// matching the hardware's identity-passthrough default combine program.
pub fn texture_combine(mode: TextureMode, local: u32, other: u32, lod_frac: i32) -> u32 {
    let local_rgba = argb_to_channels(local);
    let other_rgba = argb_to_channels(other);
    let a_local = local_rgba[3];
    let a_other = other_rgba[3];

    let rgb_combine = mode.rgb_combine();
    let alpha_combine = mode.alpha_combine();

    // An all-zero combine field is the register reset value: no
    // `grTexCombine`-equivalent call has programmed this stage yet, so the
    // texture unit passes its own sample through unmodified (simple,
    // single-texture decal) rather than evaluating `zero*0 + 0`.
    let rgb_out = if rgb_combine.0 == 0 {
        [local_rgba[0], local_rgba[1], local_rgba[2]]
    } else {
        let rgb_factor = blend_factor_for(rgb_combine, a_local, a_other, lod_frac);
        let mut out = [0u8; 3];
        for i in 0..3 {
            let factor = if rgb_combine.blend_factor() == TextureBlendFactor::CLocal {
                local_rgba[i]
            } else {
                rgb_factor
            };
            out[i] = combine_channel(local_rgba[i], other_rgba[i], rgb_combine, a_local, a_other, factor);
        }
        out
    };

    let a_out = if alpha_combine.0 == 0 {
        a_local
    } else {
        let alpha_factor = blend_factor_for(alpha_combine, a_local, a_other, lod_frac);
        let a_factor = if alpha_combine.blend_factor() == TextureBlendFactor::CLocal {
            a_local
        } else {
            alpha_factor
        };
        combine_channel(a_local, a_other, alpha_combine, a_local, a_other, a_factor)
    };

    channels_to_argb([rgb_out[0], rgb_out[1], rgb_out[2], a_out])
}

fn argb_to_channels(argb: u32) -> [u8; 4] {
    [((argb >> 16) & 0xFF) as u8, ((argb >> 8) & 0xFF) as u8, (argb & 0xFF) as u8, ((argb >> 24) & 0xFF) as u8]
}

fn channels_to_argb(rgba: [u8; 4]) -> u32 {
    ((rgba[3] as u32) << 24) | ((rgba[0] as u32) << 16) | ((rgba[1] as u32) << 8) | rgba[2] as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::register::TextureMode;

    fn point_mode() -> TextureMode {
        TextureMode(0xA << 8) // format = Rgb565, no bilinear
    }

    fn bilinear_mode() -> TextureMode {
        TextureMode((0xA << 8) | (1 << 2)) // format = Rgb565, mag bilinear
    }

    #[test]
    fn bilinear_sample_at_texel_center_reads_that_texel_exactly() {
        let mut tmu = TmuState::new();
        tmu.set_base_size(1, 1); // 2x2
        tmu.ram[0..2].copy_from_slice(&0xF800u16.to_le_bytes()); // red at (0,0)
        tmu.ram[2..4].copy_from_slice(&0x001Fu16.to_le_bytes()); // blue at (1,0)
        // s=0.5 is the center of texel 0; with the half-texel bias the
        // fractional weight should land on exactly zero, reading texel 0
        // rather than a 50/50 blend with its neighbor.
        let argb = sample(&tmu, bilinear_mode(), 0.5, 0.5, 0);
        assert_eq!(argb & 0x00FFFFFF, 0x00FF0000);
    }

    #[test]
    fn point_sample_reads_exact_texel() {
        let mut tmu = TmuState::new();
        tmu.set_base_size(2, 2); // 4x4
        tmu.ram[0..2].copy_from_slice(&0xF800u16.to_le_bytes()); // pure red at (0,0)
        let argb = sample(&tmu, point_mode(), 0.0, 0.0, 0);
        assert_eq!(argb & 0x00FF0000, 0x00FF0000);
    }

    #[test]
    fn select_lod_clamps_to_configured_range() {
        let mut tmu = TmuState::new();
        tmu.lodmin = 2 << LOD_FRAC_BITS;
        tmu.lodmax = 4 << LOD_FRAC_BITS;
        let (level, _) = select_lod(&tmu, 1.0, false);
        assert_eq!(level, 2);
    }

    #[test]
    fn unconfigured_combine_passes_the_local_sample_through() {
        let mode = TextureMode(0xA << 8); // combine bits all zero
        let local = 0xFF112233;
        let out = texture_combine(mode, local, 0x00000000, 0);
        assert_eq!(out, local);
    }

    #[test]
    fn zero_other_with_add_local_color_is_a_decal() {
        // zero_other(bit0)=1, add_c_local(bit6)=1: out = 0*factor + c_local.
        let rgb_combine: u32 = 1 | (1 << 6);
        let mode = TextureMode((rgb_combine << 12) | (0xA << 8));
        let local = 0xFF804020;
        let out = texture_combine(mode, local, 0x00FFFFFF, 0);
        assert_eq!(out & 0x00FFFFFF, local & 0x00FFFFFF);
    }

    #[test]
    fn reverse_blend_inverts_the_blend_factor() {
        // m_select(bits2-4)=6(One), reverse_blend(bit5)=1 -> factor 0xFF-0xFF=0;
        // zero_other=0 so scaled = other*0 = 0; no add bits set -> out = 0.
        let rgb_combine: u32 = (6 << 2) | (1 << 5);
        let mode = TextureMode((rgb_combine << 12) | (0xA << 8));
        let out = texture_combine(mode, 0x00112233, 0x00AABBCC, 0);
        assert_eq!(out & 0x00FFFFFF, 0);
    }
}
