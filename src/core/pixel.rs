//! Per-pixel pipeline: the ordered stages a single candidate pixel passes
//! through between rasterization and the framebuffer write. `spec.md` §4.6
//! "Pixel pipeline", redesign flag #4 (small pure function per stage over
//! explicit state references, not a monolithic match).

use crate::core::fbi::FbiState;
use crate::core::fixed::{clamp_to_uint8, rgbzw_clamp};
use crate::core::lut::{dither_to_5bit, dither_to_5bit_2x2, dither_to_6bit, dither_to_6bit_2x2};
use crate::core::register::{AlphaMode, BlendFactor, ColorSource, FbzColorPath, FbzMode, FogMode, RegisterFile};

/// A candidate pixel after rasterization: screen position, interpolated
/// parameters, and (if texturing is enabled) the already-sampled and
/// already-combined TMU color for this fragment.
#[derive(Debug, Clone, Copy)]
pub struct PixelCandidate {
    pub x: u32,
    pub y: u32,
    pub iterated_rgba: [u8; 4],
    pub depth: u16,
    pub w_for_fog: f64,
    pub fog_coord: u8,
    pub texture_rgba: Option<[u8; 4]>,
}

/// Stipple test. `spec.md` §4.6 stage 1. Pattern mode indexes a 32-bit
/// stipple word by `(y & 3) * 8 + (~x & 7)`; rotate mode just tests bit 31
/// then rotates right by one (each pixel consumes one bit of the pattern).
pub fn stipple_test(regs: &RegisterFile, x: u32, y: u32) -> bool {
    let mode = regs.fbz_mode();
    if !mode.enable_stipple() {
        return true;
    }
    let pattern = regs.stipple();
    if mode.stipple_pattern_mode() {
        let bit = (y & 3) * 8 + (!x & 7);
        (pattern >> bit) & 1 != 0
    } else {
        pattern & 0x8000_0000 != 0
    }
}

/// Rotates the stipple pattern register after a rotate-mode stipple test
/// consumes its top bit. Only meaningful when `!mode.stipple_pattern_mode()`.
pub fn advance_stipple_rotate(regs: &mut RegisterFile) {
    let mode = regs.fbz_mode();
    if mode.stipple_pattern_mode() {
        return;
    }
    let pattern = regs.stipple();
    regs.set_stipple(pattern.rotate_left(1));
}

/// Depth test against the aux buffer. `spec.md` §4.6 stage 2.
pub fn depth_test(regs: &RegisterFile, fbi: &FbiState, x: u32, y: u32, depth: u16) -> bool {
    let mode = regs.fbz_mode();
    if !mode.enable_depthbuf() {
        return true;
    }
    let dst = fbi.read_aux16(x, y);
    mode.depth_function().passes(depth, dst)
}

/// Color derivation: selects between the iterated color and the texture
/// sample per `fbzColorPath`, per combine-unit RGB/alpha selects.
/// `spec.md` §4.6 stage 3, including the decal-compatibility rule (a
/// texture-selected RGB with no active texture falls back to iterated).
pub fn derive_color(fbz: FbzColorPath, color1: [u8; 4], pixel: &PixelCandidate) -> [u8; 4] {
    let texture = pixel.texture_rgba;

    let rgb_source = |select: ColorSource| -> [u8; 3] {
        match select {
            ColorSource::Iterated => [pixel.iterated_rgba[0], pixel.iterated_rgba[1], pixel.iterated_rgba[2]],
            ColorSource::Texture => {
                let t = texture.unwrap_or(pixel.iterated_rgba);
                [t[0], t[1], t[2]]
            }
            ColorSource::Color1 => [color1[0], color1[1], color1[2]],
            ColorSource::LfbOrTexture => {
                let t = texture.unwrap_or(pixel.iterated_rgba);
                [t[0], t[1], t[2]]
            }
        }
    };
    let a_source = |select: ColorSource| -> u8 {
        match select {
            ColorSource::Iterated => pixel.iterated_rgba[3],
            ColorSource::Texture => texture.map(|t| t[3]).unwrap_or(pixel.iterated_rgba[3]),
            ColorSource::Color1 => color1[3],
            ColorSource::LfbOrTexture => texture.map(|t| t[3]).unwrap_or(pixel.iterated_rgba[3]),
        }
    };

    let rgb = rgb_source(fbz.rgb_select());
    let mut a = a_source(fbz.a_select());

    // Texture modulation: when the RGB path selects texture and a texture
    // sample carries its own alpha, the combine unit can multiply texture
    // alpha into the output alpha (local alpha select == texture alpha).
    if fbz.local_alpha_select() == 1 {
        if let Some(t) = texture {
            a = ((a as u32 * t[3] as u32) / 255) as u8;
        }
    }

    [rgb[0], rgb[1], rgb[2], a]
}

/// Chroma key test: rejects the pixel if its RGB matches the configured key
/// within `chroma_range`. `spec.md` §4.6 stage 4.
pub fn chroma_key_test(regs: &RegisterFile, rgb: [u8; 3]) -> bool {
    let mode = regs.fbz_mode();
    if !mode.enable_chromakey() {
        return true;
    }
    let key = regs.chroma_key().to_le_bytes();
    let range = regs.chroma_range();
    let tolerance = [(range & 0xFF) as u8, ((range >> 8) & 0xFF) as u8, ((range >> 16) & 0xFF) as u8];
    for i in 0..3 {
        if (rgb[i] as i32 - key[i] as i32).unsigned_abs() > tolerance[i] as u32 {
            return true;
        }
    }
    false
}

/// Alpha-plane mask test: when enabled, only pixels with nonzero alpha are
/// kept. `spec.md` §4.6 stage 5.
pub fn alpha_mask_test(regs: &RegisterFile, alpha: u8) -> bool {
    let mode = regs.fbz_mode();
    !mode.enable_alpha_mask() || alpha != 0
}

/// Alpha test against the configured reference and comparison function.
/// `spec.md` §4.6 stage 6.
pub fn alpha_test(alpha_mode: AlphaMode, alpha: u8) -> bool {
    !alpha_mode.alpha_test_enable() || alpha_mode.alpha_function().passes(alpha, alpha_mode.alpha_reference())
}

/// Applies fog blend: `out = color * (1 - fog) + fog_color * fog`, with
/// `fog` resolved from the 64-entry blend/delta tables indexed by the
/// configured source (W table, iterated alpha, iterated Z, a dedicated
/// per-vertex fog coordinate, or a constant). `spec.md` §4.6 stage 7.
pub fn apply_fog(
    fog_mode: FogMode,
    fog_color: [u8; 3],
    fbi: &FbiState,
    w_for_fog: f64,
    iterated_alpha: u8,
    depth: u16,
    fog_coord: u8,
    rgb: [u8; 3],
) -> [u8; 3] {
    if !fog_mode.enable() {
        return rgb;
    }
    let fog_factor = if fog_mode.constant() {
        0xFFu8
    } else {
        use crate::core::register::FogSource;
        let table_index = match fog_mode.source() {
            FogSource::WTable => {
                let w_fixed = (w_for_fog.clamp(0.0, 1.0) * 63.0) as usize;
                w_fixed.min(63)
            }
            FogSource::IteratedAlpha => (iterated_alpha as usize) >> 2,
            FogSource::IteratedZ => (depth as usize) >> 10,
            FogSource::FogCoord => (fog_coord as usize) >> 2,
        };
        let blend = fbi.fog_blend[table_index];
        let delta = fbi.fog_delta[table_index];
        blend.wrapping_add(delta)
    };

    let mut out = [0u8; 3];
    for i in 0..3 {
        let src = rgb[i] as i32;
        let fog = fog_color[i] as i32;
        let blended = src + (((fog - src) * fog_factor as i32) >> 8);
        out[i] = clamp_to_uint8(blended);
    }
    out
}

fn blend_factor_value(factor: BlendFactor, src: [u8; 4], dst: [u8; 4], is_alpha_channel: bool, is_src_slot: bool) -> u8 {
    match factor {
        BlendFactor::Zero => 0,
        BlendFactor::One => 0xFF,
        BlendFactor::SrcAlpha => src[3],
        BlendFactor::OneMinusSrcAlpha => 0xFF - src[3],
        BlendFactor::DstAlpha => dst[3],
        BlendFactor::OneMinusDstAlpha => 0xFF - dst[3],
        BlendFactor::SrcColor => {
            if is_alpha_channel {
                src[3]
            } else {
                src[0]
            }
        }
        BlendFactor::OneMinusSrcColor => {
            if is_alpha_channel {
                0xFF - src[3]
            } else {
                0xFF - src[0]
            }
        }
        BlendFactor::DstColor => {
            if is_alpha_channel {
                dst[3]
            } else {
                dst[0]
            }
        }
        BlendFactor::OneMinusDstColor => {
            if is_alpha_channel {
                0xFF - dst[3]
            } else {
                0xFF - dst[0]
            }
        }
        BlendFactor::AlphaSaturateOrPrefog => {
            if is_src_slot {
                src[3].min(0xFF - dst[3])
            } else {
                // Destination-factor 15 reads the pre-fog source color; the
                // caller passes that pre-fog color in as `src` for this slot.
                src[0]
            }
        }
        BlendFactor::Reserved => 0xFF,
    }
}

/// Alpha blends `src` over `dst` using the four independently configured
/// factors. `spec.md` §4.6 stage 8; see `SPEC_FULL.md` §C.2 for the
/// factor-15 src/dst distinction.
pub fn alpha_blend(alpha_mode: AlphaMode, src: [u8; 4], pre_fog_src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    if !alpha_mode.alpha_blend_enable() {
        return src;
    }
    let src_rgb_factor = blend_factor_value(alpha_mode.src_rgb_factor(), src, dst, false, true);
    let dst_rgb_factor = blend_factor_value(alpha_mode.dst_rgb_factor(), pre_fog_src, dst, false, false);
    let src_a_factor = blend_factor_value(alpha_mode.src_alpha_factor(), src, dst, true, true);
    let dst_a_factor = blend_factor_value(alpha_mode.dst_alpha_factor(), pre_fog_src, dst, true, false);

    let blend_channel = |s: u8, d: u8, sf: u8, df: u8| -> u8 {
        let value = (s as i32 * sf as i32 + d as i32 * df as i32) / 255;
        clamp_to_uint8(value)
    };

    [
        blend_channel(src[0], dst[0], src_rgb_factor, dst_rgb_factor),
        blend_channel(src[1], dst[1], src_rgb_factor, dst_rgb_factor),
        blend_channel(src[2], dst[2], src_rgb_factor, dst_rgb_factor),
        blend_channel(src[3], dst[3], src_a_factor, dst_a_factor),
    ]
}

/// Ordered 4x4 dither to RGB565, honoring the wrap/saturate clamp mode bit.
/// `spec.md` §4.6 stage 9.
pub fn dither_to_rgb565(fbz_mode: FbzMode, fbz_color_path: FbzColorPath, x: u32, y: u32, rgb: [u8; 3]) -> u16 {
    let wrap = fbz_color_path.rgbzw_clamp();
    let (r, g, b) = if fbz_mode.enable_dithering() {
        if fbz_mode.dither_2x2() {
            (dither_to_5bit_2x2(y, rgb[0], x), dither_to_6bit_2x2(y, rgb[1], x), dither_to_5bit_2x2(y, rgb[2], x))
        } else {
            (dither_to_5bit(y, rgb[0], x), dither_to_6bit(y, rgb[1], x), dither_to_5bit(y, rgb[2], x))
        }
    } else {
        (
            rgbzw_clamp(rgb[0] as i32 >> 3, wrap) & 0x1F,
            rgbzw_clamp(rgb[1] as i32 >> 2, wrap) & 0x3F,
            rgbzw_clamp(rgb[2] as i32 >> 3, wrap) & 0x1F,
        )
    };
    ((r as u16) << 11) | ((g as u16) << 5) | b as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::register::{FbzColorPath, FbzMode};

    fn candidate() -> PixelCandidate {
        PixelCandidate {
            x: 0,
            y: 0,
            iterated_rgba: [255, 0, 0, 255],
            depth: 100,
            w_for_fog: 0.5,
            fog_coord: 0,
            texture_rgba: None,
        }
    }

    #[test]
    fn stipple_disabled_always_passes() {
        let regs = RegisterFile::default();
        assert!(stipple_test(&regs, 3, 3));
    }

    #[test]
    fn derive_color_falls_back_to_iterated_when_no_texture() {
        let fbz = FbzColorPath(0b01); // rgb select = Texture
        let out = derive_color(fbz, [0, 0, 0, 0], &candidate());
        assert_eq!(&out[0..3], &[255, 0, 0]);
    }

    #[test]
    fn alpha_test_always_passes_when_disabled() {
        assert!(alpha_test(AlphaMode(0), 0));
    }

    #[test]
    fn dither_to_rgb565_packs_into_sixteen_bits() {
        let value = dither_to_rgb565(FbzMode(0), FbzColorPath(0), 0, 0, [255, 255, 255]);
        assert_eq!(value, 0xFFFF);
    }

    #[test]
    fn fog_source_iterated_z_ignores_iterated_alpha_and_fog_coord() {
        let mut fbi = FbiState::new();
        fbi.configure(4, 4);
        for i in 0..64 {
            fbi.fog_blend[i] = (i * 4) as u8;
        }
        let fog_mode = FogMode(1 | (2 << 3)); // enable, source = IteratedZ
        let rgb = [0, 0, 0];
        let fog_color = [255, 255, 255];
        // depth >> 10 selects table index 32 regardless of iterated_alpha/fog_coord.
        let low_alpha = apply_fog(fog_mode, fog_color, &fbi, 0.0, 0, 32 << 10, 0, rgb);
        let high_alpha = apply_fog(fog_mode, fog_color, &fbi, 0.0, 255, 32 << 10, 255, rgb);
        assert_eq!(low_alpha, high_alpha);
    }

    #[test]
    fn fog_source_fog_coord_is_independent_of_depth() {
        let mut fbi = FbiState::new();
        fbi.configure(4, 4);
        fbi.fog_blend[10] = 0x80;
        fbi.fog_blend[20] = 0x10;
        let fog_mode = FogMode(1 | (3 << 3)); // enable, source = FogCoord
        let rgb = [0, 0, 0];
        let fog_color = [255, 255, 255];
        let near = apply_fog(fog_mode, fog_color, &fbi, 0.0, 0, 60000, 40, rgb); // fog_coord >> 2 = 10
        let far = apply_fog(fog_mode, fog_color, &fbi, 0.0, 0, 0, 80, rgb); // fog_coord >> 2 = 20
        assert_ne!(near, far);
    }

    #[test]
    fn alpha_blend_passthrough_when_disabled() {
        let src = [10, 20, 30, 40];
        let out = alpha_blend(AlphaMode(0), src, src, [1, 2, 3, 4]);
        assert_eq!(out, src);
    }
}
