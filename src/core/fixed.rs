//! Fixed-point scales and saturating conversions shared by setup, the
//! rasterizer, the texture unit and the pixel pipeline.
//!
//! Every interpolated quantity in the pipeline is carried in one of a small
//! number of contractual fixed-point formats. Getting a scale wrong here
//! silently corrupts every downstream stage, so the constants are named
//! after the register-file documentation in `spec.md` §4.3 rather than
//! re-derived at each call site.

/// Screen-space vertex X/Y: 12 integer bits, 4 fractional bits.
pub const VERTEX_FRAC_BITS: u32 = 4;
/// Iterated R, G, B, A and Z: 12 integer bits, 12 fractional bits.
pub const COLOR_FRAC_BITS: u32 = 12;
/// Iterated 1/W: 16 integer bits, 32 fractional bits.
pub const W_FRAC_BITS: u32 = 32;
/// Iterated texture S/T: 14 integer bits, 18 fractional bits.
pub const ST_FRAC_BITS: u32 = 18;
/// Per-TMU iterated W: 2 integer bits, 30 fractional bits.
pub const TMU_W_FRAC_BITS: u32 = 30;
/// Internal LOD working precision (matches `fast_reciplog`'s LOG_OUTPUT_PREC).
pub const LOD_FRAC_BITS: u32 = 8;
/// `tLOD` register fields (lodmin/lodmax/lodbias) are stored in 4.2 fixed
/// point; scaling by this factor converts them to `LOD_FRAC_BITS` precision.
pub const LOD_REGISTER_TO_INTERNAL_SHIFT: u32 = LOD_FRAC_BITS - 2;

#[inline]
pub fn to_fixed(value: f32, frac_bits: u32) -> i64 {
    (value as f64 * (1i64 << frac_bits) as f64) as i64
}

/// Rounds `value` to the nearest representable step of a `frac_bits`
/// fixed-point format, without narrowing its storage type. Setup gradients
/// and per-pixel accumulation must land on the same steps the hardware's
/// integer datapath would, or two sides of an edge compare unequal at
/// boundaries where the float and fixed-point paths would otherwise agree.
#[inline]
pub fn quantize(value: f64, frac_bits: u32) -> f64 {
    let scale = (1i64 << frac_bits) as f64;
    (value * scale).round() / scale
}

#[inline]
pub fn clamp_to_uint16(value: i32) -> u16 {
    value.clamp(0, 0xFFFF) as u16
}

#[inline]
pub fn clamp_to_uint8(value: i32) -> u8 {
    value.clamp(0, 0xFF) as u8
}

/// The two clamp modes documented for `fbzColorPath.rgbzw_clamp`: wrapped
/// (low bits of a possibly out-of-range accumulator) vs. saturated.
#[inline]
pub fn rgbzw_clamp(value: i32, wrap_mode: bool) -> u8 {
    if wrap_mode {
        value as u8
    } else {
        clamp_to_uint8(value)
    }
}

/// Cramer's-rule gradient of a single interpolated parameter across a
/// triangle, given the parameter's value at each of the three vertices and
/// the (already area-scaled) edge deltas. `area2` is twice the signed
/// triangle area, matching the denominator used throughout §4.3.
#[inline]
pub fn gradient(
    p_a: f64,
    p_b: f64,
    p_c: f64,
    bx_ax: f64,
    by_ay: f64,
    cx_ax: f64,
    cy_ay: f64,
    area2: f64,
) -> (f64, f64) {
    // dP/dx and dP/dy solved from the two edge vectors via Cramer's rule.
    let pb_pa = p_b - p_a;
    let pc_pa = p_c - p_a;
    let dp_dx = (pb_pa * cy_ay - pc_pa * by_ay) / area2;
    let dp_dy = (pc_pa * bx_ax - pb_pa * cx_ax) / area2;
    (dp_dx, dp_dy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_round_trip_preserves_sign_and_magnitude() {
        let v = to_fixed(-3.5, COLOR_FRAC_BITS);
        assert_eq!(v, -(3i64 << COLOR_FRAC_BITS) - (1i64 << (COLOR_FRAC_BITS - 1)));
    }

    #[test]
    fn clamp_saturates_both_ends() {
        assert_eq!(clamp_to_uint8(-10), 0);
        assert_eq!(clamp_to_uint8(300), 255);
        assert_eq!(clamp_to_uint16(-1), 0);
        assert_eq!(clamp_to_uint16(70_000), 0xFFFF);
    }

    #[test]
    fn quantize_snaps_to_the_nearest_fixed_point_step() {
        let step = 1.0 / (1i64 << COLOR_FRAC_BITS) as f64;
        let v = quantize(1.0 + step * 0.3, COLOR_FRAC_BITS);
        assert_eq!(v, 1.0);
        let v = quantize(1.0 + step * 0.7, COLOR_FRAC_BITS);
        assert!((v - (1.0 + step)).abs() < 1e-12);
    }

    #[test]
    fn gradient_of_constant_parameter_is_zero() {
        let (dx, dy) = gradient(1.0, 1.0, 1.0, 10.0, 0.0, 0.0, 10.0, 100.0);
        assert_eq!(dx, 0.0);
        assert_eq!(dy, 0.0);
    }
}
