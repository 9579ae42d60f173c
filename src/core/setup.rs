//! Triangle setup: converts three application-space vertices into the
//! gradients the rasterizer walks. `spec.md` §4.3 "Triangle setup".

use crate::core::fbi::{ParamGradient, TriangleSetup};
use crate::core::fixed::{gradient, quantize, COLOR_FRAC_BITS, ST_FRAC_BITS, TMU_W_FRAC_BITS, VERTEX_FRAC_BITS, W_FRAC_BITS};
use crate::core::register::FbzColorPath;

/// One input vertex, already in the default packed layout or remapped
/// through a vertex-layout table (`api::vertex`).
#[derive(Debug, Clone, Copy, Default)]
pub struct InputVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
    pub oow: f32,
    pub tmu_s: [f32; 2],
    pub tmu_t: [f32; 2],
    pub tmu_w: [f32; 2],
    pub fog_coord: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    Disabled,
    Positive,
    Negative,
}

/// Returns `None` when the triangle is degenerate or culled by `cull_mode`.
/// Signed area follows `spec.md` §4.3: positive area is front-facing in
/// screen space (Y increasing downward).
pub fn setup_triangle(
    vertices: &[InputVertex; 3],
    cull_mode: CullMode,
    fbz_color_path: FbzColorPath,
    tmu_enabled: [bool; 2],
) -> Option<TriangleSetup> {
    // Sort by Y ascending; ties broken by X, matching the rasterizer's
    // top-to-bottom, left-to-right scan order.
    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| {
        vertices[i]
            .y
            .partial_cmp(&vertices[j].y)
            .unwrap()
            .then(vertices[i].x.partial_cmp(&vertices[j].x).unwrap())
    });
    let a = vertices[order[0]];
    let b = vertices[order[1]];
    let c = vertices[order[2]];

    let bx_ax = (b.x - a.x) as f64;
    let by_ay = (b.y - a.y) as f64;
    let cx_ax = (c.x - a.x) as f64;
    let cy_ay = (c.y - a.y) as f64;
    let area2 = bx_ax * cy_ay - cx_ax * by_ay;

    if area2 == 0.0 {
        return None;
    }
    match cull_mode {
        CullMode::Disabled => {}
        CullMode::Positive if area2 > 0.0 => return None,
        CullMode::Negative if area2 < 0.0 => return None,
        _ => {}
    }

    // Quantizes each vertex value to its parameter's contractual fixed-point
    // step before taking the gradient, then quantizes the resulting dx/dy
    // the same way, matching the hardware's integer setup datapath
    // (`spec.md` §4.3/§4.7).
    let mk = |pa: f64, pb: f64, pc: f64, frac_bits: u32| -> ParamGradient {
        let pa = quantize(pa, frac_bits);
        let pb = quantize(pb, frac_bits);
        let pc = quantize(pc, frac_bits);
        let (dx, dy) = gradient(pa, pb, pc, bx_ax, by_ay, cx_ax, cy_ay, area2);
        ParamGradient { start: pa, dx: quantize(dx, frac_bits), dy: quantize(dy, frac_bits) }
    };

    let vertex_scale = (1i64 << VERTEX_FRAC_BITS) as f64;
    let mut setup = TriangleSetup {
        vx: [
            (a.x as f64 * vertex_scale).round() / vertex_scale,
            (b.x as f64 * vertex_scale).round() / vertex_scale,
            (c.x as f64 * vertex_scale).round() / vertex_scale,
        ],
        vy: [
            (a.y as f64 * vertex_scale).round() / vertex_scale,
            (b.y as f64 * vertex_scale).round() / vertex_scale,
            (c.y as f64 * vertex_scale).round() / vertex_scale,
        ],
        start_z: a.z as f64,
        z: mk(a.z as f64, b.z as f64, c.z as f64, COLOR_FRAC_BITS),
        r: mk(a.r as f64, b.r as f64, c.r as f64, COLOR_FRAC_BITS),
        g: mk(a.g as f64, b.g as f64, c.g as f64, COLOR_FRAC_BITS),
        b: mk(a.b as f64, b.b as f64, c.b as f64, COLOR_FRAC_BITS),
        a: mk(a.a as f64, b.a as f64, c.a as f64, COLOR_FRAC_BITS),
        w: mk(a.oow as f64, b.oow as f64, c.oow as f64, W_FRAC_BITS),
        fog_coord: mk(a.fog_coord as f64, b.fog_coord as f64, c.fog_coord as f64, COLOR_FRAC_BITS),
        tmu_s: Default::default(),
        tmu_t: Default::default(),
        tmu_w: Default::default(),
    };

    let _ = fbz_color_path;
    for tmu in 0..2 {
        if tmu_enabled[tmu] {
            setup.tmu_s[tmu] = mk(a.tmu_s[tmu] as f64, b.tmu_s[tmu] as f64, c.tmu_s[tmu] as f64, ST_FRAC_BITS);
            setup.tmu_t[tmu] = mk(a.tmu_t[tmu] as f64, b.tmu_t[tmu] as f64, c.tmu_t[tmu] as f64, ST_FRAC_BITS);
            setup.tmu_w[tmu] = mk(a.tmu_w[tmu] as f64, b.tmu_w[tmu] as f64, c.tmu_w[tmu] as f64, TMU_W_FRAC_BITS);
        }
    }

    Some(setup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::register::FbzColorPath;

    fn tri(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> [InputVertex; 3] {
        let mk = |(x, y): (f32, f32)| InputVertex { x, y, oow: 1.0, ..Default::default() };
        [mk(a), mk(b), mk(c)]
    }

    #[test]
    fn degenerate_triangle_is_rejected() {
        let v = tri((0.0, 0.0), (10.0, 0.0), (20.0, 0.0));
        let result = setup_triangle(&v, CullMode::Disabled, FbzColorPath(0), [false, false]);
        assert!(result.is_none());
    }

    #[test]
    fn cull_mode_rejects_matching_winding() {
        let v = tri((0.0, 0.0), (10.0, 0.0), (0.0, 10.0));
        let positive = setup_triangle(&v, CullMode::Positive, FbzColorPath(0), [false, false]);
        let negative = setup_triangle(&v, CullMode::Negative, FbzColorPath(0), [false, false]);
        assert!(positive.is_none() != negative.is_none());
    }

    #[test]
    fn constant_color_triangle_has_zero_gradient() {
        let mut v = tri((0.0, 0.0), (10.0, 0.0), (0.0, 10.0));
        for vert in v.iter_mut() {
            vert.r = 1.0;
        }
        let setup = setup_triangle(&v, CullMode::Disabled, FbzColorPath(0), [false, false]).unwrap();
        assert_eq!(setup.r.dx, 0.0);
        assert_eq!(setup.r.dy, 0.0);
    }
}
