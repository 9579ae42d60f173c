//! End-to-end scenarios driving the public `Context` API and inspecting the
//! framebuffer it produces. `spec.md` §8.

use glide3x::core::context::Context;
use glide3x::core::register::{AlphaFunction, DepthFunction};
use glide3x::core::setup::{CullMode, InputVertex};
use glide3x::core::tmu::TmuState;

fn rgb565_channels(value: u16) -> (u8, u8, u8) {
    let r5 = (value >> 11) & 0x1F;
    let g6 = (value >> 5) & 0x3F;
    let b5 = value & 0x1F;
    (((r5 << 3) | (r5 >> 2)) as u8, ((g6 << 2) | (g6 >> 4)) as u8, ((b5 << 3) | (b5 >> 2)) as u8)
}

fn opened(width: u32, height: u32) -> Context {
    let mut ctx = Context::new();
    ctx.open_window(width, height).expect("open_window should succeed for a nonzero size");
    ctx.regs.set_clip_left_right(0, width);
    ctx.regs.set_clip_low_y_high_y(0, height);
    ctx
}

fn vertex(x: f32, y: f32, r: f32, g: f32, b: f32, a: f32) -> InputVertex {
    InputVertex { x, y, z: 0.0, r, g, b, a, oow: 1.0, ..Default::default() }
}

/// S1: clearing the back buffer to opaque red produces a uniform red
/// framebuffer after swap.
#[test]
fn s1_clear_to_opaque_red_fills_the_buffer() {
    let mut ctx = opened(32, 32);
    let red565 = 0xF800u16;
    ctx.clear(red565, 0, true, true);
    ctx.swap_buffers();

    let front = ctx.fbi.front_offset();
    for (x, y) in [(0, 0), (16, 16), (31, 31)] {
        let (r, g, b) = rgb565_channels(ctx.fbi.read_color16(front, x, y));
        assert_eq!((r, g, b), (255, 0, 0));
    }
}

/// S2: an untextured flat-shaded triangle writes its iterated color into
/// every covered pixel and leaves pixels outside the triangle untouched.
#[test]
fn s2_untextured_flat_triangle_shades_only_covered_pixels() {
    let mut ctx = opened(64, 64);
    ctx.clear(0x0000, 0xFFFF, true, true);

    let vertices = [
        vertex(4.0, 4.0, 0.0, 255.0, 0.0, 255.0),
        vertex(40.0, 4.0, 0.0, 255.0, 0.0, 255.0),
        vertex(4.0, 40.0, 0.0, 255.0, 0.0, 255.0),
    ];
    ctx.draw_triangle(&vertices, CullMode::Disabled);

    let back = ctx.fbi.back_offset();
    let (r, g, b) = rgb565_channels(ctx.fbi.read_color16(back, 10, 10));
    assert_eq!((r, g, b), (0, 255, 0));
    let (r, g, b) = rgb565_channels(ctx.fbi.read_color16(back, 60, 60));
    assert_eq!((r, g, b), (0, 0, 0));
}

/// S3: a point-filtered textured quad (two triangles) round-trips a solid
/// texture color into the framebuffer.
#[test]
fn s3_point_filtered_texture_quad_round_trips_color() {
    let mut ctx = opened(32, 32);
    ctx.clear(0x0000, 0xFFFF, true, true);

    ctx.regs.set_color_combine(1, false, 3, 0, false); // other = texture, texture-enable derived
    ctx.regs.set_texture_mode(glide3x::core::register::TMU0_BASE, 0xA << 8); // Rgb565, point sample
    ctx.tmu[0].set_base_size(1, 1); // 2x2 texture
    let blue: u16 = 0x001F;
    for texel in 0..4 {
        let off = texel * 2;
        ctx.tmu[0].ram[off..off + 2].copy_from_slice(&blue.to_le_bytes());
    }

    let mk = |x: f32, y: f32, s: f32, t: f32| InputVertex {
        x,
        y,
        z: 0.0,
        r: 255.0,
        g: 255.0,
        b: 255.0,
        a: 255.0,
        oow: 1.0,
        tmu_s: [s, 0.0],
        tmu_t: [t, 0.0],
        tmu_w: [1.0, 1.0],
        fog_coord: 0.0,
    };
    let quad = [mk(4.0, 4.0, 0.0, 0.0), mk(20.0, 4.0, 1.0, 0.0), mk(4.0, 20.0, 0.0, 1.0), mk(20.0, 20.0, 1.0, 1.0)];
    ctx.draw_triangle(&[quad[0], quad[1], quad[2]], CullMode::Disabled);
    ctx.draw_triangle(&[quad[1], quad[3], quad[2]], CullMode::Disabled);

    let back = ctx.fbi.back_offset();
    let (r, g, b) = rgb565_channels(ctx.fbi.read_color16(back, 10, 10));
    assert_eq!((r, g, b), (0, 0, 255));
}

/// S4: with depth test LESS enabled, a second triangle farther from the
/// eye does not overwrite a nearer one already in the depth buffer.
#[test]
fn s4_depth_test_less_rejects_farther_pixels() {
    let mut ctx = opened(32, 32);
    ctx.clear(0x0000, 0xFFFF, true, true);
    ctx.regs.set_fbz_mode((1 << 4) | ((DepthFunction::Less as u32) << 5));

    let near = [vertex(2.0, 2.0, 0.0, 255.0, 0.0, 255.0), vertex(28.0, 2.0, 0.0, 255.0, 0.0, 255.0), vertex(2.0, 28.0, 0.0, 255.0, 0.0, 255.0)];
    let mut far = near;
    for v in far.iter_mut() {
        v.z = 1000.0;
        v.r = 255.0;
        v.g = 0.0;
    }

    ctx.draw_triangle(&near, CullMode::Disabled); // z = 0, writes depth 0
    ctx.draw_triangle(&far, CullMode::Disabled); // z = 1000, should fail LESS against depth 0

    let back = ctx.fbi.back_offset();
    let (r, g, _) = rgb565_channels(ctx.fbi.read_color16(back, 10, 10));
    assert_eq!((r, g), (0, 255));
}

/// S5: alpha test GEQUAL keeps pixels at or above the reference and
/// rejects pixels below it.
#[test]
fn s5_alpha_test_gequal_keeps_pixels_at_or_above_reference() {
    let mut ctx = opened(32, 32);
    ctx.clear(0x0000, 0xFFFF, true, true);
    let reference = 128u8;
    ctx.regs.set_alpha_mode(1 | ((AlphaFunction::GreaterEqual as u32) << 1) | ((reference as u32) << 24));

    let above = [vertex(2.0, 2.0, 0.0, 255.0, 0.0, 200.0), vertex(28.0, 2.0, 0.0, 255.0, 0.0, 200.0), vertex(2.0, 28.0, 0.0, 255.0, 0.0, 200.0)];
    ctx.draw_triangle(&above, CullMode::Disabled);
    let back = ctx.fbi.back_offset();
    let (_, g, _) = rgb565_channels(ctx.fbi.read_color16(back, 10, 10));
    assert_eq!(g, 255);

    ctx.clear(0x0000, 0xFFFF, true, true);
    let mut below = above;
    for v in below.iter_mut() {
        v.a = 50.0;
    }
    ctx.draw_triangle(&below, CullMode::Disabled);
    let (_, g, _) = rgb565_channels(ctx.fbi.read_color16(back, 10, 10));
    assert_eq!(g, 0);
}

/// S6: a palette-indexed texture can be reconverted by re-downloading only
/// the palette table, without re-uploading the indexed texel data.
#[test]
fn s6_palette_reconvert_without_texel_reupload() {
    let mut ctx = opened(16, 16);
    ctx.regs.set_color_combine(1, false, 3, 0, false); // other = texture, texture-enable derived
    ctx.regs.set_texture_mode(glide3x::core::register::TMU0_BASE, 0x5 << 8); // Palette8
    ctx.tmu[0].set_base_size(1, 1);
    ctx.tmu[0].ram[0] = 1; // index 1 at every texel
    ctx.tmu[0].ram[1] = 1;
    ctx.tmu[0].ram[2] = 1;
    ctx.tmu[0].ram[3] = 1;

    let mut red_palette = [0u32; 256];
    red_palette[1] = 0xFFFF_0000;
    ctx.tmu[0].download_palette(&red_palette, false);

    let mk = |x: f32, y: f32, s: f32, t: f32| InputVertex {
        x,
        y,
        z: 0.0,
        r: 255.0,
        g: 255.0,
        b: 255.0,
        a: 255.0,
        oow: 1.0,
        tmu_s: [s, 0.0],
        tmu_t: [t, 0.0],
        tmu_w: [1.0, 1.0],
        fog_coord: 0.0,
    };
    let quad = [mk(2.0, 2.0, 0.0, 0.0), mk(14.0, 2.0, 1.0, 0.0), mk(2.0, 14.0, 0.0, 1.0), mk(14.0, 14.0, 1.0, 1.0)];
    ctx.draw_triangle(&[quad[0], quad[1], quad[2]], CullMode::Disabled);
    ctx.draw_triangle(&[quad[1], quad[3], quad[2]], CullMode::Disabled);

    let back = ctx.fbi.back_offset();
    let (r, _, _) = rgb565_channels(ctx.fbi.read_color16(back, 7, 7));
    assert_eq!(r, 255);

    // Reconvert: swap the palette entry without touching texel data.
    let mut blue_palette = [0u32; 256];
    blue_palette[1] = 0xFF00_00FF;
    ctx.tmu[0].download_palette(&blue_palette, false);
    ctx.clear(0x0000, 0xFFFF, true, true);
    ctx.draw_triangle(&[quad[0], quad[1], quad[2]], CullMode::Disabled);
    ctx.draw_triangle(&[quad[1], quad[3], quad[2]], CullMode::Disabled);

    let (r, _, b) = rgb565_channels(ctx.fbi.read_color16(back, 7, 7));
    assert_eq!((r, b), (0, 255));
    let _ = TmuState::new(); // sanity import check, exercised indirectly via ctx.tmu
}
