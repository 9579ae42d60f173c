//! The state manager: owns the register file, FBI state and both TMUs, and
//! orchestrates setup → rasterize for a draw call. `spec.md` §3 "Context"
//! and §6 "Lifecycle".

use crate::core::fbi::FbiState;
use crate::core::raster::rasterize_triangle;
use crate::core::register::RegisterFile;
use crate::core::setup::{setup_triangle, CullMode, InputVertex};
use crate::core::tmu::TmuState;
use crate::error::ContextError;

pub struct Context {
    pub regs: RegisterFile,
    pub fbi: FbiState,
    pub tmu: [TmuState; 2],
    open: bool,
}

/// Disjoint mutable borrows of the three sibling fields, so a draw call can
/// pass `&mut regs` and `&mut tmu` to the rasterizer while still holding
/// `&mut fbi` separately — mirrors the teacher's
/// `bus.get_timer0_and_clock_mut()` split-borrow helper.
pub struct ContextMut<'a> {
    pub regs: &'a mut RegisterFile,
    pub fbi: &'a mut FbiState,
    pub tmu: &'a mut [TmuState; 2],
}

impl Context {
    pub fn new() -> Self {
        Self {
            regs: RegisterFile::default(),
            fbi: FbiState::new(),
            tmu: [TmuState::new(), TmuState::new()],
            open: false,
        }
    }

    pub fn split_mut(&mut self) -> ContextMut<'_> {
        ContextMut {
            regs: &mut self.regs,
            fbi: &mut self.fbi,
            tmu: &mut self.tmu,
        }
    }

    /// `grSstWinOpen`-equivalent: the one call that reports failure to the
    /// caller. `spec.md` §7.
    pub fn open_window(&mut self, width: u32, height: u32) -> Result<(), ContextError> {
        if width == 0 || height == 0 {
            return Err(ContextError::InitFailed("zero-sized window".to_string()));
        }
        self.fbi.configure(width, height);
        self.open = true;
        tracing::info!(width, height, "open-window");
        Ok(())
    }

    pub fn close_window(&mut self) {
        tracing::info!("close-window");
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Fast-fill the back color/aux buffers within the current clip rect.
    pub fn clear(&mut self, color: u16, depth: u16, clear_color: bool, clear_depth: bool) {
        let (left, right) = self.regs.clip_left_right();
        let (top, bottom) = self.regs.clip_low_y_high_y();
        self.fbi.clear((left, top, right, bottom), color, depth, clear_color, clear_depth);
    }

    pub fn swap_buffers(&mut self) {
        self.fbi.swap_buffers();
    }

    /// Draws one triangle: setup, then rasterize. Degenerate or
    /// back-face-culled triangles are silently dropped, per §7's
    /// defensive-by-default policy.
    pub fn draw_triangle(&mut self, vertices: &[InputVertex; 3], cull_mode: CullMode) {
        let fbz = self.regs.fbz_color_path();
        let tmu_enabled = [
            self.regs.texture_mode(crate::core::register::TMU0_BASE).0 != 0 && fbz.texture_enable(),
            self.regs.texture_mode(crate::core::register::TMU1_BASE).0 != 0 && fbz.texture_enable(),
        ];

        let Some(setup) = setup_triangle(vertices, cull_mode, fbz, tmu_enabled) else {
            return;
        };
        self.fbi.setup = setup;
        let setup = self.fbi.setup.clone();

        tracing::debug!(tmu0 = tmu_enabled[0], tmu1 = tmu_enabled[1], "draw-triangle");
        rasterize_triangle(&mut self.regs, &mut self.fbi, &mut self.tmu, &setup, tmu_enabled);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_window_rejects_zero_size() {
        let mut ctx = Context::new();
        assert!(ctx.open_window(0, 480).is_err());
    }

    #[test]
    fn open_window_configures_geometry() {
        let mut ctx = Context::new();
        ctx.open_window(320, 240).unwrap();
        assert!(ctx.is_open());
        assert_eq!(ctx.fbi.geometry.width, 320);
    }

    #[test]
    fn clear_then_draw_overwrites_cleared_region() {
        let mut ctx = Context::new();
        ctx.open_window(32, 32).unwrap();
        ctx.regs.set_clip_left_right(0, 32);
        ctx.regs.set_clip_low_y_high_y(0, 32);
        ctx.clear(0x0000, 0xFFFF, true, true);
        let back = ctx.fbi.back_offset();
        assert_eq!(ctx.fbi.read_color16(back, 1, 1), 0);
    }
}
