//! The external display sink contract. `spec.md` §1 "Out of scope" names
//! the actual window/event loop and display presentation as outside this
//! crate; this trait is the seam a host application implements to receive
//! frames, mirroring the teacher's own `Renderer` abstraction.

use std::sync::Arc;

/// One presented frame: the RGB565 color buffer plus its visible geometry.
/// `spec.md` §6 "Framebuffer wire format".
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pub rgb565: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

impl FrameBuffer {
    pub fn new(rgb565: Arc<Vec<u8>>, width: u32, height: u32) -> Self {
        Self { rgb565, width, height }
    }
}

/// Implemented by whatever presents frames to a window; this crate never
/// opens a window itself. `spec.md` §1 "Out of scope": external display
/// sink, window/event loop.
pub trait Renderer {
    fn render_frame(&mut self, frame: FrameBuffer);
}
