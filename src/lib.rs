//! Software emulation of the Glide 3.x API over a Voodoo2-compatible
//! fixed-function pixel pipeline: rasterizer, two texture mapping units,
//! color/alpha combine, fog, chroma key, alpha test, depth test, alpha
//! blend and dithering, writing a 16-bit RGB565 framebuffer plus a 16-bit
//! aux (depth/alpha) buffer, entirely in host memory.
//!
//! This crate has no window, no event loop and no process lifecycle of its
//! own (`spec.md` §1 "Out of scope"); a host application links against the
//! `extern "C"` surface in [`api`], drives triangles through it, and reads
//! the resulting framebuffer back out through [`renderer::Renderer`] or by
//! reading `Context`'s buffers directly when embedded as a Rust library.

pub mod api;
pub mod build_info;
pub mod core;
pub mod error;
pub mod log;
pub mod renderer;

pub use core::context::Context;
pub use error::ContextError;
