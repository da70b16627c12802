//! GPU half of the compositor.
//!
//! - `context` owns the wgpu instance, device and surface and reconfigures the
//!   swapchain on resize.
//! - `pipeline` builds the opaque background pipeline and the alpha-blended
//!   dissolve pipeline from the bundled WGSL.
//! - `textures` holds the two slot textures plus per-overlay images and
//!   rebuilds bind groups when a source changes size.
//! - `uniforms` mirrors the WGSL uniform blocks byte for byte.
//! - `state` applies one `SessionFrame` and issues the draws.

mod context;
mod pipeline;
mod state;
mod textures;
mod uniforms;

pub(crate) use state::GpuState;
