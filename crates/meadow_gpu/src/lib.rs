//! # MEADOW GPU Culling
//!
//! Device half of the culling pipeline on `wgpu`:
//! - WGSL kernels for vote, local scan, group scan and compact
//! - Buffer lifecycle sized from [`meadow_core::DispatchLayout`]
//! - Frame encoding with the indirect-args patch done on the device
//! - Blocking diagnostics readback, for debugging only
//!
//! ## Usage
//!
//! ```text
//! let ctx = GpuContext::headless()?;
//! let mut cull = CullPipeline::<BladeInstance>::new(&ctx.device, &config.pipeline, n)?;
//! cull.upload_candidates(&ctx.queue, &field)?;
//!
//! // every frame
//! cull.prepare_frame(&ctx.queue, &frame);
//! cull.encode_frame(&mut encoder);
//! render_pass.set_vertex_buffer(1, cull.compacted_buffer().slice(..));
//! render_pass.draw_indexed_indirect(cull.indirect_args_buffer(), 0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
// Dispatch sizing converts between u32, usize and f32 throughout
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]

pub mod buffers;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod readback;
pub mod shaders;
pub mod stages;

pub use context::GpuContext;
pub use error::{GpuError, GpuResult};
pub use pipeline::CullPipeline;
pub use readback::{read_buffer, DiagnosticSnapshot, Verification};
pub use shaders::CullShaders;
