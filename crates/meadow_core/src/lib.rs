//! # MEADOW Culling Core
//!
//! Device-independent half of the GPU visibility-culling pipeline:
//! - Thread-group sizing and the single-pass group-scan precondition
//! - Instance payload contract and indirect-draw record
//! - Frustum extraction and the per-frame cull uniform
//! - A host reference executor with the exact semantics of the kernels
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    CULLING PASS (per frame)                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Candidates → Vote → Local Scan → Group Scan → Compact        │
//! │                        ↓              ↓           ↓           │
//! │                  Scan / Sums   Scanned Sums   Compacted +     │
//! │                                               Visible Count   │
//! │                                                   ↓           │
//! │                                    Indirect Args (device copy) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The device half lives in `meadow_gpu`; everything here is plain Rust and
//! runs without a GPU.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
// Dispatch sizing converts between u32, usize and f32 throughout
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]

pub mod config;
pub mod error;
pub mod frustum;
pub mod indirect;
pub mod instance;
pub mod layout;
pub mod placement;
pub mod reference;
pub mod stats;

pub use config::{CullSettings, FieldConfig, MeadowConfig, PipelineConfig};
pub use error::{CullError, CullResult};
pub use frustum::{CullMode, CullParams, FrameParams, Frustum, Plane};
pub use indirect::DrawIndexedIndirectArgs;
pub use instance::{BladeInstance, CullInstance, PropInstance};
pub use layout::{DispatchLayout, DEFAULT_BLOCK_SIZE, DEFAULT_GROUP_CAPACITY};
pub use placement::{FieldGenerator, Heightmap, ScatterGenerator};
pub use reference::{ReferenceExecutor, ReferenceOutput};
pub use stats::CullStats;
