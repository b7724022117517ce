//! Culling Pipeline Shaders
//!
//! WGSL source for the four compute stages:
//! 1. Vote - Evaluates the visibility predicate per candidate
//! 2. Local Scan - Work-efficient exclusive scan inside each block
//! 3. Group Scan - Single-pass exclusive scan of the block totals
//! 4. Compact - Scatters accepted candidates and counts them
//!
//! The templates are specialised once per pipeline: the payload struct, its
//! bounding-sphere expression and the workgroup sizes are spliced in as
//! literals. Nothing is re-specialised when the instance count changes.
//!
//! Bindings (group 0) per stage:
//! ```text
//! vote:        0 params | 1 candidates (r)  | 2 votes (rw)
//! local_scan:  0 params | 1 votes (r)       | 2 scan (rw)        | 3 group_sums (rw)
//! group_scan:  0 params | 1 group_sums (r)  | 2 scanned_sums (rw)
//! compact:     0 params | 1 candidates (r)  | 2 votes (r) | 3 scan (r)
//!              4 scanned_sums (r) | 5 compacted (rw) | 6 visible_count (atomic)
//! ```

use meadow_core::{CullInstance, CullMode, DispatchLayout};

/// Fully specialised WGSL for one pipeline.
#[derive(Debug, Clone)]
pub struct CullShaders {
    /// Vote kernel.
    pub vote: String,
    /// Block-local scan kernel.
    pub local_scan: String,
    /// Group scan kernel.
    pub group_scan: String,
    /// Compact kernel.
    pub compact: String,
    /// Threads per local-scan workgroup.
    pub local_scan_threads: u32,
    /// Threads in the group-scan workgroup.
    pub group_scan_threads: u32,
}

impl CullShaders {
    /// Specialises the templates for payload `T`.
    ///
    /// `max_threads` caps the scan workgroups; the kernels stride over their
    /// shared array when it is smaller than half the scan width.
    #[must_use]
    pub fn compose<T: CullInstance>(block_size: u32, group_capacity: u32, max_threads: u32) -> Self {
        let local_scan_threads = DispatchLayout::scan_threads(block_size, max_threads);
        let group_scan_threads = DispatchLayout::scan_threads(group_capacity, max_threads);

        let header = COMMON_WGSL
            .replace("{{FLAG_DISTANCE}}", &CullMode::FLAG_DISTANCE.to_string())
            .replace("{{FLAG_FRUSTUM}}", &CullMode::FLAG_FRUSTUM.to_string());
        let specialise = |body: &str| {
            let mut source = String::with_capacity(header.len() + T::WGSL_STRUCT.len() + body.len());
            source.push_str(&header);
            source.push_str(T::WGSL_STRUCT);
            source.push_str(body);
            source
                .replace("{{INSTANCE_SPHERE}}", T::WGSL_BOUNDING_SPHERE)
                .replace("{{BLOCK_SIZE}}", &block_size.to_string())
                .replace("{{GROUP_CAPACITY}}", &group_capacity.to_string())
                .replace("{{LOCAL_SCAN_THREADS}}", &local_scan_threads.to_string())
                .replace("{{GROUP_SCAN_THREADS}}", &group_scan_threads.to_string())
        };

        Self {
            vote: specialise(VOTE_WGSL),
            local_scan: specialise(&format!("{LOCAL_SCAN_WGSL}{SCAN_WGSL}")),
            group_scan: specialise(&format!("{GROUP_SCAN_WGSL}{SCAN_WGSL}")),
            compact: specialise(COMPACT_WGSL),
            local_scan_threads,
            group_scan_threads,
        }
    }
}

/// Uniform block and flags shared by every stage.
const COMMON_WGSL: &str = r#"
// MEADOW culling: shared declarations

struct CullParams {
    view_proj: mat4x4<f32>,
    frustum_planes: array<vec4<f32>, 6>,
    camera_position: vec4<f32>,   // xyz = camera, w = cull distance
    counts: vec4<u32>,            // instances, blocks, padded blocks, flags
}

const FLAG_DISTANCE: u32 = {{FLAG_DISTANCE}}u;
const FLAG_FRUSTUM: u32 = {{FLAG_FRUSTUM}}u;
const BLOCK_SIZE: u32 = {{BLOCK_SIZE}}u;
const GROUP_CAPACITY: u32 = {{GROUP_CAPACITY}}u;

"#;

/// Vote: one thread per candidate, `BLOCK_SIZE` per workgroup.
const VOTE_WGSL: &str = r#"
@group(0) @binding(0) var<uniform> params: CullParams;
@group(0) @binding(1) var<storage, read> candidates: array<Instance>;
@group(0) @binding(2) var<storage, read_write> votes: array<u32>;

fn is_visible(sphere: vec4<f32>) -> bool {
    let flags = params.counts.w;

    if (flags & FLAG_DISTANCE) != 0u {
        let delta = sphere.xyz - params.camera_position.xyz;
        if sqrt(dot(delta, delta)) > params.camera_position.w {
            return false;
        }
    }

    if (flags & FLAG_FRUSTUM) != 0u {
        for (var p = 0u; p < 6u; p++) {
            let plane = params.frustum_planes[p];
            if dot(plane.xyz, sphere.xyz) + plane.w < -sphere.w {
                return false;
            }
        }
    }

    return true;
}

@compute @workgroup_size({{BLOCK_SIZE}})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let idx = global_id.x;

    // Tail of the last block
    if idx >= params.counts.x {
        return;
    }

    let inst = candidates[idx];
    let sphere = {{INSTANCE_SPHERE}};
    votes[idx] = select(0u, 1u, is_visible(sphere));
}
"#;

/// Local scan: one workgroup per block, scratch sized to `BLOCK_SIZE`.
const LOCAL_SCAN_WGSL: &str = r#"
@group(0) @binding(0) var<uniform> params: CullParams;
@group(0) @binding(1) var<storage, read> votes: array<u32>;
@group(0) @binding(2) var<storage, read_write> scan: array<u32>;
@group(0) @binding(3) var<storage, read_write> group_sums: array<u32>;

const SCAN_WIDTH: u32 = {{BLOCK_SIZE}}u;
const SCAN_THREADS: u32 = {{LOCAL_SCAN_THREADS}}u;
var<workgroup> scratch: array<u32, {{BLOCK_SIZE}}>;

@compute @workgroup_size({{LOCAL_SCAN_THREADS}})
fn main(
    @builtin(local_invocation_id) local_id: vec3<u32>,
    @builtin(workgroup_id) group_id: vec3<u32>,
) {
    let count = params.counts.x;
    let base = group_id.x * BLOCK_SIZE;

    // Votes past N load as zero
    for (var k = local_id.x; k < SCAN_WIDTH; k += SCAN_THREADS) {
        let i = base + k;
        var v = 0u;
        if i < count {
            v = votes[i];
        }
        scratch[k] = v;
    }
    workgroupBarrier();

    let total = exclusive_scan(local_id.x);
    if local_id.x == 0u {
        group_sums[group_id.x] = total;
    }

    for (var k = local_id.x; k < SCAN_WIDTH; k += SCAN_THREADS) {
        let i = base + k;
        if i < count {
            scan[i] = scratch[k];
        }
    }
}
"#;

/// Group scan: a single workgroup over `GROUP_CAPACITY` slots.
const GROUP_SCAN_WGSL: &str = r#"
@group(0) @binding(0) var<uniform> params: CullParams;
@group(0) @binding(1) var<storage, read> group_sums: array<u32>;
@group(0) @binding(2) var<storage, read_write> scanned_group_sums: array<u32>;

const SCAN_WIDTH: u32 = {{GROUP_CAPACITY}}u;
const SCAN_THREADS: u32 = {{GROUP_SCAN_THREADS}}u;
var<workgroup> scratch: array<u32, {{GROUP_CAPACITY}}>;

@compute @workgroup_size({{GROUP_SCAN_THREADS}})
fn main(@builtin(local_invocation_id) local_id: vec3<u32>) {
    let blocks = params.counts.y;
    let padded = params.counts.z;

    for (var k = local_id.x; k < SCAN_WIDTH; k += SCAN_THREADS) {
        var v = 0u;
        if k < blocks {
            v = group_sums[k];
        }
        scratch[k] = v;
    }
    workgroupBarrier();

    _ = exclusive_scan(local_id.x);

    for (var k = local_id.x; k < SCAN_WIDTH; k += SCAN_THREADS) {
        if k < padded {
            scanned_group_sums[k] = scratch[k];
        }
    }
}
"#;

/// Work-efficient (up-sweep / down-sweep) exclusive scan of `scratch`.
///
/// Appended after the stage body, which declares `scratch`, `SCAN_WIDTH`
/// and `SCAN_THREADS`. Returns the total; the result is visible to every
/// thread when it returns.
const SCAN_WGSL: &str = r#"
fn exclusive_scan(lane: u32) -> u32 {
    // Up-sweep
    var offset = 1u;
    for (var d = SCAN_WIDTH >> 1u; d > 0u; d = d >> 1u) {
        for (var t = lane; t < d; t += SCAN_THREADS) {
            let ai = offset * (2u * t + 1u) - 1u;
            let bi = offset * (2u * t + 2u) - 1u;
            scratch[bi] += scratch[ai];
        }
        offset = offset << 1u;
        workgroupBarrier();
    }

    let total = scratch[SCAN_WIDTH - 1u];
    workgroupBarrier();
    if lane == 0u {
        scratch[SCAN_WIDTH - 1u] = 0u;
    }
    workgroupBarrier();

    // Down-sweep
    for (var d = 1u; d < SCAN_WIDTH; d = d << 1u) {
        offset = offset >> 1u;
        for (var t = lane; t < d; t += SCAN_THREADS) {
            let ai = offset * (2u * t + 1u) - 1u;
            let bi = offset * (2u * t + 2u) - 1u;
            let left = scratch[ai];
            scratch[ai] = scratch[bi];
            scratch[bi] += left;
        }
        workgroupBarrier();
    }

    return total;
}
"#;

/// Compact: one thread per candidate, `BLOCK_SIZE` per workgroup.
const COMPACT_WGSL: &str = r#"
@group(0) @binding(0) var<uniform> params: CullParams;
@group(0) @binding(1) var<storage, read> candidates: array<Instance>;
@group(0) @binding(2) var<storage, read> votes: array<u32>;
@group(0) @binding(3) var<storage, read> scan: array<u32>;
@group(0) @binding(4) var<storage, read> scanned_group_sums: array<u32>;
@group(0) @binding(5) var<storage, read_write> compacted: array<Instance>;
@group(0) @binding(6) var<storage, read_write> visible_count: atomic<u32>;

@compute @workgroup_size({{BLOCK_SIZE}})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let idx = global_id.x;

    if idx >= params.counts.x {
        return;
    }
    if votes[idx] == 0u {
        return;
    }

    let slot = scanned_group_sums[idx / BLOCK_SIZE] + scan[idx];
    compacted[slot] = candidates[idx];
    atomicAdd(&visible_count, 1u);
}
"#;
