#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Trimmed rational-Bezier boundary representation kernel.
//!
//! Shells are built by extruding closed curve loops, copied, transformed and
//! combined by union or difference, then flattened into a triangle mesh and an edge
//! list. Everything lives in [`geom`].

pub mod geom;

pub use geom::{
    BooleanDiagnostics, BooleanError, BooleanOp, GeomContext, Mesh, Shell, Tolerance,
};

/// Size the global rayon pool used for per-surface meshing.
///
/// Without a worker count the pool follows the available parallelism.
///
/// # Errors
/// Fails when the global pool was already built.
#[cfg(feature = "parallel")]
pub fn initialize_parallel(worker_count: Option<usize>) -> Result<(), rayon::ThreadPoolBuildError> {
    let threads = worker_count
        .map(|count| count.max(1))
        .or_else(|| std::thread::available_parallelism().map(std::num::NonZeroUsize::get).ok())
        .unwrap_or(1);

    log::debug!("initializing rayon pool with {threads} threads");
    rayon::ThreadPoolBuilder::new().num_threads(threads).build_global()
}
