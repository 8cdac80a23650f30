//! Global compiled-program cache.
//!
//! Maps (source hash, device) pairs to compiled programs, using papaya's
//! lock-free HashMap so concurrent reduction calls can share compilations.
//!
//! The source hash covers the generated text and the compiler configuration.
//! Everything that changes kernel behaviour (operators, dtypes, argument
//! list, tuning parameters, entry names) is spelled out in the text, so equal
//! hashes mean interchangeable programs. The extent N is a launch argument
//! and never part of the key.

use std::sync::{Arc, OnceLock};

use papaya::HashMap;
use reductor_device::Program;
use xxhash_rust::xxh3::xxh3_64;

/// Compiled program shared across reduction calls.
#[derive(Debug)]
pub struct CachedProgram {
    pub program: Arc<dyn Program>,
    /// Device string (e.g., "HOST", "CUDA:0").
    pub device: String,
    pub source_hash: u64,
}

/// Cache key: (source hash, device string).
///
/// Programs are compiled per device ordinal: a module loaded on CUDA:0 cannot
/// be launched on CUDA:1.
type ProgramKey = (u64, String);

static PROGRAMS: OnceLock<HashMap<ProgramKey, Arc<CachedProgram>>> = OnceLock::new();

fn programs() -> &'static HashMap<ProgramKey, Arc<CachedProgram>> {
    PROGRAMS.get_or_init(HashMap::new)
}

/// Hash of generated source under a compiler configuration.
pub fn source_hash(src: &str, compiler_key: Option<&str>) -> u64 {
    match compiler_key {
        Some(key) => xxh3_64(format!("{key}\0{src}").as_bytes()),
        None => xxh3_64(src.as_bytes()),
    }
}

/// Get or compile a program by source hash and device.
///
/// Thread-safe: if several threads miss on the same key concurrently, each
/// may compile, but all of them receive the single program that won the
/// insertion.
pub fn get_or_compile<F, E>(source_hash: u64, device: &str, compile_fn: F) -> Result<Arc<CachedProgram>, E>
where
    F: FnOnce() -> Result<Arc<dyn Program>, E>,
{
    let key = (source_hash, device.to_string());
    let map = programs();
    let guard = map.guard();

    // Fast path: program already cached
    if let Some(cached) = map.get(&key, &guard) {
        tracing::trace!(source.hash = source_hash, device, "program cache hit");
        return Ok(Arc::clone(cached));
    }

    // Slow path: compile (expensive)
    let program = compile_fn()?;
    let cached = Arc::new(CachedProgram { program, device: device.to_string(), source_hash });

    // Atomic insert - if another thread beat us, use their program
    use papaya::{Compute, Operation};
    match map.compute(
        key,
        |entry| match entry {
            Some((_, existing)) => Operation::Abort(Arc::clone(existing)),
            None => Operation::Insert(Arc::clone(&cached)),
        },
        &guard,
    ) {
        Compute::Inserted(_, program) => Ok(Arc::clone(program)),
        Compute::Aborted(program) => Ok(program),
        _ => Ok(cached),
    }
}

/// Number of cached programs.
pub fn len() -> usize {
    programs().len()
}

/// Clear all cached programs.
///
/// This is primarily useful for testing to ensure test isolation.
pub fn clear_all() {
    let guard = programs().guard();
    programs().clear(&guard);
}
