//! A compilation session end to end: several worker threads compile methods
//! into one storage, then everything is torn down.

#![allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]

use std::sync::Arc;

use cas_storage::{
    init_tracing, ArtifactKind, ArtifactStorage, CompiledMethod, LinkerPatch, StorageOptions,
};
use pretty_assertions::assert_eq;

/// Fake compiler output: methods with the same `shape` produce identical
/// arrays, so several workers compiling overlapping shapes exercise dedupe.
fn compile(storage: &ArtifactStorage, shape: u8) -> CompiledMethod<'_> {
    let code: Vec<u8> = (0..shape * 4 + 8).map(|i| i.wrapping_mul(shape)).collect();
    let vmap = vec![shape; usize::from(shape % 5)];
    let patches: Vec<LinkerPatch> = (0..u32::from(shape % 3))
        .map(|i| LinkerPatch::relative_method(i * 8, i * 8 + 4, u32::from(shape)))
        .collect();
    CompiledMethod::new(storage, &code, &[shape, 1], &vmap, &[0x0C, shape], &patches)
}

fn run_session(dedupe: bool) -> (Arc<cas_storage::SwapArena>, usize) {
    init_tracing();
    let storage = ArtifactStorage::open(
        StorageOptions::new()
            .with_anonymous_swap()
            .with_initial_swap_size(1024 * 1024)
            .with_dedupe(dedupe),
    )
    .unwrap();
    let arena = Arc::clone(storage.swap_arena().unwrap());

    let canonical_code = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..4u8)
            .map(|worker| {
                let storage = &storage;
                scope.spawn(move || {
                    let methods: Vec<CompiledMethod<'_>> = (0..24u8)
                        .map(|i| compile(storage, (i + worker * 6) % 30))
                        .collect();
                    for method in &methods {
                        assert!(!method.code().is_empty());
                        assert_eq!(method.method_info()[1], 1);
                    }
                    methods.len()
                })
            })
            .collect();

        let compiled: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(compiled, 96);
        storage.canonical_count(ArtifactKind::Code)
    });

    drop(storage);
    (arena, canonical_code)
}

#[test]
fn test_session_with_dedupe() {
    let (arena, canonical_code) = run_session(true);

    // Workers cover shapes 0..30 between them.
    assert_eq!(canonical_code, 30);
    assert_eq!(arena.free_bytes(), arena.size());
    assert_eq!(arena.free_chunk_count(), 1);
}

#[test]
fn test_session_without_dedupe() {
    let (arena, canonical_code) = run_session(false);

    assert_eq!(canonical_code, 0);
    assert_eq!(arena.free_bytes(), arena.size());
    assert_eq!(arena.free_chunk_count(), 1);
}
