use super::*;
use pretty_assertions::assert_eq;

fn swap_storage() -> ArtifactStorage {
    ArtifactStorage::with_initial_size(Some(tempfile::tempfile().unwrap()), 1024 * 1024)
}

fn patches() -> Vec<LinkerPatch> {
    vec![
        LinkerPatch::relative_code(0x10, 4),
        LinkerPatch::string_bss_entry(0x20, 0x1c, 9),
    ]
}

#[test]
fn test_method_exposes_its_arrays() {
    let storage = swap_storage();
    let method = CompiledMethod::new(&storage, &[0xC3], &[1, 2], &[3], &[], &patches());

    assert_eq!(method.code(), &[0xC3]);
    assert_eq!(method.method_info(), &[1, 2]);
    assert_eq!(method.vmap_table(), &[3]);
    assert_eq!(method.cfi_info(), &[] as &[u8]);
    assert!(method.cfi_info_array().is_none());
    assert_eq!(method.linker_patches(), patches().as_slice());
}

#[test]
fn test_identical_methods_share_arrays() {
    let storage = swap_storage();
    let first = CompiledMethod::new(&storage, &[1, 2, 3], &[4], &[5], &[6], &patches());
    let second = CompiledMethod::new(&storage, &[1, 2, 3], &[4], &[5], &[6], &patches());

    assert_eq!(first.code_array(), second.code_array());
    assert_eq!(first.method_info_array(), second.method_info_array());
    assert_eq!(first.vmap_table_array(), second.vmap_table_array());
    assert_eq!(first.cfi_info_array(), second.cfi_info_array());
    assert_eq!(first.linker_patches_array(), second.linker_patches_array());
    assert!(first.code_array().unwrap().is_canonical());
}

#[test]
fn test_dropping_private_method_frees_its_arrays() {
    let storage = swap_storage();
    storage.set_dedupe_enabled(false);
    let arena = storage.swap_arena().unwrap();
    let free_before = arena.free_bytes();

    let method = CompiledMethod::new(&storage, &[9; 100], &[1; 12], &[2; 7], &[3; 40], &patches());
    assert!(arena.free_bytes() < free_before);
    assert!(!method.code_array().unwrap().is_canonical());

    drop(method);

    assert_eq!(arena.free_bytes(), free_before);
    assert_eq!(arena.free_chunk_count(), 1);
}

#[test]
fn test_dropping_canonical_method_keeps_shared_arrays() {
    let storage = swap_storage();
    let first = CompiledMethod::new(&storage, &[7; 16], &[], &[], &[], &[]);
    let free_after_first = storage.swap_arena().unwrap().free_bytes();

    drop(first);
    let second = CompiledMethod::new(&storage, &[7; 16], &[], &[], &[], &[]);

    assert_eq!(second.code(), &[7; 16]);
    assert_eq!(storage.swap_arena().unwrap().free_bytes(), free_after_first);
    assert_eq!(storage.canonical_count(crate::ArtifactKind::Code), 1);
}
