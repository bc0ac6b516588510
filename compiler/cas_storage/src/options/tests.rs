use super::*;
use pretty_assertions::assert_eq;

const MIB: usize = 1024 * 1024;

#[test]
fn test_default_options() {
    let options = StorageOptions::default();

    assert!(matches!(options.swap, SwapTarget::None));
    assert_eq!(options.initial_swap_size, 10 * MIB);
    assert!(options.dedupe_enabled);
}

#[test]
fn test_builder_overrides() {
    let options = StorageOptions::new()
        .with_anonymous_swap()
        .with_initial_swap_size(MIB)
        .with_dedupe(false);

    assert!(matches!(options.swap, SwapTarget::Anonymous));
    assert_eq!(options.initial_swap_size, MIB);
    assert!(!options.dedupe_enabled);
    assert!(matches!(options.without_swap().swap, SwapTarget::None));
}

#[test]
fn test_heap_target_opens_nothing() {
    assert!(SwapTarget::None.open().unwrap().is_none());
}

#[test]
fn test_anonymous_target_opens_a_file() {
    assert!(SwapTarget::Anonymous.open().unwrap().is_some());
}

#[test]
fn test_path_target_creates_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("swap.bin");

    let file = SwapTarget::Path(path.clone()).open().unwrap();

    assert!(file.is_some());
    assert!(path.exists());
}

#[test]
fn test_unopenable_path_reports_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("swap.bin");

    let err = SwapTarget::Path(path.clone()).open().unwrap_err();

    match &err {
        StorageError::OpenSwapFile { path: reported, .. } => assert_eq!(reported, &path),
        StorageError::CreateSwapFile(_) => panic!("unexpected error: {err}"),
    }
    assert!(err.to_string().starts_with("unable to open swap file "));
}

#[test]
fn test_policy_never_swaps_boot_images() {
    let policy = SwapPolicy::default();

    assert!(!policy.should_use_swap(true, &[30 * MIB, 30 * MIB]));
}

#[test]
fn test_policy_needs_enough_files() {
    let policy = SwapPolicy::default();

    assert!(!policy.should_use_swap(false, &[]));
    assert!(!policy.should_use_swap(false, &[100 * MIB]));
}

#[test]
fn test_policy_needs_enough_bytes() {
    let policy = SwapPolicy::default();

    assert!(!policy.should_use_swap(false, &[5 * MIB, 5 * MIB]));
    assert!(!policy.should_use_swap(false, &[10 * MIB, 10 * MIB - 1]));
    assert!(policy.should_use_swap(false, &[10 * MIB, 10 * MIB]));
    assert!(policy.should_use_swap(false, &[MIB, MIB, 30 * MIB]));
}

#[test]
fn test_policy_thresholds_are_configurable() {
    let policy = SwapPolicy {
        min_dex_files: 1,
        min_cumulative_dex_size: 100,
    };

    assert!(policy.should_use_swap(false, &[100]));
    assert!(!policy.should_use_swap(false, &[99]));
}

#[test]
fn test_policy_saturates_huge_totals() {
    let policy = SwapPolicy::default();

    assert!(policy.should_use_swap(false, &[usize::MAX, usize::MAX]));
}
