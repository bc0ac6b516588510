use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_constructors_set_kind_and_fields() {
    let patch = LinkerPatch::relative_type(0x40, 0x3c, 17);

    assert_eq!(patch.kind(), LinkerPatchKind::RelativeType);
    assert_eq!(patch.literal_offset(), 0x40);
    assert_eq!(patch.pc_insn_offset(), Some(0x3c));
    assert_eq!(patch.target_index(), 17);
}

#[test]
fn test_direct_patches_have_no_anchor() {
    assert_eq!(LinkerPatch::relative_code(8, 3).pc_insn_offset(), None);
    assert_eq!(LinkerPatch::baker_read_barrier_branch(12, 0x55).pc_insn_offset(), None);
    assert_eq!(LinkerPatch::baker_read_barrier_branch(12, 0x55).target_index(), 0x55);
}

#[test]
fn test_equality_covers_every_field() {
    let base = LinkerPatch::string_bss_entry(4, 0, 9);

    assert_eq!(base, LinkerPatch::string_bss_entry(4, 0, 9));
    assert_ne!(base, LinkerPatch::string_bss_entry(4, 0, 10));
    assert_ne!(base, LinkerPatch::string_bss_entry(8, 0, 9));
    assert_ne!(base, LinkerPatch::string_intern_table(4, 0, 9));
}

#[test]
fn test_patch_fits_allocator_alignment() {
    assert!(std::mem::align_of::<LinkerPatch>() <= cas_arena::ALIGNMENT);
}

#[test]
fn test_absolute_call_is_the_only_non_pc_relative_kind() {
    let call = LinkerPatch::code(0x24, 7);

    assert_eq!(call.kind(), LinkerPatchKind::Call);
    assert_eq!(call.target_index(), 7);
    assert_eq!(call.pc_insn_offset(), None);
    assert!(!call.kind().is_pc_relative());

    assert!(LinkerPatchKind::RelativeCode.is_pc_relative());
    assert!(LinkerPatchKind::BakerReadBarrierBranch.is_pc_relative());
    assert!(LinkerPatchKind::StringBssEntry.is_pc_relative());
}

#[test]
fn test_absolute_and_relative_calls_differ() {
    assert_ne!(LinkerPatch::code(8, 3), LinkerPatch::relative_code(8, 3));
}
