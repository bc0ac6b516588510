//! Linker patch records.
//!
//! A patch marks a location in a method's code that the linker rewrites once
//! final addresses are known. Patches are plain `Copy` records so they can be
//! interned by content like any other artifact array.

/// What a [`LinkerPatch`] refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum LinkerPatchKind {
    /// PC-relative reference to a method.
    RelativeMethod,
    /// Method slot in the .bss section.
    MethodBssEntry,
    /// Absolute call to another method's code.
    Call,
    /// PC-relative call to another method's code.
    RelativeCode,
    /// PC-relative reference to a type.
    RelativeType,
    /// Type slot in the .bss section.
    TypeBssEntry,
    /// Entry in a class table.
    TypeClassTable,
    /// PC-relative reference to a string.
    RelativeString,
    /// String slot in the .bss section.
    StringBssEntry,
    /// Entry in the string intern table.
    StringInternTable,
    /// Branch to a read-barrier thunk.
    BakerReadBarrierBranch,
}

impl LinkerPatchKind {
    /// Whether the patched value is relative to the program counter.
    pub const fn is_pc_relative(self) -> bool {
        !matches!(self, LinkerPatchKind::Call)
    }

    /// Whether the patch records the offset of a separate anchoring
    /// instruction. Calls and barrier branches patch the instruction itself.
    pub const fn has_pc_insn_offset(self) -> bool {
        !matches!(
            self,
            LinkerPatchKind::Call
                | LinkerPatchKind::RelativeCode
                | LinkerPatchKind::BakerReadBarrierBranch
        )
    }
}

/// One linker fix-up.
///
/// Equality and hashing cover every field, so two methods share a patch
/// array only when all of their patches agree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkerPatch {
    literal_offset: u32,
    kind: LinkerPatchKind,
    pc_insn_offset: u32,
    target_index: u32,
}

impl LinkerPatch {
    const fn with_kind(
        kind: LinkerPatchKind,
        literal_offset: u32,
        pc_insn_offset: u32,
        target_index: u32,
    ) -> Self {
        Self {
            literal_offset,
            kind,
            pc_insn_offset,
            target_index,
        }
    }

    pub const fn relative_method(literal_offset: u32, pc_insn_offset: u32, method_index: u32) -> Self {
        Self::with_kind(LinkerPatchKind::RelativeMethod, literal_offset, pc_insn_offset, method_index)
    }

    pub const fn method_bss_entry(literal_offset: u32, pc_insn_offset: u32, method_index: u32) -> Self {
        Self::with_kind(LinkerPatchKind::MethodBssEntry, literal_offset, pc_insn_offset, method_index)
    }

    /// An absolute call to `method_index`'s code.
    pub const fn code(literal_offset: u32, method_index: u32) -> Self {
        Self::with_kind(LinkerPatchKind::Call, literal_offset, 0, method_index)
    }

    /// A PC-relative call; the call instruction itself is the literal.
    pub const fn relative_code(literal_offset: u32, method_index: u32) -> Self {
        Self::with_kind(LinkerPatchKind::RelativeCode, literal_offset, 0, method_index)
    }

    pub const fn relative_type(literal_offset: u32, pc_insn_offset: u32, type_index: u32) -> Self {
        Self::with_kind(LinkerPatchKind::RelativeType, literal_offset, pc_insn_offset, type_index)
    }

    pub const fn type_bss_entry(literal_offset: u32, pc_insn_offset: u32, type_index: u32) -> Self {
        Self::with_kind(LinkerPatchKind::TypeBssEntry, literal_offset, pc_insn_offset, type_index)
    }

    pub const fn type_class_table(literal_offset: u32, pc_insn_offset: u32, type_index: u32) -> Self {
        Self::with_kind(LinkerPatchKind::TypeClassTable, literal_offset, pc_insn_offset, type_index)
    }

    pub const fn relative_string(literal_offset: u32, pc_insn_offset: u32, string_index: u32) -> Self {
        Self::with_kind(LinkerPatchKind::RelativeString, literal_offset, pc_insn_offset, string_index)
    }

    pub const fn string_bss_entry(literal_offset: u32, pc_insn_offset: u32, string_index: u32) -> Self {
        Self::with_kind(LinkerPatchKind::StringBssEntry, literal_offset, pc_insn_offset, string_index)
    }

    pub const fn string_intern_table(literal_offset: u32, pc_insn_offset: u32, string_index: u32) -> Self {
        Self::with_kind(LinkerPatchKind::StringInternTable, literal_offset, pc_insn_offset, string_index)
    }

    /// A read-barrier branch; `custom_data` encodes the thunk selection.
    pub const fn baker_read_barrier_branch(literal_offset: u32, custom_data: u32) -> Self {
        Self::with_kind(LinkerPatchKind::BakerReadBarrierBranch, literal_offset, 0, custom_data)
    }

    #[inline]
    pub const fn literal_offset(&self) -> u32 {
        self.literal_offset
    }

    #[inline]
    pub const fn kind(&self) -> LinkerPatchKind {
        self.kind
    }

    /// Offset of the anchoring PC-relative instruction, if the kind has one.
    pub const fn pc_insn_offset(&self) -> Option<u32> {
        if self.kind.has_pc_insn_offset() {
            Some(self.pc_insn_offset)
        } else {
            None
        }
    }

    /// Method, type or string index, or the custom data of a barrier branch.
    #[inline]
    pub const fn target_index(&self) -> u32 {
        self.target_index
    }
}

#[cfg(test)]
mod tests;
