//! Return value placement under a target's calling convention.
//!
//! [`classify_return_value`] takes a function (or function type) die and
//! answers with the fixed location expression its return value lives in.
//! Each target supplies a policy: location tables for the integer registers,
//! the floating-point register and the hidden aggregate pointer, plus the
//! size thresholds that pick between them.

mod i386;
mod s390;

use gimli::constants::*;
use thiserror::Error;
use tracing::{debug, trace};

use crate::dwarf::die::is_peelable;
use crate::dwarf::{Die, DwarfError};
use crate::formats::elf::{ElfClass, ElfMachine, ElfObject};
use crate::location::LocationOp;

/// Classification errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// The type chain could not be followed or lacks a required attribute.
    #[error("Malformed return type: {0}")]
    Malformed(#[from] DwarfError),

    /// The type is well-formed but this ABI has no rule for it.
    #[error("No return convention for {tag}")]
    Unclassifiable { tag: DwTag },
}

pub type Result<T> = std::result::Result<T, ClassifyError>;

/// Calling conventions with return-value tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetAbi {
    I386,
    /// 31-bit s390.
    S390,
    S390x,
}

impl TargetAbi {
    /// The convention used by objects for `machine` with the given class.
    pub fn for_machine(machine: ElfMachine, class: ElfClass) -> Option<Self> {
        match (machine, class) {
            (ElfMachine::X86, ElfClass::Elf32) => Some(TargetAbi::I386),
            (ElfMachine::S390, ElfClass::Elf32) => Some(TargetAbi::S390),
            (ElfMachine::S390, ElfClass::Elf64) => Some(TargetAbi::S390x),
            _ => None,
        }
    }

    /// The convention for an object's header, if it has one.
    pub fn for_object(object: &ElfObject<'_>) -> Option<Self> {
        Self::for_machine(object.machine()?, object.class())
    }

    pub fn name(&self) -> &'static str {
        match self {
            TargetAbi::I386 => "i386",
            TargetAbi::S390 => "s390",
            TargetAbi::S390x => "s390x",
        }
    }

    /// Width assumed for pointer types that omit `DW_AT_byte_size`.
    pub fn pointer_size(&self) -> u64 {
        self.policy().pointer_size
    }

    fn policy(&self) -> &'static AbiPolicy {
        match self {
            TargetAbi::I386 => &i386::POLICY,
            TargetAbi::S390 => &s390::POLICY_31,
            TargetAbi::S390x => &s390::POLICY_64,
        }
    }
}

/// What to do with a float too wide for the floating-point return register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OversizedFloat {
    Unclassifiable,
    /// Treat it like an integer of the same size.
    IntegerPath,
}

#[derive(Debug)]
struct AbiPolicy {
    pointer_size: u64,
    int_reg_size: u64,
    /// Widest scalar returned in the integer registers.
    max_int_size: u64,
    max_float_size: u64,
    oversized_float: OversizedFloat,
    /// Low register, piece, high register, piece.
    int_regs: &'static [LocationOp],
    fp_reg: &'static [LocationOp],
    aggregate: &'static [LocationOp],
}

/// Where a return value lives, as a fixed location expression. Empty for
/// functions returning void.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnLocation {
    ops: &'static [LocationOp],
}

impl ReturnLocation {
    pub const VOID: ReturnLocation = ReturnLocation { ops: &[] };

    pub fn ops(&self) -> &'static [LocationOp] {
        self.ops
    }

    pub fn count(&self) -> usize {
        self.ops.len()
    }

    pub fn is_void(&self) -> bool {
        self.ops.is_empty()
    }

    /// Each location op paired with the byte size of the `DW_OP_piece` that
    /// follows it, if any.
    pub fn pieces(&self) -> Vec<(LocationOp, Option<u64>)> {
        let mut out = Vec::new();
        let mut ops = self.ops.iter().peekable();
        while let Some(op) = ops.next() {
            let size = match ops.peek() {
                Some(next) if next.atom == DW_OP_piece => {
                    let size = next.number;
                    ops.next();
                    Some(size)
                }
                _ => None,
            };
            out.push((*op, size));
        }
        out
    }
}

/// Classify the return value of `func`, a subprogram, inlined subroutine
/// or subroutine type die.
pub fn classify_return_value(func: &Die<'_>, abi: TargetAbi) -> Result<ReturnLocation> {
    let policy = abi.policy();

    let Some(mut ty) = func.peeled_type()? else {
        trace!(die = func.offset(), "Void return");
        return Ok(ReturnLocation::VOID);
    };
    if ty.tag() == DW_TAG_subrange_type && !ty.has_attr(DW_AT_byte_size) {
        match ty.peeled_type()? {
            Some(element) => ty = element,
            None => {
                return Err(DwarfError::MissingAttribute {
                    die: ty.offset(),
                    attr: DW_AT_type,
                }
                .into())
            }
        }
    }

    let tag = ty.tag();
    let ops = match tag {
        // A qualifier with no type qualifies void.
        _ if is_peelable(tag) => ReturnLocation::VOID.ops,
        // A sized subrange is an integer of its own width.
        DW_TAG_base_type | DW_TAG_enumeration_type | DW_TAG_pointer_type
        | DW_TAG_ptr_to_member_type | DW_TAG_subrange_type => scalar(&ty, tag, policy)?,
        DW_TAG_structure_type | DW_TAG_class_type | DW_TAG_union_type
        | DW_TAG_array_type => policy.aggregate,
        _ => return Err(ClassifyError::Unclassifiable { tag }),
    };
    debug!(
        abi = abi.name(),
        die = func.offset(),
        return_type = %tag,
        ops = ops.len(),
        "Classified return value"
    );
    Ok(ReturnLocation { ops })
}

fn scalar(ty: &Die<'_>, tag: DwTag, policy: &'static AbiPolicy) -> Result<&'static [LocationOp]> {
    let size = match ty.byte_size()? {
        Some(size) => size,
        None if tag == DW_TAG_pointer_type || tag == DW_TAG_ptr_to_member_type => {
            policy.pointer_size
        }
        None => {
            return Err(DwarfError::MissingAttribute {
                die: ty.offset(),
                attr: DW_AT_byte_size,
            }
            .into())
        }
    };

    if tag == DW_TAG_base_type {
        let encoding = ty
            .attr_integrate(DW_AT_encoding)?
            .and_then(|a| a.udata())
            .ok_or(DwarfError::MissingAttribute {
                die: ty.offset(),
                attr: DW_AT_encoding,
            })?;
        if encoding == u64::from(DW_ATE_float.0) {
            if size <= policy.max_float_size {
                return Ok(policy.fp_reg);
            }
            if policy.oversized_float == OversizedFloat::Unclassifiable {
                return Err(ClassifyError::Unclassifiable { tag });
            }
        }
    }

    Ok(if size <= policy.int_reg_size {
        &policy.int_regs[..1]
    } else if size <= policy.max_int_size {
        policy.int_regs
    } else {
        policy.aggregate
    })
}
