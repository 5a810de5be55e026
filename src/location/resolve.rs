//! Nested-value resolution for location operators.

use gimli::constants::*;
use tracing::trace;

use crate::buffer::DataBuffer;
use crate::dwarf::{Attribute, AttributeValue, DebugInfo, Die, DwarfError, Result};
use crate::location::{LocationOp, SyntheticAttribute};

/// Where the value denoted by an operator lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedOp<'a> {
    Attribute(SyntheticAttribute<'a>),
    /// The operator refers to a die that has neither a location nor a value.
    EmptyLocation,
}

impl<'a> ResolvedOp<'a> {
    pub fn attribute(&self) -> Option<&SyntheticAttribute<'a>> {
        match self {
            ResolvedOp::Attribute(a) => Some(a),
            ResolvedOp::EmptyLocation => None,
        }
    }

    pub fn is_empty_location(&self) -> bool {
        matches!(self, ResolvedOp::EmptyLocation)
    }
}

/// Resolve the value an operator of `attr`'s expression refers to.
///
/// Inline-block operators yield an attribute over the block, borrowing
/// `attr`'s bytes and belonging to `attr`'s unit. Reference operators look
/// up the target die, which may live in another unit. Operators that do not
/// denote a nested value fail with [`DwarfError::InvalidOperator`].
pub fn resolve_location_op<'a>(
    dwarf: &'a DebugInfo<'a>,
    attr: &Attribute<'a>,
    op: &LocationOp,
) -> Result<ResolvedOp<'a>> {
    trace!(op = %op.atom, offset = op.offset, "Resolving location operator");
    match op.atom {
        DW_OP_implicit_value => {
            let attr = inline_block(attr, op, op.number2, op.number, DW_AT_const_value, DW_FORM_block)?;
            Ok(ResolvedOp::Attribute(attr))
        }
        DW_OP_entry_value | DW_OP_GNU_entry_value => {
            let attr = inline_block(attr, op, op.number2, op.number, DW_AT_location, DW_FORM_exprloc)?;
            Ok(ResolvedOp::Attribute(attr))
        }
        DW_OP_const_type | DW_OP_GNU_const_type => {
            let bytes = expression(attr)?;
            let len = usize::try_from(op.number2)
                .ok()
                .and_then(|at| bytes.get(at))
                .copied()
                .ok_or_else(|| invalid_operand(op))?;
            let attr = inline_block(
                attr,
                op,
                op.number2 + 1,
                u64::from(len),
                DW_AT_const_value,
                DW_FORM_block1,
            )?;
            Ok(ResolvedOp::Attribute(attr))
        }
        DW_OP_call2 | DW_OP_call4 => {
            let target = dwarf.die_at_unit_offset(attr.unit, op.number)?;
            first_present(&target, &[DW_AT_location])
        }
        DW_OP_call_ref => {
            let target = dwarf.die_at(op.number)?;
            first_present(&target, &[DW_AT_location])
        }
        DW_OP_GNU_variable_value | DW_OP_implicit_pointer | DW_OP_GNU_implicit_pointer => {
            let target = dwarf.die_at(op.number)?;
            first_present(&target, &[DW_AT_location, DW_AT_const_value])
        }
        other => Err(DwarfError::InvalidOperator(other)),
    }
}

fn expression<'b, 'a>(attr: &'b Attribute<'a>) -> Result<&'b DataBuffer<'a>> {
    attr.block().ok_or(DwarfError::UnexpectedForm {
        code: attr.code,
        form: attr.form,
        expected: "expression",
    })
}

fn invalid_operand(op: &LocationOp) -> DwarfError {
    DwarfError::InvalidOperand {
        op: op.atom,
        offset: op.offset,
    }
}

/// An attribute over `len` bytes at `start` within `attr`'s expression.
fn inline_block<'a>(
    attr: &Attribute<'a>,
    op: &LocationOp,
    start: u64,
    len: u64,
    code: DwAt,
    form: DwForm,
) -> Result<SyntheticAttribute<'a>> {
    let bytes = expression(attr)?;
    let block = start
        .checked_add(len)
        .and_then(|end| {
            let start = usize::try_from(start).ok()?;
            let end = usize::try_from(end).ok()?;
            bytes.slice(start, end)
        })
        .ok_or_else(|| invalid_operand(op))?;
    let value = if form == DW_FORM_exprloc {
        AttributeValue::Exprloc(block)
    } else {
        AttributeValue::Block(block)
    };
    Ok(Attribute {
        code,
        form,
        value,
        unit: attr.unit,
        encoding: attr.encoding,
    })
}

/// The first of `codes` the die carries, else an empty location.
fn first_present<'a>(die: &Die<'a>, codes: &[DwAt]) -> Result<ResolvedOp<'a>> {
    for &code in codes {
        if let Some(found) = die.attr(code)? {
            return Ok(ResolvedOp::Attribute(found));
        }
    }
    trace!(die = die.offset(), "Referenced die has no location");
    Ok(ResolvedOp::EmptyLocation)
}
