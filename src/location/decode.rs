//! DWARF expression decoding, on top of `gimli::Operation::parse`.

use gimli::constants::*;
use gimli::{DieReference, Encoding, Operation, Reader, RunTimeEndian};

use crate::cursor::Endian;
use crate::dwarf::{DwarfError, Result, Slice};
use crate::location::LocationOp;

/// Decode a whole expression into its operations.
///
/// Signed operands are stored two's-complement in the `u64` operand slots.
/// Operators that carry an inline block (`implicit_value`, `entry_value`,
/// `const_type`) record the block's position within `bytes` instead of
/// copying it; see [`LocationOp`].
pub fn decode_expression(bytes: &[u8], encoding: Encoding, endian: Endian) -> Result<Vec<LocationOp>> {
    let base = Slice::new(bytes, RunTimeEndian::from(endian));
    let mut input = base;
    let mut ops = Vec::new();
    while !input.is_empty() {
        ops.push(decode_op(&base, &mut input, encoding)?);
    }
    Ok(ops)
}

fn decode_op<'a>(base: &Slice<'a>, input: &mut Slice<'a>, encoding: Encoding) -> Result<LocationOp> {
    let offset = input.offset_from(*base);
    let code = input.slice().first().copied().unwrap_or_default();
    let atom = DwOp(code);
    let op = |number: u64, number2: u64| LocationOp {
        atom,
        number,
        number2,
        offset: offset as u64,
    };
    let invalid = |e: gimli::Error| match e {
        gimli::Error::InvalidExpression(DwOp(op)) => DwarfError::UnknownOperator { op, offset },
        _ => DwarfError::InvalidOperand {
            op: atom,
            offset: offset as u64,
        },
    };
    let position = |r: &Slice<'a>| r.offset_from(*base) as u64;

    // DWARF 2 sizes .debug_info references by address; gimli reads them as
    // offsets in every version.
    if encoding.version <= 2 && matches!(atom, DW_OP_call_ref | DW_OP_GNU_variable_value) {
        input.skip(1).map_err(invalid)?;
        let target = input.read_address(encoding.address_size).map_err(invalid)?;
        return Ok(op(target, 0));
    }

    let parsed = Operation::parse(input, encoding).map_err(invalid)?;
    let lit = (DW_OP_lit0.0..=DW_OP_lit31.0).contains(&code);
    let reg = (DW_OP_reg0.0..=DW_OP_reg31.0).contains(&code);
    Ok(match parsed {
        Operation::Address { address } => op(address, 0),
        Operation::UnsignedConstant { .. } if lit => op(0, 0),
        Operation::UnsignedConstant { value } => op(value, 0),
        Operation::SignedConstant { value } => op(value as u64, 0),
        Operation::PlusConstant { value } => op(value, 0),
        Operation::Pick { index } if atom == DW_OP_pick => op(u64::from(index), 0),
        Operation::Register { .. } if reg => op(0, 0),
        Operation::Register { register } => op(u64::from(register.0), 0),
        Operation::RegisterOffset {
            register,
            offset,
            base_type,
        } => match atom {
            DW_OP_bregx => op(u64::from(register.0), offset as u64),
            DW_OP_regval_type | DW_OP_GNU_regval_type => {
                op(u64::from(register.0), base_type.0 as u64)
            }
            _ => op(offset as u64, 0),
        },
        Operation::FrameOffset { offset } => op(offset as u64, 0),
        Operation::Deref {
            base_type, size, ..
        } => match atom {
            DW_OP_deref_size | DW_OP_xderef_size => op(u64::from(size), 0),
            DW_OP_deref_type | DW_OP_GNU_deref_type | DW_OP_xderef_type => {
                op(u64::from(size), base_type.0 as u64)
            }
            _ => op(0, 0),
        },
        Operation::Bra { target } | Operation::Skip { target } => op(target as i64 as u64, 0),
        Operation::Piece {
            size_in_bits,
            bit_offset,
        } => match bit_offset {
            Some(bit_offset) => op(size_in_bits, bit_offset),
            None => op(size_in_bits / 8, 0),
        },
        Operation::Call {
            offset: DieReference::UnitRef(target),
        } => op(target.0 as u64, 0),
        Operation::Call {
            offset: DieReference::DebugInfoRef(target),
        } => op(target.0 as u64, 0),
        Operation::VariableValue { offset } => op(offset.0 as u64, 0),
        Operation::ImplicitPointer { value, byte_offset } => {
            op(value.0 as u64, byte_offset as u64)
        }
        Operation::ParameterRef { offset } => op(offset.0 as u64, 0),
        Operation::AddressIndex { index } | Operation::ConstantIndex { index } => {
            op(index.0 as u64, 0)
        }
        Operation::Convert { base_type } | Operation::Reinterpret { base_type } => {
            op(base_type.0 as u64, 0)
        }
        // Length, then the position of the inline bytes.
        Operation::ImplicitValue { data } => op(data.len() as u64, position(&data)),
        Operation::EntryValue { expression } => {
            op(expression.len() as u64, position(&expression))
        }
        // Type die offset, then the position of the one-byte length that
        // prefixes the constant.
        Operation::TypedLiteral { base_type, value } => {
            op(base_type.0 as u64, position(&value) - 1)
        }
        Operation::WasmLocal { index }
        | Operation::WasmGlobal { index }
        | Operation::WasmStack { index } => op(u64::from(index), 0),
        _ => op(0, 0),
    })
}
