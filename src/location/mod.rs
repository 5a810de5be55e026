//! DWARF location expressions.
//!
//! [`decode_expression`] turns expression bytes into [`LocationOp`]s.
//! [`resolve_location_op`] answers, for the operators that denote a value
//! held somewhere else, which attribute that value lives in.

pub mod decode;
pub mod resolve;

use gimli::constants::DwOp;

use crate::cursor::Endian;
use crate::dwarf::{Attribute, DwarfError, Result};

pub use decode::decode_expression;
pub use resolve::{resolve_location_op, ResolvedOp};

/// One decoded operator.
///
/// `number` and `number2` are the operands in encoding order. For operators
/// with an inline block the second operand is a byte position within the
/// expression: `implicit_value` and `entry_value` hold `(length, start)`,
/// `const_type` holds `(type offset, position of the length byte)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocationOp {
    pub atom: DwOp,
    pub number: u64,
    pub number2: u64,
    /// Byte offset of the operator within its expression.
    pub offset: u64,
}

impl LocationOp {
    pub const fn new(atom: DwOp, number: u64, number2: u64, offset: u64) -> Self {
        Self {
            atom,
            number,
            number2,
            offset,
        }
    }

    /// An operator with a single operand at offset 0, as used in fixed
    /// location tables.
    pub const fn simple(atom: DwOp, number: u64) -> Self {
        Self::new(atom, number, 0, 0)
    }
}

/// An attribute synthesized from part of another attribute's expression.
/// Its block borrows the source bytes until [`Attribute::into_owned`].
pub type SyntheticAttribute<'a> = Attribute<'a>;

impl Attribute<'_> {
    /// Decode an `exprloc` or block attribute as a location expression.
    pub fn location_ops(&self, endian: Endian) -> Result<Vec<LocationOp>> {
        let bytes = self.block().ok_or(DwarfError::UnexpectedForm {
            code: self.code,
            form: self.form,
            expected: "expression",
        })?;
        decode_expression(bytes, self.encoding, endian)
    }
}
