//! i386 System V return conventions.
//!
//! Integers come back in `%eax`, or `%eax:%edx` when eight bytes wide.
//! Floats come back in `%st(0)`. Aggregates are written through a hidden
//! pointer that the callee echoes back in `%eax`.

use gimli::constants::*;

use super::{AbiPolicy, OversizedFloat};
use crate::location::LocationOp;

const INT_REGS: [LocationOp; 4] = [
    LocationOp::simple(DW_OP_reg0, 0),
    LocationOp::simple(DW_OP_piece, 4),
    LocationOp::simple(DW_OP_reg2, 0),
    LocationOp::simple(DW_OP_piece, 4),
];

// %st(0) is DWARF register 11.
const FP_REG: [LocationOp; 1] = [LocationOp::simple(DW_OP_reg11, 0)];

const AGGREGATE: [LocationOp; 1] = [LocationOp::simple(DW_OP_breg0, 0)];

pub(super) const POLICY: AbiPolicy = AbiPolicy {
    pointer_size: 4,
    int_reg_size: 4,
    max_int_size: 8,
    max_float_size: 16,
    oversized_float: OversizedFloat::Unclassifiable,
    int_regs: &INT_REGS,
    fp_reg: &FP_REG,
    aggregate: &AGGREGATE,
};
