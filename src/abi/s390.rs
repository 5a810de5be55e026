//! s390 and s390x ELF return conventions.
//!
//! Integers up to eight bytes come back in `%r2`, split across `%r2:%r3` on
//! 31-bit targets. Floats up to eight bytes use `%f0`. Everything wider is
//! returned in memory addressed by `%r2`.

use gimli::constants::*;

use super::{AbiPolicy, OversizedFloat};
use crate::location::LocationOp;

const INT_REGS: [LocationOp; 4] = [
    LocationOp::simple(DW_OP_reg2, 0),
    LocationOp::simple(DW_OP_piece, 4),
    LocationOp::simple(DW_OP_reg3, 0),
    LocationOp::simple(DW_OP_piece, 4),
];

// %f0 is DWARF register 16.
const FP_REG: [LocationOp; 1] = [LocationOp::simple(DW_OP_reg16, 0)];

const AGGREGATE: [LocationOp; 1] = [LocationOp::simple(DW_OP_breg2, 0)];

pub(super) const POLICY_31: AbiPolicy = AbiPolicy {
    pointer_size: 4,
    int_reg_size: 4,
    max_int_size: 8,
    max_float_size: 8,
    oversized_float: OversizedFloat::IntegerPath,
    int_regs: &INT_REGS,
    fp_reg: &FP_REG,
    aggregate: &AGGREGATE,
};

pub(super) const POLICY_64: AbiPolicy = AbiPolicy {
    pointer_size: 8,
    int_reg_size: 8,
    ..POLICY_31
};
