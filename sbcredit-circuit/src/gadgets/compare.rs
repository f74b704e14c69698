// sbcredit-circuit/src/gadgets/compare.rs

use halo2_base::{
    gates::{
        flex_gate::{GateChip, GateInstructions},
        range::{RangeChip, RangeInstructions},
    },
    AssignedValue, Context,
};
use halo2curves_axiom::{bn256::Fr, ff::Field};

/// Bit width both comparison operands are range checked to before comparing.
pub const COMPARE_BITS: usize = 64;

/// Enforce a >= b for 64-bit encoded values.
///
/// Both operands must already be range checked to `COMPARE_BITS`; `is_less_than`
/// is only sound for bounded inputs.
pub fn enforce_geq(
    ctx: &mut Context<Fr>,
    gate: &GateChip<Fr>,
    range: &RangeChip<Fr>,
    a: AssignedValue<Fr>,
    b: AssignedValue<Fr>,
) {
    let lt = range.is_less_than(ctx, a, b, COMPARE_BITS);
    gate.assert_is_const(ctx, &lt, &Fr::ZERO);
}
