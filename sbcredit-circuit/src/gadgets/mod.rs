// sbcredit-circuit/src/gadgets/mod.rs

pub mod compare;
pub mod poseidon;
