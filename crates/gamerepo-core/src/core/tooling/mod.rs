//! Outcome shaping for command front ends.

pub mod outcome;
