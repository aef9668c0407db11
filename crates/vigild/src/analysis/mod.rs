//! Local analysis: deterministic rules and score derivation.

pub mod rules;
pub mod scoring;
