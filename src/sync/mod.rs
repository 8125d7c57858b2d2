//! Tree differ and applier: snapshot both trees, diff them, apply the plan.

pub mod apply;
pub mod checksum;
pub mod engine;
pub mod plan;
pub mod snapshot;
