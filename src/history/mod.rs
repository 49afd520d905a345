// src/history/mod.rs

//! Bookkeeping of consumed source files: the persisted state record and
//! the per-quarter reconciliation that decides which files are current.

pub mod reconcile;
pub mod record;

pub use reconcile::{
    apply_plan, new_files, plan_update, remove_snapshots, Applied, Replacement, SourceFile, UpdatePlan,
};
pub use record::FileStateRecord;
