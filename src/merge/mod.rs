//! Merge machinery: whole-tree folding of live content into the backup and
//! line-based three-way merging of single files.
mod three_way;
mod tree;

pub use three_way::{MergeOutcome, merge3};
pub use tree::{MergeSummary, conflict_name, merge_file, merge_tree, today};
