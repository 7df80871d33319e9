//! Line-based three-way text merge.
//!
//! Classic diff3: both edited copies are diffed against the common base,
//! lines that survive unchanged in both copies anchor the merge, and the
//! regions between anchors are resolved independently. A region changed on
//! one side only takes that side; identical changes are taken once; anything
//! else is a conflict.
use std::fmt::Write as _;

use similar::{Algorithm, DiffOp, capture_diff_slices};

/// Label of the local-edit side in conflict markers.
const THEIRS_LABEL: &str = "rendered (local edits)";
/// Label of the common ancestor in conflict markers.
const BASE_LABEL: &str = "previous render";
/// Label of the fresh render in conflict markers.
const OURS_LABEL: &str = "template";

/// Result of [`merge3`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Merged text; conflicting regions keep the local edit.
    pub merged: String,
    /// Number of conflicting regions.
    pub conflicts: usize,
    /// Merged text with every conflicting region spelled out between
    /// `<<<<<<<`, `|||||||`, `=======` and `>>>>>>>` markers.
    pub annotated: String,
}

impl MergeOutcome {
    /// Whether any region could not be reconciled.
    #[must_use]
    pub const fn has_conflicts(&self) -> bool {
        self.conflicts > 0
    }
}

/// Map every base line that survives unchanged in `other` to its index there.
fn matches(base: &[&str], other: &[&str]) -> Vec<Option<usize>> {
    let mut map = vec![None; base.len()];
    for op in capture_diff_slices(Algorithm::Myers, base, other) {
        if let DiffOp::Equal {
            old_index,
            new_index,
            len,
        } = op
        {
            for k in 0..len {
                if let Some(slot) = map.get_mut(old_index + k) {
                    *slot = Some(new_index + k);
                }
            }
        }
    }
    map
}

fn span<'a>(lines: &'a [&'a str], from: usize, to: usize) -> &'a [&'a str] {
    lines.get(from..to).unwrap_or(&[])
}

fn push_lines(out: &mut String, lines: &[&str]) {
    for line in lines {
        out.push_str(line);
    }
}

/// Like [`push_lines`], but guarantees the block ends with a newline so a
/// marker that follows starts on its own line.
fn push_block(out: &mut String, lines: &[&str]) {
    push_lines(out, lines);
    if !lines.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Merge `theirs` (the rendered file as the user left it) and `ours` (the
/// fresh render) against `base` (the previous pure render).
#[must_use]
pub fn merge3(base: &str, theirs: &str, ours: &str) -> MergeOutcome {
    let o: Vec<&str> = base.split_inclusive('\n').collect();
    let a: Vec<&str> = theirs.split_inclusive('\n').collect();
    let b: Vec<&str> = ours.split_inclusive('\n').collect();
    let ma = matches(&o, &a);
    let mb = matches(&o, &b);

    let mut merged = String::with_capacity(ours.len().max(theirs.len()));
    let mut annotated = String::with_capacity(merged.capacity());
    let mut conflicts = 0;
    let (mut io, mut ia, mut ib) = (0, 0, 0);

    loop {
        // next base line present in both copies, at or after the cursor
        let anchor = (io..o.len()).find_map(|k| {
            let ak = ma.get(k).copied().flatten()?;
            let bk = mb.get(k).copied().flatten()?;
            Some((k, ak, bk))
        });
        let (eo, ea, eb) = anchor.unwrap_or((o.len(), a.len(), b.len()));

        let oc = span(&o, io, eo);
        let ac = span(&a, ia, ea);
        let bc = span(&b, ib, eb);
        if ac == oc {
            push_lines(&mut merged, bc);
            push_lines(&mut annotated, bc);
        } else if bc == oc || ac == bc {
            push_lines(&mut merged, ac);
            push_lines(&mut annotated, ac);
        } else {
            conflicts += 1;
            push_lines(&mut merged, ac);
            // writing to a String is infallible
            writeln!(annotated, "<<<<<<< {THEIRS_LABEL}").unwrap_or(());
            push_block(&mut annotated, ac);
            writeln!(annotated, "||||||| {BASE_LABEL}").unwrap_or(());
            push_block(&mut annotated, oc);
            annotated.push_str("=======\n");
            push_block(&mut annotated, bc);
            writeln!(annotated, ">>>>>>> {OURS_LABEL}").unwrap_or(());
        }

        if anchor.is_none() {
            break;
        }
        let line = o.get(eo).copied().unwrap_or_default();
        merged.push_str(line);
        annotated.push_str(line);
        io = eo + 1;
        ia = ea + 1;
        ib = eb + 1;
    }

    MergeOutcome {
        merged,
        conflicts,
        annotated,
    }
}
