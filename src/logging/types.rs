//! Core logging types: per-entry outcomes and the [`Log`] trait.

/// Outcome of one entry in a reconciliation pass, kept for the summary.
#[derive(Debug, Clone)]
pub struct EntryOutcome {
    /// `application/entry` label.
    pub name: String,
    /// Final status.
    pub status: EntryStatus,
    /// Optional detail (skip reason or error chain).
    pub message: Option<String>,
}

/// Status of a processed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// The entry reached its desired state (possibly without changes).
    Ok,
    /// The entry does not apply here (filtered out, no target for this OS,
    /// neither side exists, or an out-of-scope kind).
    NotApplicable,
    /// The entry was skipped for a reason worth surfacing.
    Skipped,
    /// Dry-run: actions were reported but not applied.
    DryRun,
    /// The entry failed; the pass continued with the next one.
    Failed,
}

impl EntryStatus {
    /// Summary glyph and its ANSI color.
    #[must_use]
    pub const fn glyph(self) -> (&'static str, &'static str) {
        match self {
            Self::Ok => ("✓", "\x1b[32m"),
            Self::NotApplicable => ("·", "\x1b[2m"),
            Self::Skipped => ("○", "\x1b[33m"),
            Self::DryRun => ("~", "\x1b[37m"),
            Self::Failed => ("✗", "\x1b[31m"),
        }
    }
}

/// Per-status totals of a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    /// Entries that reached their desired state.
    pub ok: usize,
    /// Entries that did not apply.
    pub not_applicable: usize,
    /// Entries skipped with a reason.
    pub skipped: usize,
    /// Entries only reported under dry run.
    pub dry_run: usize,
    /// Entries that failed.
    pub failed: usize,
}

impl StatusCounts {
    /// Count one more entry with `status`.
    pub const fn add(&mut self, status: EntryStatus) {
        match status {
            EntryStatus::Ok => self.ok += 1,
            EntryStatus::NotApplicable => self.not_applicable += 1,
            EntryStatus::Skipped => self.skipped += 1,
            EntryStatus::DryRun => self.dry_run += 1,
            EntryStatus::Failed => self.failed += 1,
        }
    }

    /// Count `outcomes` by status.
    #[must_use]
    pub fn tally(outcomes: &[EntryOutcome]) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            counts.add(outcome.status);
        }
        counts
    }

    /// Number of entries counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.ok + self.not_applicable + self.skipped + self.dry_run + self.failed
    }
}

/// Abstraction over logging back-ends.
///
/// Engine code logs through this trait so tests can capture messages without
/// installing a global subscriber.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (suppressed on console unless verbose).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a "would do X" message for a mutation skipped by dry-run.
    fn dry_run(&self, msg: &str);
    /// Record an entry outcome for the summary.
    fn record_entry(&self, name: &str, status: EntryStatus, message: Option<&str>);
}
