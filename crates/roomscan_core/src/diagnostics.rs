//! Recovered problems encountered while decoding.
//!
//! Nothing in here is fatal. Each diagnostic is logged (unless the host's
//! filter hook suppresses it) and collected into the [`DecodeReport`] that
//! travels with the decoded scene.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

/// A problem the decoder recovered from.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    #[error("Unbalanced closing bracket at line {line}")]
    StructuralImbalance { line: usize },

    #[error("Array '{key}' is never closed; dropped")]
    UnterminatedArray { key: String },

    #[error("Reference '{path}' not found in archive")]
    UnresolvedReference { path: String },

    #[error("Reference '{path}' points at a binary crate layer")]
    UnsupportedReference { path: String },

    #[error("Reference cycle through '{path}' cut off")]
    ReferenceCycle { path: String },

    #[error("Mesh '{mesh}': skipped {faces} face(s) with {vertex_count} vertices")]
    DegenerateFace {
        mesh: String,
        vertex_count: i64,
        faces: usize,
    },

    #[error("Mesh '{mesh}': {occurrences} {attribute} index(es) out of range, first {index}")]
    IndexOutOfRange {
        mesh: String,
        attribute: String,
        index: i64,
        occurrences: usize,
    },

    #[error("Texture '{path}' not found in archive")]
    MissingTexture { path: String },

    #[error("Prim '{prim}' exceeds depth limit {limit}; subtree skipped")]
    DepthLimit { prim: String, limit: usize },

    #[error("Search for '{target}' gave up after visit budget was spent")]
    BudgetExhausted { target: String },
}

/// Host-provided filter deciding whether a diagnostic is logged.
///
/// Filtered diagnostics are still collected in the report.
pub type DiagnosticHook = Arc<dyn Fn(&Diagnostic) -> bool + Send + Sync>;

/// Diagnostics collected during one decode.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DecodeReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl DecodeReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Count diagnostics matching a predicate.
    pub fn count(&self, predicate: impl Fn(&Diagnostic) -> bool) -> usize {
        self.diagnostics.iter().filter(|d| predicate(d)).count()
    }
}

/// Collector threaded through every decoding stage.
#[derive(Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    hook: Option<DiagnosticHook>,
}

impl Diagnostics {
    pub fn new(hook: Option<DiagnosticHook>) -> Self {
        Self {
            entries: Vec::new(),
            hook,
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        let visible = self.hook.as_ref().map_or(true, |hook| hook(&diagnostic));
        if visible {
            log::warn!("{}", diagnostic);
        } else {
            log::trace!("(filtered) {}", diagnostic);
        }
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn into_report(self) -> DecodeReport {
        DecodeReport {
            diagnostics: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_filtered_diagnostics_still_collected() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let hook: DiagnosticHook = Arc::new(move |d| {
            counter.fetch_add(1, Ordering::SeqCst);
            !matches!(d, Diagnostic::DegenerateFace { .. })
        });

        let mut diagnostics = Diagnostics::new(Some(hook));
        diagnostics.push(Diagnostic::DegenerateFace {
            mesh: "Wall0".into(),
            vertex_count: 5,
            faces: 2,
        });
        diagnostics.push(Diagnostic::StructuralImbalance { line: 3 });

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        let report = diagnostics.into_report();
        assert_eq!(report.len(), 2);
        assert_eq!(
            report.count(|d| matches!(d, Diagnostic::DegenerateFace { .. })),
            1
        );
    }

    #[test]
    fn test_diagnostic_messages() {
        let d = Diagnostic::UnresolvedReference {
            path: "assets/door.usda".into(),
        };
        assert_eq!(d.to_string(), "Reference 'assets/door.usda' not found in archive");
    }
}
