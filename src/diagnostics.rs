//! Where the parser reports recoverable problems.

use crate::error::Diagnostic;

/// Sink for [`Diagnostic`]s raised while building a document.
pub trait Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Forwards every diagnostic to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        log::log!(diagnostic.level(), "{}", diagnostic);
    }
}

impl Diagnostics for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Logs diagnostics and keeps them for the caller.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub diagnostics: Vec<Diagnostic>,
}

impl Diagnostics for Recorder {
    fn report(&mut self, diagnostic: Diagnostic) {
        LogDiagnostics.report(diagnostic.clone());
        self.diagnostics.push(diagnostic);
    }
}

impl<D: Diagnostics + ?Sized> Diagnostics for &mut D {
    fn report(&mut self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_keeps_order() {
        let mut recorder = Recorder::default();
        recorder.report(Diagnostic::DanglingTie { measure: 1, code: 'q' });
        recorder.report(Diagnostic::MissingAnchor { measure: 2, ornament: "Bend" });
        let measures: Vec<usize> = recorder.diagnostics.iter().map(Diagnostic::measure).collect();
        assert_eq!(measures, vec![1, 2]);
    }

    #[test]
    fn test_borrowed_sink_reports_into_owner() {
        fn feed<D: Diagnostics>(mut sink: D) {
            sink.report(Diagnostic::DanglingTie { measure: 4, code: 'e' });
        }
        let mut collected: Vec<Diagnostic> = Vec::new();
        feed(&mut collected);
        assert_eq!(collected.len(), 1);
    }
}
