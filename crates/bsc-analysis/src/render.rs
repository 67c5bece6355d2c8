//! Pretty-printed diagnostic reports, gated behind `display-diagnostics`
//! (spec.md §2). Grounded in apollo-compiler's `diagnostic.rs`: one ariadne
//! [`ariadne::Report`] per diagnostic, a primary label at the diagnostic's
//! own range, secondary labels for its related locations, all resolved
//! against a source cache keyed by file path.

use ariadne::{Color, Label, Report, ReportKind};
use bsc_parser::{Diagnostic, Position, Severity};
use std::collections::HashMap;
use std::io;

fn report_kind(severity: Severity) -> ReportKind<'static> {
    match severity {
        Severity::Error => ReportKind::Error,
        Severity::Warn => ReportKind::Warning,
        Severity::Info | Severity::Hint => ReportKind::Advice,
    }
}

fn label_color(severity: Severity) -> Color {
    match severity {
        Severity::Error => Color::Red,
        Severity::Warn => Color::Yellow,
        Severity::Info | Severity::Hint => Color::Blue,
    }
}

/// Maps a line/column position to a byte offset in `source`, clamping to the
/// source's length rather than panicking on an out-of-range position.
fn byte_offset(source: &str, position: Position) -> usize {
    let mut offset = 0usize;
    for (line_no, line) in source.split('\n').enumerate() {
        if line_no as u32 == position.line {
            return offset + (position.column as usize).min(line.len());
        }
        offset += line.len() + 1;
    }
    source.len()
}

fn span(source: &str, range: bsc_parser::SourceRange) -> std::ops::Range<usize> {
    let start = byte_offset(source, range.start);
    let end = byte_offset(source, range.end).max(start + 1);
    start..end
}

/// Renders every diagnostic in `diagnostics` as an ariadne report and
/// appends the bytes to one buffer, in order. `sources` must map every
/// `file` referenced by a diagnostic (directly or via a related location)
/// to the exact text it was produced from.
pub fn render(diagnostics: &[Diagnostic], sources: &HashMap<String, String>) -> io::Result<String> {
    let cache: Vec<(String, String)> = sources.iter().map(|(path, text)| (path.clone(), text.clone())).collect();

    let mut out = Vec::new();
    for diagnostic in diagnostics {
        let Some(source) = sources.get(&diagnostic.file) else { continue };
        let primary_span = span(source, diagnostic.range);

        let mut builder = Report::build(report_kind(diagnostic.severity), diagnostic.file.clone(), primary_span.start)
            .with_code(diagnostic.code)
            .with_message(&diagnostic.message)
            .with_label(
                Label::new((diagnostic.file.clone(), primary_span)).with_message(&diagnostic.message).with_color(label_color(diagnostic.severity)),
            );

        for related in &diagnostic.related_information {
            if let Some(related_source) = sources.get(&related.file) {
                builder = builder.with_label(
                    Label::new((related.file.clone(), span(related_source, related.range)))
                        .with_message(&related.message)
                        .with_color(Color::Cyan),
                );
            }
        }

        builder.finish().write(ariadne::sources(cache.clone()), &mut out)?;
    }
    String::from_utf8(out).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::codes;
    use bsc_parser::SourceRange;

    #[test]
    fn renders_one_report_per_diagnostic() {
        let mut sources = HashMap::new();
        sources.insert("f.brs".to_string(), "sub main()\n  doThing()\nend sub\n".to_string());

        let diagnostics = vec![Diagnostic::new(
            codes::CALL_TO_UNKNOWN_FUNCTION,
            Severity::Error,
            "call to unknown function `doThing`",
            SourceRange::new(Position::new(1, 2), Position::new(1, 10)),
            "f.brs",
        )];

        let rendered = render(&diagnostics, &sources).expect("render succeeds");
        assert!(rendered.contains("doThing"));
    }

    #[test]
    fn renders_related_location_label() {
        let mut sources = HashMap::new();
        sources.insert("child.brs".to_string(), "function greet()\nend function\n".to_string());
        sources.insert("parent.brs".to_string(), "function greet()\nend function\n".to_string());

        let diagnostic = Diagnostic::new(
            codes::OVERRIDES_ANCESTOR_FUNCTION,
            Severity::Info,
            "overrides ancestor function `greet`",
            SourceRange::new(Position::new(0, 9), Position::new(0, 14)),
            "child.brs",
        )
        .with_related(bsc_parser::diagnostic::RelatedLocation {
            file: "parent.brs".to_string(),
            range: SourceRange::new(Position::new(0, 9), Position::new(0, 14)),
            message: "ancestor declaration".to_string(),
        });

        let rendered = render(&[diagnostic], &sources).expect("render succeeds");
        assert!(rendered.contains("ancestor declaration"));
    }
}
