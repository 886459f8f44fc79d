use std::ops::Range;

/// Byte offsets into a single source field.
pub(crate) type Span = Range<usize>;

pub(crate) fn extract_span<'a>(body: &'a str, span: &Span) -> &'a str {
    &body[span.start..span.end]
}

/// True when `right` begins exactly where `left` ends, that is, the
/// two tokens are not separated by anything.
pub(crate) fn adjacent(left: &Span, right: &Span) -> bool {
    left.end == right.start
}

#[test]
fn test_extract_span() {
    assert_eq!(extract_span("A1 A2+A3", &(3..5)), "A2");
}

#[test]
fn test_adjacent() {
    assert!(adjacent(&(0..1), &(1..3)));
    assert!(!adjacent(&(0..1), &(2..3)));
}
