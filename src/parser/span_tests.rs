use super::*;

fn source(text: &str) -> SourceFile {
    SourceFile::new(PathBuf::from("mod.py"), text.to_string())
}

#[test]
fn test_line_col() {
    let source = source("x = 1\ny = 2\nz = 3");

    assert_eq!(source.line_col(0), (1, 1));
    assert_eq!(source.line_col(5), (1, 6));
    assert_eq!(source.line_col(6), (2, 1));
    assert_eq!(source.line_col(12), (3, 1));
}

#[test]
fn test_get_line_strips_carriage_return() {
    let source = source("a = 1\r\nb = 2\r\n");

    assert_eq!(source.get_line(1), Some("a = 1"));
    assert_eq!(source.get_line(2), Some("b = 2"));
    assert_eq!(source.get_line(3), Some(""));
    assert_eq!(source.get_line(4), None);
}

#[test]
fn test_span() {
    let source = source("def f(x): pass");

    let span = source.span(4, 5);
    assert_eq!(span.file, PathBuf::from("mod.py"));
    assert_eq!((span.start_line, span.start_col), (1, 5));
    assert_eq!((span.end_line, span.end_col), (1, 6));
}

#[test]
fn test_eof_span() {
    let source = source("x\n");
    let span = source.eof_span();
    assert_eq!(span.start, 2);
    assert_eq!(span.start_line, 2);
}
