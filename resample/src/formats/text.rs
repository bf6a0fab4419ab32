//! Text representation of the elements shared by the output formats

use std::fmt::Write;

use data_block::element::ElementImplRef;

/// Render the element as plain text. Top level string is written as is, strings nested
/// in the list are quoted with `'`
pub(super) fn render(value: ElementImplRef<'_>) -> String {
    let mut text = String::new();
    match value {
        ElementImplRef::String(v) => text.push_str(v),
        value => render_quoted(&mut text, Some(value)),
    }
    text
}

fn render_quoted(text: &mut String, value: Option<ElementImplRef<'_>>) {
    let Some(value) = value else {
        text.push_str("NULL");
        return;
    };

    // Write into String never fails
    let _ = match value {
        ElementImplRef::Int8(v) => write!(text, "{v}"),
        ElementImplRef::UInt8(v) => write!(text, "{v}"),
        ElementImplRef::Int16(v) => write!(text, "{v}"),
        ElementImplRef::UInt16(v) => write!(text, "{v}"),
        ElementImplRef::Int32(v) => write!(text, "{v}"),
        ElementImplRef::UInt32(v) => write!(text, "{v}"),
        ElementImplRef::Int64(v) => write!(text, "{v}"),
        ElementImplRef::UInt64(v) => write!(text, "{v}"),
        ElementImplRef::Float32(v) => render_float(text, v as f64),
        ElementImplRef::Float64(v) => render_float(text, v),
        ElementImplRef::Boolean(v) => write!(text, "{v}"),
        ElementImplRef::String(v) => {
            text.push('\'');
            for c in v.chars() {
                match c {
                    '\'' => text.push_str("\\'"),
                    '\\' => text.push_str("\\\\"),
                    c => text.push(c),
                }
            }
            text.push('\'');
            Ok(())
        }
        ElementImplRef::List(list) => {
            text.push('[');
            for (index, element) in list.iter().enumerate() {
                if index != 0 {
                    text.push(',');
                }
                render_quoted(text, element);
            }
            text.push(']');
            Ok(())
        }
    };
}

fn render_float(text: &mut String, v: f64) -> std::fmt::Result {
    if v.is_nan() {
        text.push_str("nan");
        Ok(())
    } else {
        write!(text, "{v}")
    }
}

/// Escape the backslash, tab, line feed and optionally the `|`
pub(super) fn escape(text: &str, escape_pipe: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\t' => escaped.push_str("\\t"),
            '\n' => escaped.push_str("\\n"),
            '|' if escape_pipe => escaped.push_str("\\|"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Quote the text with `"`, the quote inside is doubled
pub(super) fn csv_quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        if c == '"' {
            quoted.push('"');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use data_block::array::{ArrayImpl, ListArray, StringArray};
    use data_block::types::LogicalType;

    use super::*;

    #[test]
    fn test_render() {
        assert_eq!(render(ElementImplRef::Float64(1.0)), "1");
        assert_eq!(render(ElementImplRef::Float32(-0.5)), "-0.5");
        assert_eq!(render(ElementImplRef::Float64(f64::NAN)), "nan");
        assert_eq!(render(ElementImplRef::Float64(f64::NEG_INFINITY)), "-inf");
        assert_eq!(render(ElementImplRef::String("it's")), "it's");
        assert_eq!(render(ElementImplRef::Boolean(true)), "true");

        let mut list = ListArray::new(LogicalType::list_of(LogicalType::VarChar)).unwrap();
        {
            let elements = list.elements_mut();
            let strings =
                ArrayImpl::from(StringArray::from_iter([Some("it's"), None, Some("a\\b")]));
            for index in 0..strings.len() {
                elements.push(strings.get(index)).unwrap();
            }
        }
        list.push_offset();
        let list = ArrayImpl::from(list);
        assert_eq!(render(list.get(0).unwrap()), r"['it\'s',NULL,'a\\b']");
    }

    #[test]
    fn test_escape_and_quote() {
        assert_eq!(escape("a|b\tc\\\n", true), r"a\|b\tc\\\n");
        assert_eq!(escape("a|b", false), "a|b");
        assert_eq!(csv_quote(r#"say "hi""#), r#""say ""hi""""#);
    }
}
