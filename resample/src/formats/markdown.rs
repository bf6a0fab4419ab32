//! Markdown table output

use std::io::Write;

use data_block::element::ElementImplRef;

use super::text::{escape, render};
use super::{Field, FormatSettings, RowOutputFormat};

/// Write the rows as a markdown table:
///
/// ```text
/// | name1 | name2 |
/// |:-:|:-:|
/// | value1 | value2 |
/// ```
#[derive(Debug)]
pub struct MarkdownRowOutputFormat {
    settings: FormatSettings,
}

impl MarkdownRowOutputFormat {
    /// Create a new markdown format
    pub fn new(settings: FormatSettings) -> Self {
        Self { settings }
    }

    fn write_text(&self, out: &mut dyn Write, text: &str) -> std::io::Result<()> {
        if self.settings.markdown.escape {
            out.write_all(escape(text, true).as_bytes())
        } else {
            out.write_all(text.as_bytes())
        }
    }
}

impl RowOutputFormat for MarkdownRowOutputFormat {
    fn name(&self) -> &'static str {
        "Markdown"
    }

    fn content_type(&self) -> String {
        "text/markdown; charset=UTF-8".to_string()
    }

    fn write_prefix(&mut self, out: &mut dyn Write, header: &[Field]) -> std::io::Result<()> {
        out.write_all(b"| ")?;
        for (index, field) in header.iter().enumerate() {
            if index != 0 {
                out.write_all(b" | ")?;
            }
            self.write_text(out, &field.name)?;
        }
        out.write_all(b" |\n|")?;
        for _ in header {
            out.write_all(b":-:|")?;
        }
        out.write_all(b"\n")
    }

    fn write_field(
        &mut self,
        out: &mut dyn Write,
        value: Option<ElementImplRef<'_>>,
    ) -> std::io::Result<()> {
        match value {
            Some(value) => self.write_text(out, &render(value)),
            None => out.write_all(self.settings.null_representation.as_bytes()),
        }
    }

    fn write_field_delimiter(&mut self, out: &mut dyn Write) -> std::io::Result<()> {
        out.write_all(b" | ")
    }

    fn write_row_start_delimiter(&mut self, out: &mut dyn Write) -> std::io::Result<()> {
        out.write_all(b"| ")
    }

    fn write_row_end_delimiter(&mut self, out: &mut dyn Write) -> std::io::Result<()> {
        out.write_all(b" |")
    }

    fn write_row_between_delimiter(&mut self, out: &mut dyn Write) -> std::io::Result<()> {
        out.write_all(b"\n")
    }

    fn write_suffix(&mut self, out: &mut dyn Write, rows: usize) -> std::io::Result<()> {
        if rows != 0 {
            out.write_all(b"\n")?;
        }
        Ok(())
    }
}
