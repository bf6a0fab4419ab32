//! Row oriented output formats
//!
//! A [`RowOutputFormat`] only knows how to write the delimiters and the fields, the
//! [`RowOutputWriter`] drives it: it writes the prefix lazily, iterates the rows of the
//! [`DataBlock`]s and calls the hooks in order
//!
//! ```text
//! prefix
//! row_start field field_delimiter field ... row_end
//! row_between
//! row_start field field_delimiter field ... row_end
//! before_totals row after_totals
//! before_extremes min max after_extremes
//! suffix
//! ```

pub mod csv;
pub mod markdown;
mod text;

use std::fmt::Debug;
use std::io::Write;

use data_block::block::DataBlock;
use data_block::element::ElementImplRef;
use data_block::types::LogicalType;
use snafu::{ResultExt, Snafu, ensure};

pub use self::csv::CsvRowOutputFormat;
pub use self::markdown::MarkdownRowOutputFormat;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum FormatError {
    #[snafu(display("Failed to write the `{format}` output"))]
    Io {
        format: &'static str,
        source: std::io::Error,
    },
    #[snafu(display(
        "`{format}` output has `{expect}` columns, however the data block has `{actual}` arrays"
    ))]
    ColumnCountMismatch {
        format: &'static str,
        expect: usize,
        actual: usize,
    },
    #[snafu(display("`{format}` output does not support the {kind} block"))]
    Unsupported {
        format: &'static str,
        kind: &'static str,
    },
    #[snafu(display("Extremes block should have exactly 2 rows, found `{rows}` rows"))]
    InvalidExtremes { rows: usize },
}

type Result<T> = std::result::Result<T, FormatError>;

/// Column in the header of the output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Name of the column
    pub name: String,
    /// Logical type of the column
    pub logical_type: LogicalType,
}

impl Field {
    /// Create a new field
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
        }
    }
}

/// Settings of the CSV output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvSettings {
    /// Delimiter between fields
    pub delimiter: u8,
    /// Use `\r\n` as line ending
    pub crlf_end_of_line: bool,
    /// Write the names of the columns in the first line
    pub with_names: bool,
    /// Write the types of the columns in the next line
    pub with_types: bool,
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            delimiter: b',',
            crlf_end_of_line: false,
            with_names: true,
            with_types: false,
        }
    }
}

/// Settings of the Markdown output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownSettings {
    /// Escape `\`, tab, line feed and `|` in the values. Disabling it may break the table
    pub escape: bool,
}

impl Default for MarkdownSettings {
    fn default() -> Self {
        Self { escape: true }
    }
}

/// Settings shared by all of the output formats
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSettings {
    /// CSV specific settings
    pub csv: CsvSettings,
    /// Markdown specific settings
    pub markdown: MarkdownSettings,
    /// How the top level `NULL` is written
    pub null_representation: String,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            csv: CsvSettings::default(),
            markdown: MarkdownSettings::default(),
            null_representation: "\\N".to_string(),
        }
    }
}

/// Hooks of the row oriented output format. All of the hooks except `write_field` do
/// nothing by default
pub trait RowOutputFormat: Debug {
    /// Name of the format
    fn name(&self) -> &'static str;

    /// MIME type of the output
    fn content_type(&self) -> String {
        "text/plain; charset=UTF-8".to_string()
    }

    /// Write the header before any row
    fn write_prefix(&mut self, _out: &mut dyn Write, _header: &[Field]) -> std::io::Result<()> {
        Ok(())
    }

    /// Write the value in the row, `None` is `NULL`
    fn write_field(
        &mut self,
        out: &mut dyn Write,
        value: Option<ElementImplRef<'_>>,
    ) -> std::io::Result<()>;

    /// Write the delimiter between fields
    fn write_field_delimiter(&mut self, _out: &mut dyn Write) -> std::io::Result<()> {
        Ok(())
    }

    /// Write the delimiter before each row
    fn write_row_start_delimiter(&mut self, _out: &mut dyn Write) -> std::io::Result<()> {
        Ok(())
    }

    /// Write the delimiter after each row
    fn write_row_end_delimiter(&mut self, _out: &mut dyn Write) -> std::io::Result<()> {
        Ok(())
    }

    /// Write the delimiter between rows
    fn write_row_between_delimiter(&mut self, _out: &mut dyn Write) -> std::io::Result<()> {
        Ok(())
    }

    /// Write the footer after all of the rows
    fn write_suffix(&mut self, _out: &mut dyn Write, _rows: usize) -> std::io::Result<()> {
        Ok(())
    }

    /// Can the format write the totals block
    fn supports_totals(&self) -> bool {
        false
    }

    /// Can the format write the extremes block
    fn supports_extremes(&self) -> bool {
        false
    }

    /// Write the delimiter before the totals block
    fn write_before_totals(&mut self, _out: &mut dyn Write) -> std::io::Result<()> {
        Ok(())
    }

    /// Write the delimiter after the totals block
    fn write_after_totals(&mut self, _out: &mut dyn Write) -> std::io::Result<()> {
        Ok(())
    }

    /// Write the delimiter before the extremes block
    fn write_before_extremes(&mut self, _out: &mut dyn Write) -> std::io::Result<()> {
        Ok(())
    }

    /// Write the delimiter after the extremes block
    fn write_after_extremes(&mut self, _out: &mut dyn Write) -> std::io::Result<()> {
        Ok(())
    }
}

/// Writer that drives the [`RowOutputFormat`]
#[derive(Debug)]
pub struct RowOutputWriter<W, F> {
    out: W,
    format: F,
    header: Vec<Field>,
    prefix_written: bool,
    rows: usize,
}

impl<W: Write, F: RowOutputFormat> RowOutputWriter<W, F> {
    /// Create a new writer, nothing is written until the first block or `finish`
    pub fn new(out: W, format: F, header: Vec<Field>) -> Self {
        Self {
            out,
            format,
            header,
            prefix_written: false,
            rows: 0,
        }
    }

    /// Get the format
    pub fn format(&self) -> &F {
        &self.format
    }

    /// Number of data rows written, totals and extremes are excluded
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Write all of the rows in the block
    pub fn write_block(&mut self, block: &DataBlock) -> Result<()> {
        self.check_block(block)?;
        self.ensure_prefix()?;
        let name = self.format.name();
        for row in 0..block.len() {
            if self.rows != 0 {
                self.format
                    .write_row_between_delimiter(&mut self.out)
                    .context(IoSnafu { format: name })?;
            }
            self.write_row(block, row)?;
            self.rows += 1;
        }
        Ok(())
    }

    /// Write the totals block, it should have single row
    pub fn write_totals(&mut self, totals: &DataBlock) -> Result<()> {
        let name = self.format.name();
        ensure!(
            self.format.supports_totals(),
            UnsupportedSnafu {
                format: name,
                kind: "totals"
            }
        );
        self.check_block(totals)?;
        self.ensure_prefix()?;
        self.format
            .write_before_totals(&mut self.out)
            .context(IoSnafu { format: name })?;
        for row in 0..totals.len() {
            self.write_row(totals, row)?;
        }
        self.format
            .write_after_totals(&mut self.out)
            .context(IoSnafu { format: name })
    }

    /// Write the extremes block, the first row is the minimum and the second row is the
    /// maximum
    pub fn write_extremes(&mut self, extremes: &DataBlock) -> Result<()> {
        let name = self.format.name();
        ensure!(
            self.format.supports_extremes(),
            UnsupportedSnafu {
                format: name,
                kind: "extremes"
            }
        );
        self.check_block(extremes)?;
        ensure!(
            extremes.len() == 2,
            InvalidExtremesSnafu {
                rows: extremes.len()
            }
        );
        self.ensure_prefix()?;
        self.format
            .write_before_extremes(&mut self.out)
            .context(IoSnafu { format: name })?;
        self.write_row(extremes, 0)?;
        self.write_row(extremes, 1)?;
        self.format
            .write_after_extremes(&mut self.out)
            .context(IoSnafu { format: name })
    }

    /// Write the suffix and flush the output
    pub fn finish(mut self) -> Result<W> {
        self.ensure_prefix()?;
        let name = self.format.name();
        self.format
            .write_suffix(&mut self.out, self.rows)
            .context(IoSnafu { format: name })?;
        self.out.flush().context(IoSnafu { format: name })?;
        tracing::debug!(
            "`{}` output finished with `{}` rows",
            name,
            self.rows
        );
        Ok(self.out)
    }

    fn check_block(&self, block: &DataBlock) -> Result<()> {
        ensure!(
            block.num_arrays() == self.header.len(),
            ColumnCountMismatchSnafu {
                format: self.format.name(),
                expect: self.header.len(),
                actual: block.num_arrays()
            }
        );
        Ok(())
    }

    fn ensure_prefix(&mut self) -> Result<()> {
        if !self.prefix_written {
            self.format
                .write_prefix(&mut self.out, &self.header)
                .context(IoSnafu {
                    format: self.format.name(),
                })?;
            self.prefix_written = true;
        }
        Ok(())
    }

    fn write_row(&mut self, block: &DataBlock, row: usize) -> Result<()> {
        let name = self.format.name();
        let out: &mut dyn Write = &mut self.out;
        let write = |format: &mut F, out: &mut dyn Write| -> std::io::Result<()> {
            format.write_row_start_delimiter(out)?;
            for (index, array) in block.arrays().iter().enumerate() {
                if index != 0 {
                    format.write_field_delimiter(out)?;
                }
                format.write_field(out, array.get(row))?;
            }
            format.write_row_end_delimiter(out)
        };
        write(&mut self.format, out).context(IoSnafu { format: name })
    }
}
