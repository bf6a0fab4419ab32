//! CSV output. It does not conform to RFC 4180 by default, the line ending is `\n`
//! unless `crlf_end_of_line` is set

use std::io::Write;

use data_block::element::ElementImplRef;

use super::text::{csv_quote, render};
use super::{Field, FormatSettings, RowOutputFormat};

/// Write the rows as comma separated values
#[derive(Debug)]
pub struct CsvRowOutputFormat {
    settings: FormatSettings,
}

impl CsvRowOutputFormat {
    /// Create a new CSV format
    pub fn new(settings: FormatSettings) -> Self {
        Self { settings }
    }

    fn write_line_end(&self, out: &mut dyn Write) -> std::io::Result<()> {
        if self.settings.csv.crlf_end_of_line {
            out.write_all(b"\r\n")
        } else {
            out.write_all(b"\n")
        }
    }

    fn write_line(
        &self,
        out: &mut dyn Write,
        values: impl Iterator<Item = impl AsRef<str>>,
    ) -> std::io::Result<()> {
        for (index, value) in values.enumerate() {
            if index != 0 {
                out.write_all(&[self.settings.csv.delimiter])?;
            }
            out.write_all(csv_quote(value.as_ref()).as_bytes())?;
        }
        self.write_line_end(out)
    }
}

impl RowOutputFormat for CsvRowOutputFormat {
    fn name(&self) -> &'static str {
        "CSV"
    }

    fn content_type(&self) -> String {
        format!(
            "text/csv; charset=UTF-8; header={}",
            if self.settings.csv.with_names {
                "present"
            } else {
                "absent"
            }
        )
    }

    fn write_prefix(&mut self, out: &mut dyn Write, header: &[Field]) -> std::io::Result<()> {
        if self.settings.csv.with_names {
            self.write_line(out, header.iter().map(|field| field.name.as_str()))?;
        }
        if self.settings.csv.with_types {
            self.write_line(out, header.iter().map(|field| field.logical_type.to_string()))?;
        }
        Ok(())
    }

    fn write_field(
        &mut self,
        out: &mut dyn Write,
        value: Option<ElementImplRef<'_>>,
    ) -> std::io::Result<()> {
        match value {
            None => out.write_all(self.settings.null_representation.as_bytes()),
            Some(value @ (ElementImplRef::String(_) | ElementImplRef::List(_))) => {
                out.write_all(csv_quote(&render(value)).as_bytes())
            }
            Some(value) => out.write_all(render(value).as_bytes()),
        }
    }

    fn write_field_delimiter(&mut self, out: &mut dyn Write) -> std::io::Result<()> {
        out.write_all(&[self.settings.csv.delimiter])
    }

    fn write_row_end_delimiter(&mut self, out: &mut dyn Write) -> std::io::Result<()> {
        self.write_line_end(out)
    }

    fn supports_totals(&self) -> bool {
        true
    }

    fn supports_extremes(&self) -> bool {
        true
    }

    fn write_before_totals(&mut self, out: &mut dyn Write) -> std::io::Result<()> {
        self.write_line_end(out)
    }

    fn write_before_extremes(&mut self, out: &mut dyn Write) -> std::io::Result<()> {
        self.write_line_end(out)
    }
}

#[cfg(test)]
mod tests {
    use data_block::array::{ArrayImpl, Float64Array, Int64Array, ListArray, StringArray};
    use data_block::block::DataBlock;
    use data_block::types::LogicalType;
    use expect_test::expect;

    use super::*;
    use crate::formats::{CsvSettings, RowOutputWriter};

    fn header() -> Vec<Field> {
        vec![
            Field::new("name", LogicalType::VarChar),
            Field::new("value", LogicalType::Double),
        ]
    }

    fn block() -> DataBlock {
        DataBlock::try_new(vec![
            ArrayImpl::from(StringArray::from_iter([
                Some("plain"),
                Some("with,comma"),
                Some("say \"hi\""),
            ])),
            ArrayImpl::from(Float64Array::from_iter([Some(1.5), None, Some(-2.0)])),
        ])
        .unwrap()
    }

    fn write_csv(
        settings: FormatSettings,
        write: impl FnOnce(&mut RowOutputWriter<Vec<u8>, CsvRowOutputFormat>),
    ) -> String {
        let mut writer =
            RowOutputWriter::new(Vec::new(), CsvRowOutputFormat::new(settings), header());
        write(&mut writer);
        String::from_utf8(writer.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_csv_output() {
        let output = write_csv(FormatSettings::default(), |writer| {
            writer.write_block(&block()).unwrap();
        });
        expect![[r#"
            "name","value"
            "plain",1.5
            "with,comma",\N
            "say ""hi""",-2
        "#]]
        .assert_eq(&output);
    }

    #[test]
    fn test_csv_settings() {
        let settings = FormatSettings {
            csv: CsvSettings {
                delimiter: b';',
                crlf_end_of_line: true,
                with_names: true,
                with_types: true,
            },
            null_representation: "NULL".to_string(),
            ..Default::default()
        };
        let output = write_csv(settings, |writer| {
            writer.write_block(&block()).unwrap();
        });
        assert_eq!(
            output,
            "\"name\";\"value\"\r\n\"String\";\"Float64\"\r\n\"plain\";1.5\r\n\"with,comma\";NULL\r\n\"say \"\"hi\"\"\";-2\r\n"
        );

        let format = CsvRowOutputFormat::new(FormatSettings {
            csv: CsvSettings {
                with_names: false,
                ..Default::default()
            },
            ..Default::default()
        });
        assert_eq!(format.content_type(), "text/csv; charset=UTF-8; header=absent");
    }

    #[test]
    fn test_csv_totals_and_extremes() {
        let totals = DataBlock::try_new(vec![
            ArrayImpl::from(StringArray::from_iter([Some("total")])),
            ArrayImpl::from(Float64Array::from_iter([Some(-0.5)])),
        ])
        .unwrap();
        let extremes = DataBlock::try_new(vec![
            ArrayImpl::from(StringArray::from_iter([Some("plain"), Some("with,comma")])),
            ArrayImpl::from(Float64Array::from_iter([Some(-2.0), Some(1.5)])),
        ])
        .unwrap();

        let output = write_csv(FormatSettings::default(), |writer| {
            writer.write_block(&block()).unwrap();
            writer.write_totals(&totals).unwrap();
            writer.write_extremes(&extremes).unwrap();
            assert_eq!(writer.rows(), 3);
        });
        expect![[r#"
            "name","value"
            "plain",1.5
            "with,comma",\N
            "say ""hi""",-2

            "total",-0.5

            "plain",-2
            "with,comma",1.5
        "#]]
        .assert_eq(&output);
    }

    #[test]
    fn test_csv_array_field() {
        let mut list = ListArray::new(LogicalType::list_of(LogicalType::BigInt)).unwrap();
        let elements = ArrayImpl::from(Int64Array::from_iter([Some(3), None, Some(-7)]));
        for index in 0..elements.len() {
            list.elements_mut().push(elements.get(index)).unwrap();
        }
        list.push_offset();
        // Empty list
        list.push_offset();

        let block = DataBlock::try_new(vec![ArrayImpl::from(list)]).unwrap();
        let mut writer = RowOutputWriter::new(
            Vec::new(),
            CsvRowOutputFormat::new(FormatSettings {
                csv: CsvSettings {
                    with_types: true,
                    ..Default::default()
                },
                ..Default::default()
            }),
            vec![Field::new(
                "sumResample(value, key)",
                LogicalType::list_of(LogicalType::BigInt),
            )],
        );
        writer.write_block(&block).unwrap();
        let output = String::from_utf8(writer.finish().unwrap()).unwrap();
        expect![[r#"
            "sumResample(value, key)"
            "Array(Nullable(Int64))"
            "[3,NULL,-7]"
            "[]"
        "#]]
        .assert_eq(&output);
    }
}
