//! Aggregate generated measurements into 10 seconds buckets with the resample combinator
//! and print the result as a pretty table, CSV and Markdown

use std::process::ExitCode;
use std::sync::Arc;

use data_block::array::{ArrayImpl, Int64Array, UInt64Array};
use data_block::block::{DataBlock, InconsistentLengthError};
use data_block::types::LogicalType;
use resample::formats::{
    CsvRowOutputFormat, Field, FormatError, FormatSettings, MarkdownRowOutputFormat,
    RowOutputFormat, RowOutputWriter,
};
use resample::function::aggregate::avg::Avg;
use resample::function::aggregate::combinator::{ResampleParams, create_resample};
use resample::function::aggregate::count::Count;
use resample::function::aggregate::min_max::Max;
use resample::function::aggregate::slab::StateSlab;
use resample::function::aggregate::sum::Sum;
use resample::function::aggregate::{AggregateFunction, AggregationError, Arena};
use snafu::{ResultExt, Snafu};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ROWS: usize = 1000;
const PARAMS: ResampleParams = ResampleParams {
    begin: 0,
    end: 60,
    step: 10,
};

#[derive(Debug, Snafu)]
enum DemoError {
    #[snafu(display("Failed to aggregate the measurements"))]
    Aggregate { source: AggregationError },
    #[snafu(display("Failed to build the data block"))]
    Block { source: InconsistentLengthError },
    #[snafu(display("Failed to print the result"))]
    Print { source: FormatError },
}

/// Measurement `i` is taken at second `i % 70`, seconds in `[60, 70)` fall outside of
/// the range and are discarded
fn measurements() -> (ArrayImpl, ArrayImpl) {
    let values = (0..ROWS)
        .map(|i| (i % 13 != 0).then_some(i as i64))
        .collect::<Int64Array>();
    let seconds = (0..ROWS)
        .map(|i| Some((i % 70) as u64))
        .collect::<UInt64Array>();
    (ArrayImpl::from(values), ArrayImpl::from(seconds))
}

fn aggregate(
    func: Arc<dyn AggregateFunction>,
    columns: &[&ArrayImpl],
    arena: &Arena,
) -> Result<ArrayImpl, AggregationError> {
    let mut slab = StateSlab::try_new(Arc::clone(&func))?;
    slab.add_batch(columns, ROWS, arena)?;
    let mut output = ArrayImpl::new(func.return_type());
    slab.insert_result_into(&mut output, arena)?;
    tracing::info!("{}", func);
    Ok(output)
}

fn print<F: RowOutputFormat>(
    format: F,
    header: &[Field],
    block: &DataBlock,
) -> Result<(), FormatError> {
    tracing::info!("Print the result with content type `{}`", format.content_type());
    let mut writer = RowOutputWriter::new(std::io::stdout().lock(), format, header.to_vec());
    writer.write_block(block)?;
    writer.finish()?;
    Ok(())
}

fn run() -> Result<(), DemoError> {
    let arena = Arena::new();
    let (values, seconds) = measurements();
    let value_type = LogicalType::BigInt;
    let key_type = LogicalType::UnsignedBigInt;

    let nested: Vec<Arc<dyn AggregateFunction>> = vec![
        Arc::new(Count::<false>::try_new(vec![value_type.clone()]).context(AggregateSnafu)?),
        Arc::new(Sum::<i64>::try_new(vec![value_type.clone()]).context(AggregateSnafu)?),
        Arc::new(Avg::<i64>::try_new(vec![value_type.clone()]).context(AggregateSnafu)?),
        Arc::new(Max::<i64>::try_new(vec![value_type.clone()]).context(AggregateSnafu)?),
    ];

    let mut header = Vec::with_capacity(nested.len());
    let mut arrays = Vec::with_capacity(nested.len());
    for nested in nested {
        let func = create_resample(nested, vec![value_type.clone(), key_type.clone()], PARAMS)
            .context(AggregateSnafu)?;
        header.push(Field::new(
            format!(
                "{}({}, {}, {})(value, second)",
                func.name(),
                PARAMS.begin,
                PARAMS.end,
                PARAMS.step
            ),
            func.return_type(),
        ));
        arrays.push(aggregate(func, &[&values, &seconds], &arena).context(AggregateSnafu)?);
    }
    let block = DataBlock::try_new(arrays).context(BlockSnafu)?;

    println!("{}", block.pretty(header.iter().map(|field| &field.name)));
    println!();
    let settings = FormatSettings::default();
    print(CsvRowOutputFormat::new(settings.clone()), &header, &block).context(PrintSnafu)?;
    println!();
    print(MarkdownRowOutputFormat::new(settings), &header, &block).context(PrintSnafu)
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let now = std::time::Instant::now();
    match run() {
        Ok(()) => {
            tracing::info!("Elapsed {} sec", now.elapsed().as_millis() as f64 / 1000.0);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", snafu::Report::from_error(e));
            ExitCode::FAILURE
        }
    }
}
