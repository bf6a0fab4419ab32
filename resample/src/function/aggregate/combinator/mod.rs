//! Combinators that change the behavior of the aggregate functions

pub mod resample;

use std::sync::Arc;

use data_block::types::LogicalType;
use snafu::OptionExt;

use self::resample::{Resample, ResampleKey};
use super::{
    AggregateFunction, ArgTypeMismatchSnafu, InvalidArgumentCountSnafu, ParameterOutOfRangeSnafu,
    Result,
};

/// Parameters of the resample combinator: `fResample(begin, end, step)`
///
/// `begin` and `end` are wide enough to hold both of the signed and unsigned keys, they
/// are narrowed to the key type selected by the key argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleParams {
    /// Inclusive start of the key range
    pub begin: i128,
    /// Exclusive end of the key range
    pub end: i128,
    /// Width of each bucket
    pub step: u64,
}

/// Wrap the nested function with the resample combinator
///
/// `arguments` are the arguments of the nested function followed by the key. Signed
/// integer key uses `i64` key domain, unsigned integer key uses `u64` key domain
pub fn create_resample(
    nested: Arc<dyn AggregateFunction>,
    arguments: Vec<LogicalType>,
    params: ResampleParams,
) -> Result<Arc<dyn AggregateFunction>> {
    let name = format!("{}Resample", nested.name());
    let key_type = arguments
        .last()
        .with_context(|| InvalidArgumentCountSnafu {
            func: &name,
            expect: nested.arguments().len() + 1,
            actual: 0_usize,
        })?
        .clone();

    if key_type.is_signed_integer() {
        new_resample::<i64>(nested, arguments, params, &name)
    } else if key_type.is_unsigned_integer() {
        new_resample::<u64>(nested, arguments, params, &name)
    } else {
        ArgTypeMismatchSnafu {
            func: name,
            expect: "integer key",
            arg_type: key_type,
        }
        .fail()
    }
}

fn new_resample<K: ResampleKey>(
    nested: Arc<dyn AggregateFunction>,
    arguments: Vec<LogicalType>,
    params: ResampleParams,
    name: &str,
) -> Result<Arc<dyn AggregateFunction>> {
    let narrow = |param: &'static str, value: i128| {
        num_traits::cast::<i128, K>(value).with_context(|| ParameterOutOfRangeSnafu {
            func: name,
            param,
            value,
            key_type: K::NAME,
        })
    };
    let begin = narrow("begin", params.begin)?;
    let end = narrow("end", params.end)?;

    Ok(Arc::new(Resample::<K>::try_new(
        nested,
        begin,
        end,
        params.step,
        arguments,
    )?))
}
