//! Avg aggregation function

use std::alloc::Layout;
use std::fmt::Debug;
use std::marker::PhantomData;

use data_block::array::ArrayImpl;
use data_block::element::ElementImplRef;
use data_block::types::LogicalType;
use num_traits::AsPrimitive;
use snafu::{OptionExt, ResultExt, ensure};

use super::sum::SumValue;
use super::{
    AggregateDataPtr, AggregateFunction, Arena, ArgTypeMismatchSnafu, ArithmeticOverflowSnafu,
    DeserializeSnafu, InvalidArgumentCountSnafu, Result, ResultArrayMismatchSnafu, Stringify,
};
use crate::function::Function;
use crate::io::{BinarySerde, ReadBuffer, WriteBuffer};

#[derive(Debug)]
struct AvgState<T> {
    sum: T,
    count: u64,
}

/// Avg aggregation function. The result is `Double`, `NULL` if no value is added
pub struct Avg<T> {
    args: Vec<LogicalType>,
    _phantom: PhantomData<T>,
}

impl<T: SumValue + AsPrimitive<f64>> Avg<T> {
    /// Create a new avg function
    pub fn try_new(args: Vec<LogicalType>) -> Result<Self> {
        ensure!(
            args.len() == 1,
            InvalidArgumentCountSnafu {
                func: "avg",
                expect: 1_usize,
                actual: args.len()
            }
        );
        ensure!(
            T::accepts(&args[0]),
            ArgTypeMismatchSnafu {
                func: "avg",
                expect: T::EXPECT,
                arg_type: args[0].clone()
            }
        );
        Ok(Self {
            args,
            _phantom: PhantomData,
        })
    }

    #[inline]
    fn accumulate(&self, state: &mut AvgState<T>, sum: T, count: u64) -> Result<()> {
        state.sum = state
            .sum
            .add_value(sum)
            .context(ArithmeticOverflowSnafu { func: self.name() })?;
        state.count += count;
        Ok(())
    }
}

impl<T: SumValue> Debug for Avg<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Avg")
            .field("args", &self.args)
            .field("sum_type", &T::LOGICAL_TYPE)
            .finish()
    }
}

impl<T: SumValue> Stringify for Avg<T> {
    fn name(&self) -> &str {
        "avg"
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fn avg({}) -> Float64", self.args[0])
    }
}

impl<T: SumValue> Function for Avg<T> {
    fn arguments(&self) -> &[LogicalType] {
        &self.args
    }

    fn return_type(&self) -> LogicalType {
        LogicalType::Double
    }
}

impl<T: SumValue + AsPrimitive<f64>> AggregateFunction for Avg<T> {
    fn state_layout(&self) -> Layout {
        Layout::new::<AvgState<T>>()
    }

    unsafe fn create(&self, place: AggregateDataPtr) -> Result<()> {
        unsafe {
            place.write(AvgState {
                sum: T::ZERO,
                count: 0,
            })
        };
        Ok(())
    }

    unsafe fn destroy(&self, _place: AggregateDataPtr) {}

    unsafe fn add(
        &self,
        place: AggregateDataPtr,
        columns: &[&ArrayImpl],
        row: usize,
        _arena: &Arena,
    ) -> Result<()> {
        match T::extract(columns[0], row) {
            Some(value) => self.accumulate(unsafe { place.as_mut() }, value, 1),
            None => Ok(()),
        }
    }

    unsafe fn merge(
        &self,
        place: AggregateDataPtr,
        rhs: AggregateDataPtr,
        _arena: &Arena,
    ) -> Result<()> {
        let rhs = unsafe { rhs.as_ref::<AvgState<T>>() };
        self.accumulate(unsafe { place.as_mut() }, rhs.sum, rhs.count)
    }

    unsafe fn serialize(
        &self,
        place: AggregateDataPtr,
        buf: &mut WriteBuffer,
        _version: Option<usize>,
    ) -> Result<()> {
        let state = unsafe { place.as_ref::<AvgState<T>>() };
        state.sum.write_binary(buf);
        buf.write_var_uint(state.count);
        Ok(())
    }

    unsafe fn deserialize(
        &self,
        place: AggregateDataPtr,
        buf: &mut ReadBuffer<'_>,
        _version: Option<usize>,
        _arena: &Arena,
    ) -> Result<()> {
        let sum = T::read_binary(buf).context(DeserializeSnafu { func: self.name() })?;
        let count = buf
            .read_var_uint()
            .context(DeserializeSnafu { func: self.name() })?;
        unsafe { place.write(AvgState { sum, count }) };
        Ok(())
    }

    unsafe fn insert_result_into(
        &self,
        place: AggregateDataPtr,
        to: &mut ArrayImpl,
        _arena: &Arena,
    ) -> Result<()> {
        let state = unsafe { place.as_ref::<AvgState<T>>() };
        let avg = (state.count != 0).then(|| state.sum.as_() / state.count as f64);
        to.push(avg.map(ElementImplRef::Float64))
            .context(ResultArrayMismatchSnafu { func: self.name() })
    }
}
