//! Resample combinator
//!
//! `fResample(begin, end, step)(args..., key)` splits the key range `[begin, end)` into
//! `ceil((end - begin) / step)` buckets and computes the nested function `f(args...)`
//! independently in each bucket. The result of each row is an array that contains the
//! results of all of the buckets. Rows whose key is out of the range are ignored.
//!
//! The states of the buckets are packed into a single state: the bucket `i` is located
//! at `i * stride`, where stride is the size of the nested state rounded up to its
//! alignment

use std::alloc::Layout;
use std::fmt::{Debug, Display};
use std::sync::Arc;

use data_block::array::{ArrayImpl, ListArray};
use data_block::types::LogicalType;
use num_traits::PrimInt;
use snafu::{OptionExt, ResultExt, ensure};
use strength_reduce::StrengthReducedU64;

use crate::common::utils::memory::next_multiple_of_align;
use crate::function::Function;
use crate::function::aggregate::{
    AggregateDataPtr, AggregateFunction, Arena, ArgTypeMismatchSnafu, ConfigurationSnafu,
    InvalidArgumentCountSnafu, OverflowSnafu, RangeTooLargeSnafu, Result,
    ResultArrayMismatchSnafu, Stringify,
};
use crate::io::{ReadBuffer, WriteBuffer};

/// Sanity threshold to avoid creating too large arrays
pub const MAX_ELEMENTS: usize = 1_048_576;

/// Key of the resample combinator
pub trait ResampleKey: PrimInt + Debug + Display + Send + Sync + 'static {
    /// Name of the key type
    const NAME: &'static str;

    /// Description of the key argument it accepts, used in error message
    const EXPECT: &'static str;

    /// Returns true if the key can be extracted from the array with the logical type
    fn accepts(arg: &LogicalType) -> bool;

    /// Extract the key in the row, `None` represents `NULL`
    fn extract(array: &ArrayImpl, row: usize) -> Option<Self>;

    /// Compute `self - begin` in the `u64` domain. Caller should guarantee
    /// `self >= begin`
    fn distance_from(self, begin: Self) -> u64;
}

impl ResampleKey for i64 {
    const NAME: &'static str = "Int64";

    const EXPECT: &'static str = "signed integer key";

    #[inline]
    fn accepts(arg: &LogicalType) -> bool {
        arg.is_signed_integer()
    }

    #[inline]
    fn extract(array: &ArrayImpl, row: usize) -> Option<Self> {
        array.get_int(row)
    }

    #[inline]
    fn distance_from(self, begin: Self) -> u64 {
        // Two's complement subtraction is exact when self >= begin
        (self as u64).wrapping_sub(begin as u64)
    }
}

impl ResampleKey for u64 {
    const NAME: &'static str = "UInt64";

    const EXPECT: &'static str = "unsigned integer key";

    #[inline]
    fn accepts(arg: &LogicalType) -> bool {
        arg.is_unsigned_integer()
    }

    #[inline]
    fn extract(array: &ArrayImpl, row: usize) -> Option<Self> {
        array.get_uint(row)
    }

    #[inline]
    fn distance_from(self, begin: Self) -> u64 {
        self - begin
    }
}

/// Resample combinator that wraps the nested aggregate function
///
/// # Generic
///
/// - `K`: type of the key. The key column is the last argument
pub struct Resample<K> {
    name: String,
    nested: Arc<dyn AggregateFunction>,
    arguments: Vec<LogicalType>,
    key_index: usize,
    begin: K,
    end: K,
    step: u64,
    step_divisor: StrengthReducedU64,
    /// Number of buckets
    total: usize,
    /// Size of the nested state rounded up to its alignment
    stride: usize,
    state_layout: Layout,
}

impl<K: ResampleKey> Resample<K> {
    /// Create a new resample combinator
    ///
    /// # Arguments
    ///
    /// - `nested`: the nested aggregate function computed in each bucket
    /// - `begin`/`end`: the key range `[begin, end)`
    /// - `step`: width of each bucket
    /// - `arguments`: arguments of the nested function followed by the key
    pub fn try_new(
        nested: Arc<dyn AggregateFunction>,
        begin: K,
        end: K,
        step: u64,
        arguments: Vec<LogicalType>,
    ) -> Result<Self> {
        let name = format!("{}Resample", nested.name());

        ensure!(
            step != 0,
            ConfigurationSnafu {
                func: &name,
                reason: "the step should not be zero"
            }
        );

        let expect = nested.arguments().len() + 1;
        ensure!(
            arguments.len() == expect,
            InvalidArgumentCountSnafu {
                func: &name,
                expect,
                actual: arguments.len()
            }
        );
        let key_index = arguments.len() - 1;
        ensure!(
            K::accepts(&arguments[key_index]),
            ArgTypeMismatchSnafu {
                func: &name,
                expect: K::EXPECT,
                arg_type: arguments[key_index].clone()
            }
        );

        let overflow = || OverflowSnafu {
            func: &name,
            begin: begin.to_string(),
            end: end.to_string(),
            step,
        };

        let total = if end <= begin {
            0
        } else {
            // total = (end - begin + step - 1) / step
            let sum = end
                .checked_sub(&begin)
                .and_then(|range| range.to_u64())
                .and_then(|range| range.checked_add(step))
                .with_context(overflow)?;
            usize::try_from((sum - 1) / step)
                .ok()
                .with_context(overflow)?
        };

        ensure!(
            total <= MAX_ELEMENTS,
            RangeTooLargeSnafu {
                func: &name,
                total,
                max_elements: MAX_ELEMENTS
            }
        );

        let nested_layout = nested.state_layout();
        let stride = next_multiple_of_align(nested_layout.size(), nested_layout.align())
            .with_context(overflow)?;
        let state_layout = total
            .checked_mul(stride)
            .and_then(|size| Layout::from_size_align(size, nested_layout.align()).ok())
            .with_context(overflow)?;

        tracing::debug!(
            "Create `{}` with begin `{}`, end `{}`, step `{}`: `{}` buckets, stride `{}`",
            name,
            begin,
            end,
            step,
            total,
            stride
        );

        Ok(Self {
            name,
            nested,
            arguments,
            key_index,
            begin,
            end,
            step,
            step_divisor: StrengthReducedU64::new(step),
            total,
            stride,
            state_layout,
        })
    }

    /// Number of the buckets
    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Distance, in bytes, between two adjacent buckets
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Index of the bucket the key belongs to, `None` if the key is out of range
    #[inline]
    pub fn bucket_index(&self, key: K) -> Option<usize> {
        if key < self.begin || key >= self.end {
            return None;
        }
        // Index is smaller than total, it fits in usize
        Some((key.distance_from(self.begin) / self.step_divisor) as usize)
    }

    /// Pointer to the state of the bucket
    ///
    /// # Safety
    ///
    /// `place` is the state of self and `index < self.total`
    #[inline]
    unsafe fn bucket(&self, place: AggregateDataPtr, index: usize) -> AggregateDataPtr {
        unsafe { place.add(index * self.stride) }
    }

    /// Append the results of the buckets into the list array, then close the list
    ///
    /// # Safety
    ///
    /// `place` is the state of self
    unsafe fn insert_result_into_impl<const MERGE: bool>(
        &self,
        place: AggregateDataPtr,
        to: &mut ArrayImpl,
        arena: &Arena,
    ) -> Result<()> {
        let to: &mut ListArray = to
            .try_into()
            .context(ResultArrayMismatchSnafu { func: &self.name })?;
        let elements = to.elements_mut();
        for index in 0..self.total {
            unsafe {
                let bucket = self.bucket(place, index);
                if MERGE {
                    self.nested
                        .insert_merge_result_into(bucket, elements, arena)?
                } else {
                    self.nested.insert_result_into(bucket, elements, arena)?
                }
            }
        }
        to.push_offset();
        Ok(())
    }
}

impl<K: ResampleKey> Debug for Resample<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resample")
            .field("nested", &self.nested)
            .field("begin", &self.begin)
            .field("end", &self.end)
            .field("step", &self.step)
            .field("total", &self.total)
            .field("stride", &self.stride)
            .finish()
    }
}

impl<K: ResampleKey> Stringify for Resample<K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fn {}({}, {}, {})(", self.name, self.begin, self.end, self.step)?;
        let mut args = self.arguments.iter();
        if let Some(arg) = args.next() {
            write!(f, "{}", arg)?;
            args.try_for_each(|arg| write!(f, ", {}", arg))?;
        }
        write!(f, ") -> {}", self.return_type())
    }
}

impl<K: ResampleKey> Function for Resample<K> {
    fn arguments(&self) -> &[LogicalType] {
        &self.arguments
    }

    fn return_type(&self) -> LogicalType {
        LogicalType::list_of(self.nested.return_type())
    }
}

impl<K: ResampleKey> AggregateFunction for Resample<K> {
    fn state_layout(&self) -> Layout {
        self.state_layout
    }

    fn is_state(&self) -> bool {
        self.nested.is_state()
    }

    fn is_versioned(&self) -> bool {
        self.nested.is_versioned()
    }

    fn default_version(&self) -> usize {
        self.nested.default_version()
    }

    fn version_from_revision(&self, revision: usize) -> usize {
        self.nested.version_from_revision(revision)
    }

    fn allocates_memory_in_arena(&self) -> bool {
        self.nested.allocates_memory_in_arena()
    }

    fn has_trivial_destructor(&self) -> bool {
        self.nested.has_trivial_destructor()
    }

    unsafe fn create(&self, place: AggregateDataPtr) -> Result<()> {
        for index in 0..self.total {
            if let Err(e) = unsafe { self.nested.create(self.bucket(place, index)) } {
                tracing::warn!(
                    "Failed to create the bucket `{}` of `{}`, destroy the `{}` created buckets",
                    index,
                    self.name,
                    index
                );
                (0..index).for_each(|created| unsafe {
                    self.nested.destroy(self.bucket(place, created))
                });
                return Err(e);
            }
        }
        Ok(())
    }

    unsafe fn destroy(&self, place: AggregateDataPtr) {
        (0..self.total)
            .for_each(|index| unsafe { self.nested.destroy(self.bucket(place, index)) })
    }

    unsafe fn destroy_up_to_state(&self, place: AggregateDataPtr) {
        (0..self.total)
            .for_each(|index| unsafe { self.nested.destroy_up_to_state(self.bucket(place, index)) })
    }

    unsafe fn add(
        &self,
        place: AggregateDataPtr,
        columns: &[&ArrayImpl],
        row: usize,
        arena: &Arena,
    ) -> Result<()> {
        // NULL key is treated as out of range
        let Some(index) = K::extract(columns[self.key_index], row)
            .and_then(|key| self.bucket_index(key))
        else {
            return Ok(());
        };

        unsafe { self.nested.add(self.bucket(place, index), columns, row, arena) }
    }

    unsafe fn merge(
        &self,
        place: AggregateDataPtr,
        rhs: AggregateDataPtr,
        arena: &Arena,
    ) -> Result<()> {
        (0..self.total).try_for_each(|index| unsafe {
            self.nested.merge(self.bucket(place, index), self.bucket(rhs, index), arena)
        })
    }

    unsafe fn serialize(
        &self,
        place: AggregateDataPtr,
        buf: &mut WriteBuffer,
        version: Option<usize>,
    ) -> Result<()> {
        (0..self.total).try_for_each(|index| unsafe {
            self.nested.serialize(self.bucket(place, index), buf, version)
        })
    }

    unsafe fn deserialize(
        &self,
        place: AggregateDataPtr,
        buf: &mut ReadBuffer<'_>,
        version: Option<usize>,
        arena: &Arena,
    ) -> Result<()> {
        (0..self.total).try_for_each(|index| unsafe {
            self.nested.deserialize(self.bucket(place, index), buf, version, arena)
        })
    }

    unsafe fn insert_result_into(
        &self,
        place: AggregateDataPtr,
        to: &mut ArrayImpl,
        arena: &Arena,
    ) -> Result<()> {
        unsafe { self.insert_result_into_impl::<false>(place, to, arena) }
    }

    unsafe fn insert_merge_result_into(
        &self,
        place: AggregateDataPtr,
        to: &mut ArrayImpl,
        arena: &Arena,
    ) -> Result<()> {
        unsafe { self.insert_result_into_impl::<true>(place, to, arena) }
    }

    fn nested_function(&self) -> Option<&Arc<dyn AggregateFunction>> {
        Some(&self.nested)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use data_block::array::{Array, Int64Array, StringArray, UInt64Array};
    use data_block::block::DataBlock;
    use expect_test::expect;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rayon::prelude::*;

    use super::*;
    use crate::function::aggregate::count::CountStar;
    use crate::function::aggregate::min_max::Min;
    use crate::function::aggregate::slab::{StateSlab, alloc_state_in};
    use crate::function::aggregate::sum::Sum;
    use crate::error::SendableError;
    use crate::function::aggregate::{AggregationError, CreateStateSnafu, DeserializeSnafu};

    fn sum_resample(begin: i64, end: i64, step: u64) -> Result<Resample<i64>> {
        let sum = Arc::new(Sum::<i64>::try_new(vec![LogicalType::BigInt])?);
        Resample::try_new(
            sum,
            begin,
            end,
            step,
            vec![LogicalType::BigInt, LogicalType::BigInt],
        )
    }

    fn count_resample<K: ResampleKey>(begin: K, end: K, step: u64) -> Resample<K> {
        let key_type = if K::min_value() < K::zero() {
            LogicalType::BigInt
        } else {
            LogicalType::UnsignedBigInt
        };
        Resample::try_new(Arc::new(CountStar::new()), begin, end, step, vec![key_type]).unwrap()
    }

    fn rows(array: &ArrayImpl) -> Vec<String> {
        (0..array.len())
            .map(|index| array.get(index).map_or("Null".to_string(), |v| v.to_string()))
            .collect()
    }

    #[test]
    fn test_total() {
        assert_eq!(sum_resample(0, 10, 5).unwrap().total(), 2);
        assert_eq!(sum_resample(0, 11, 5).unwrap().total(), 3);
        assert_eq!(sum_resample(-10, 10, 3).unwrap().total(), 7);
        assert_eq!(sum_resample(0, 1, u64::MAX - 1).unwrap().total(), 1);
        assert_eq!(sum_resample(5, 5, 1).unwrap().total(), 0);
        assert_eq!(sum_resample(5, 3, 1).unwrap().total(), 0);
        assert_eq!(count_resample::<u64>(3, 5, 7).total(), 1);
        assert_eq!(count_resample::<u64>(5, 3, 7).total(), 0);
    }

    #[test]
    fn test_random_total() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for _ in 0..1000 {
            let begin = rng.gen_range(-1000_i64..1000);
            let end = rng.gen_range(-1000_i64..1000);
            let step = rng.gen_range(1_u64..100);
            let expect = if end > begin {
                (end - begin) as usize / step as usize
                    + usize::from((end - begin) as u64 % step != 0)
            } else {
                0
            };
            assert_eq!(count_resample(begin, end, step).total(), expect);
        }
    }

    #[test]
    fn test_stride_is_aligned() {
        let func = sum_resample(0, 10, 5).unwrap();
        // Option<i64> is 16 bytes with alignment 8
        assert_eq!(func.stride(), 16);
        assert_eq!(func.size_of_data(), 32);
        assert_eq!(func.align_of_data(), 8);

        let func = count_resample::<i64>(5, 3, 1);
        assert_eq!(func.size_of_data(), 0);
        assert_eq!(func.align_of_data(), 8);
    }

    #[test]
    fn test_zero_step() {
        for (begin, end) in [(0, 10), (10, 0), (i64::MIN, i64::MAX)] {
            let err = sum_resample(begin, end, 0).unwrap_err();
            assert!(matches!(err, AggregationError::Configuration { .. }));
        }
        expect![[r#"Invalid configuration of the `sumResample` aggregation function: the step should not be zero"#]]
            .assert_eq(&sum_resample(0, 10, 0).unwrap_err().to_string());
    }

    #[test]
    fn test_overflow() {
        let err = sum_resample(i64::MIN, i64::MAX, 1).unwrap_err();
        assert!(matches!(err, AggregationError::Overflow { .. }));
        expect![[r#"Overflow in internal computations of the `sumResample` aggregation function with begin `-9223372036854775808`, end `9223372036854775807` and step `1`. Too large arguments"#]]
            .assert_eq(&err.to_string());

        // range + step overflows
        let func = Resample::try_new(
            Arc::new(CountStar::new()),
            0_u64,
            u64::MAX,
            u64::MAX,
            vec![LogicalType::UnsignedBigInt],
        );
        assert!(matches!(func, Err(AggregationError::Overflow { .. })));

        // Huge range with huge step is fine
        assert_eq!(sum_resample(0, i64::MAX, 1 << 62).unwrap().total(), 2);
    }

    #[test]
    fn test_max_elements() {
        let func = sum_resample(0, MAX_ELEMENTS as i64, 1).unwrap();
        assert_eq!(func.total(), MAX_ELEMENTS);

        let err = sum_resample(0, MAX_ELEMENTS as i64 + 1, 1).unwrap_err();
        assert!(matches!(
            err,
            AggregationError::RangeTooLarge {
                total: 1_048_577,
                ..
            }
        ));

        let err = sum_resample(i64::MIN / 2, i64::MAX / 2, 1 << 20).unwrap_err();
        assert!(matches!(err, AggregationError::RangeTooLarge { .. }));
    }

    #[test]
    fn test_invalid_arguments() {
        let sum = Arc::new(Sum::<i64>::try_new(vec![LogicalType::BigInt]).unwrap());
        let err = Resample::<i64>::try_new(
            Arc::clone(&sum) as _,
            0,
            10,
            1,
            vec![LogicalType::BigInt],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AggregationError::InvalidArgumentCount {
                expect: 2,
                actual: 1,
                ..
            }
        ));

        let err = Resample::<i64>::try_new(
            sum,
            0,
            10,
            1,
            vec![LogicalType::BigInt, LogicalType::UnsignedInteger],
        )
        .unwrap_err();
        expect![[r#"`sumResample` aggregation function expect signed integer key argument, however the argument has logical type `UInt32`"#]]
            .assert_eq(&err.to_string());
    }

    #[test]
    fn test_bucket_index() {
        let func = sum_resample(0, 10, 5).unwrap();
        assert_eq!(func.bucket_index(0), Some(0));
        assert_eq!(func.bucket_index(4), Some(0));
        assert_eq!(func.bucket_index(5), Some(1));
        assert_eq!(func.bucket_index(7), Some(1));
        assert_eq!(func.bucket_index(9), Some(1));
        assert_eq!(func.bucket_index(10), None);
        assert_eq!(func.bucket_index(-1), None);

        let func = sum_resample(i64::MIN + 1, i64::MIN + 100, 10).unwrap();
        assert_eq!(func.bucket_index(i64::MIN), None);
        assert_eq!(func.bucket_index(i64::MIN + 1), Some(0));
        assert_eq!(func.bucket_index(i64::MIN + 99), Some(9));

        let func = count_resample(u64::MAX - 10, u64::MAX, 3);
        assert_eq!(func.bucket_index(u64::MAX - 1), Some(3));
        assert_eq!(func.bucket_index(u64::MAX), None);
    }

    #[test]
    fn test_add_routes_rows() {
        let arena = Arena::new();
        let func = Arc::new(sum_resample(0, 10, 5).unwrap());
        let values = ArrayImpl::from(Int64Array::from_iter(
            [1, 2, 4, 8, 16, 32, 64].map(Some),
        ));
        let keys = ArrayImpl::from(Int64Array::from_iter([
            Some(7),
            Some(10),
            Some(-1),
            Some(0),
            None,
            Some(4),
            Some(5),
        ]));

        let mut slab = StateSlab::try_new(func.clone()).unwrap();
        slab.add_batch(&[&values, &keys], 7, &arena).unwrap();

        let mut output = ArrayImpl::new(func.return_type());
        slab.insert_result_into(&mut output, &arena).unwrap();
        assert_eq!(rows(&output), ["[40, 65]"]);
    }

    #[test]
    fn test_empty_range() {
        let arena = Arena::new();
        let func: Arc<dyn AggregateFunction> = Arc::new(sum_resample(5, 3, 1).unwrap());
        let values = ArrayImpl::from(Int64Array::from_iter([Some(1), Some(2)]));
        let keys = ArrayImpl::from(Int64Array::from_iter([Some(3), Some(4)]));

        let mut output = ArrayImpl::new(func.return_type());
        for _ in 0..3 {
            let mut slab = StateSlab::try_new(Arc::clone(&func)).unwrap();
            slab.add_batch(&[&values, &keys], 2, &arena).unwrap();
            slab.insert_result_into(&mut output, &arena).unwrap();
        }

        let list: &ListArray = (&output).try_into().unwrap();
        assert_eq!(list.offsets(), &[0, 0, 0]);
        assert!(list.validity().all_valid());
        assert_eq!(rows(&output), ["[]", "[]", "[]"]);
    }

    #[test]
    fn test_insert_result_offsets() {
        let arena = Arena::new();
        let func: Arc<dyn AggregateFunction> = Arc::new(count_resample::<i64>(0, 9, 2));
        let keys = ArrayImpl::from(Int64Array::from_iter((0..20).map(Some)));

        let num_groups = 4;
        let mut output = ArrayImpl::new(func.return_type());
        for group in 0..num_groups {
            let mut slab = StateSlab::try_new(Arc::clone(&func)).unwrap();
            slab.add_batch(&[&keys], group * 5, &arena).unwrap();
            slab.insert_result_into(&mut output, &arena).unwrap();
        }

        let list: &ListArray = (&output).try_into().unwrap();
        assert_eq!(list.len(), num_groups);
        assert_eq!(list.elements().len(), num_groups * 5);
        assert_eq!(list.offsets(), &[5, 10, 15, 20]);
        expect![[r#"
            [
                "[0, 0, 0, 0, 0]",
                "[2, 2, 1, 0, 0]",
                "[2, 2, 2, 2, 1]",
                "[2, 2, 2, 2, 1]",
            ]
        "#]]
        .assert_debug_eq(&rows(&output));
    }

    #[test]
    fn test_random_routing() {
        let mut rng = StdRng::seed_from_u64(42);
        let (begin, end, step) = (-100_i64, 100_i64, 7_u64);
        let keys: Vec<Option<i64>> = (0..4096)
            .map(|_| rng.gen_bool(0.95).then(|| rng.gen_range(-150..150)))
            .collect();

        let mut expected = vec![0_u64; 29];
        keys.iter().flatten().for_each(|&key| {
            if (begin..end).contains(&key) {
                expected[((key - begin) as u64 / step) as usize] += 1;
            }
        });

        let arena = Arena::new();
        let func = Arc::new(count_resample(begin, end, step));
        assert_eq!(func.total(), expected.len());
        let keys = ArrayImpl::from(Int64Array::from_iter(keys));
        let mut slab = StateSlab::try_new(func.clone()).unwrap();
        slab.add_batch(&[&keys], keys.len(), &arena).unwrap();

        let mut output = ArrayImpl::new(func.return_type());
        slab.insert_result_into(&mut output, &arena).unwrap();
        let list: &ListArray = (&output).try_into().unwrap();
        let counts: &UInt64Array = list.elements().try_into().unwrap();
        assert_eq!(counts.values(), expected.as_slice());
    }

    #[test]
    fn test_serialize_and_deserialize() {
        let arena = Arena::new();
        let func: Arc<dyn AggregateFunction> = Arc::new(sum_resample(0, 10, 5).unwrap());
        let values = ArrayImpl::from(Int64Array::from_iter([Some(3), Some(-1)]));
        let keys = ArrayImpl::from(Int64Array::from_iter([Some(1), Some(2)]));

        let mut slab = StateSlab::try_new(Arc::clone(&func)).unwrap();
        slab.add_batch(&[&values, &keys], 2, &arena).unwrap();
        let mut buf = WriteBuffer::new();
        slab.serialize(&mut buf, None).unwrap();
        // Buckets are concatenated without the number of buckets
        assert_eq!(
            buf.as_slice(),
            &[1, 2, 0, 0, 0, 0, 0, 0, 0, 0],
            "bucket 0 has sum 2, bucket 1 is empty"
        );

        let mut restored = StateSlab::try_new(Arc::clone(&func)).unwrap();
        let mut reader = ReadBuffer::new(buf.as_slice());
        restored.deserialize(&mut reader, None, &arena).unwrap();
        assert!(reader.is_exhausted());

        let mut output = ArrayImpl::new(func.return_type());
        slab.insert_result_into(&mut output, &arena).unwrap();
        restored.insert_result_into(&mut output, &arena).unwrap();
        assert_eq!(rows(&output), ["[2, Null]", "[2, Null]"]);

        // Truncated input
        let mut truncated = StateSlab::try_new(func).unwrap();
        let err = truncated
            .deserialize(&mut ReadBuffer::new(&buf.as_slice()[..1]), None, &arena)
            .unwrap_err();
        assert!(matches!(err, AggregationError::Deserialize { .. }));
    }

    #[test]
    fn test_merge() {
        let arena = Arena::new();
        let func: Arc<dyn AggregateFunction> = Arc::new(sum_resample(0, 30, 10).unwrap());
        let values = ArrayImpl::from(Int64Array::from_iter([1, 10, 100, 1000].map(Some)));
        let keys = ArrayImpl::from(Int64Array::from_iter([0, 15, 29, 3].map(Some)));

        let mut lhs = StateSlab::try_new(Arc::clone(&func)).unwrap();
        let mut rhs = StateSlab::try_new(Arc::clone(&func)).unwrap();
        lhs.add(&[&values, &keys], 0, &arena).unwrap();
        lhs.add(&[&values, &keys], 1, &arena).unwrap();
        rhs.add(&[&values, &keys], 2, &arena).unwrap();
        rhs.add(&[&values, &keys], 3, &arena).unwrap();
        lhs.merge(&rhs, &arena).unwrap();

        let mut output = ArrayImpl::new(func.return_type());
        lhs.insert_merge_result_into(&mut output, &arena).unwrap();
        rhs.insert_result_into(&mut output, &arena).unwrap();
        assert_eq!(rows(&output), ["[1001, 10, 100]", "[1000, Null, 100]"]);

        // Merging zero buckets is no-op
        let empty: Arc<dyn AggregateFunction> = Arc::new(sum_resample(3, 3, 1).unwrap());
        let mut lhs = StateSlab::try_new(Arc::clone(&empty)).unwrap();
        let rhs = StateSlab::try_new(empty).unwrap();
        lhs.merge(&rhs, &arena).unwrap();
    }

    #[test]
    fn test_unsigned_key() {
        let arena = Arena::new();
        let func = Arc::new(count_resample::<u64>(10, 20, 5));
        let keys = ArrayImpl::from(UInt64Array::from_iter(
            [9, 10, 14, 15, 19, 20, u64::MAX].map(Some),
        ));
        let mut slab = StateSlab::try_new(func.clone()).unwrap();
        slab.add_batch(&[&keys], keys.len(), &arena).unwrap();

        let mut output = ArrayImpl::new(func.return_type());
        slab.insert_result_into(&mut output, &arena).unwrap();
        assert_eq!(rows(&output), ["[2, 2]"]);
    }

    #[test]
    fn test_string_states() {
        let arena = Arena::new();
        let min = Arc::new(Min::<String>::try_new(vec![LogicalType::VarChar]).unwrap());
        let func: Arc<dyn AggregateFunction> = Arc::new(
            Resample::<i64>::try_new(
                min,
                0,
                4,
                2,
                vec![LogicalType::VarChar, LogicalType::Integer],
            )
            .unwrap(),
        );
        assert!(!func.has_trivial_destructor());

        let values = ArrayImpl::from(StringArray::from_iter(
            ["column", "resample", "arena", "bucket"].map(Some),
        ));
        let keys = ArrayImpl::from(data_block::array::Int32Array::from_iter(
            [0, 1, 3, 2].map(Some),
        ));

        let mut output = ArrayImpl::new(func.return_type());
        for _ in 0..2 {
            let mut slab = StateSlab::try_new(Arc::clone(&func)).unwrap();
            slab.add_batch(&[&values, &keys], 4, &arena).unwrap();
            slab.insert_result_into(&mut output, &arena).unwrap();
        }
        assert_eq!(
            rows(&output),
            ["[column, arena]", "[column, arena]"]
        );
    }

    #[test]
    fn test_nested_resample() {
        let arena = Arena::new();
        let sum = Arc::new(Sum::<i64>::try_new(vec![LogicalType::BigInt]).unwrap());
        let inner = Arc::new(
            Resample::<i64>::try_new(
                sum,
                0,
                4,
                2,
                vec![LogicalType::BigInt, LogicalType::BigInt],
            )
            .unwrap(),
        );
        let outer = Arc::new(
            Resample::<u64>::try_new(
                inner,
                0,
                2,
                1,
                vec![
                    LogicalType::BigInt,
                    LogicalType::BigInt,
                    LogicalType::UnsignedBigInt,
                ],
            )
            .unwrap(),
        );
        assert_eq!(outer.name(), "sumResampleResample");
        assert_eq!(
            outer.return_type().to_string(),
            "Array(Nullable(Array(Nullable(Int64))))"
        );
        assert!(outer.nested_function().is_some());
        expect![[r#"fn sumResampleResample(0, 2, 1)(Int64, Int64, UInt64) -> Array(Nullable(Array(Nullable(Int64))))"#]]
            .assert_eq(&(&*outer as &dyn AggregateFunction).to_string());

        let values = ArrayImpl::from(Int64Array::from_iter([1, 2, 4, 8, 16].map(Some)));
        let inner_keys = ArrayImpl::from(Int64Array::from_iter([0, 3, 1, 2, 5].map(Some)));
        let outer_keys = ArrayImpl::from(UInt64Array::from_iter([0, 0, 1, 1, 0].map(Some)));

        let block = DataBlock::try_new(vec![values, inner_keys, outer_keys]).unwrap();
        let mut slab = StateSlab::try_new(outer.clone()).unwrap();
        slab.add_batch(&block.array_refs(), block.len(), &arena)
            .unwrap();

        let mut output = ArrayImpl::new(outer.return_type());
        slab.insert_result_into(&mut output, &arena).unwrap();
        assert_eq!(rows(&output), ["[[1, 2], [4, 8]]"]);
    }

    #[test]
    fn test_parallel_partial_states() {
        let func: Arc<dyn AggregateFunction> = Arc::new(sum_resample(0, 100, 10).unwrap());
        let values = ArrayImpl::from(Int64Array::from_iter((0..1000).map(Some)));
        let keys = ArrayImpl::from(Int64Array::from_iter((0..1000).map(|v| Some(v % 100))));

        // Each partition aggregates its rows, the partial states are shipped as bytes
        let partials: Vec<Vec<u8>> = (0..8_usize)
            .into_par_iter()
            .map(|partition| {
                let arena = Arena::new();
                let mut slab = StateSlab::try_new(Arc::clone(&func)).unwrap();
                (partition..1000)
                    .step_by(8)
                    .for_each(|row| slab.add(&[&values, &keys], row, &arena).unwrap());
                let mut buf = WriteBuffer::new();
                slab.serialize(&mut buf, None).unwrap();
                buf.into_inner()
            })
            .collect();

        let arena = Arena::new();
        let mut combined = StateSlab::try_new(Arc::clone(&func)).unwrap();
        for partial in &partials {
            let mut slab = StateSlab::try_new(Arc::clone(&func)).unwrap();
            slab.deserialize(&mut ReadBuffer::new(partial), None, &arena)
                .unwrap();
            combined.merge(&slab, &arena).unwrap();
        }

        let mut expected = StateSlab::try_new(Arc::clone(&func)).unwrap();
        expected
            .add_batch(&[&values, &keys], 1000, &arena)
            .unwrap();

        let mut output = ArrayImpl::new(func.return_type());
        combined.insert_result_into(&mut output, &arena).unwrap();
        expected.insert_result_into(&mut output, &arena).unwrap();
        let rows = rows(&output);
        assert_eq!(rows[0], rows[1]);
        assert_eq!(
            rows[0],
            "[45450, 46450, 47450, 48450, 49450, 50450, 51450, 52450, 53450, 54450]"
        );
    }

    #[test]
    fn test_alloc_in_arena() {
        let arena = Arena::new();
        let func = sum_resample(0, 10, 5).unwrap();
        let values = ArrayImpl::from(Int64Array::from_iter([Some(6)]));
        let keys = ArrayImpl::from(Int64Array::from_iter([Some(6)]));
        let mut output = ArrayImpl::new(func.return_type());
        unsafe {
            let place = alloc_state_in(&arena, &func).unwrap();
            assert_eq!(place.as_ptr() as usize % func.align_of_data(), 0);
            func.add(place, &[&values, &keys], 0, &arena).unwrap();
            func.insert_result_into(place, &mut output, &arena).unwrap();
            func.destroy(place);
        }
        assert_eq!(rows(&output), ["[Null, 6]"]);
    }

    /// Nested function that records the lifecycle of its states. The state stores
    /// the creation sequence number
    #[derive(Debug, Default)]
    struct Recorder {
        fail_at: Option<usize>,
        created: AtomicUsize,
        destroyed: Mutex<Vec<usize>>,
        versions: Mutex<Vec<Option<usize>>>,
        deserialized_versions: Mutex<Vec<Option<usize>>>,
    }

    impl Stringify for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }

        fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fn recorder() -> UInt64")
        }
    }

    impl Function for Recorder {
        fn arguments(&self) -> &[LogicalType] {
            &[]
        }

        fn return_type(&self) -> LogicalType {
            LogicalType::UnsignedBigInt
        }
    }

    impl AggregateFunction for Recorder {
        fn state_layout(&self) -> Layout {
            // Size is not multiple of the alignment
            Layout::from_size_align(12, 4).unwrap()
        }

        fn is_state(&self) -> bool {
            true
        }

        fn is_versioned(&self) -> bool {
            true
        }

        fn default_version(&self) -> usize {
            3
        }

        fn version_from_revision(&self, revision: usize) -> usize {
            revision / 10
        }

        fn allocates_memory_in_arena(&self) -> bool {
            true
        }

        fn has_trivial_destructor(&self) -> bool {
            false
        }

        unsafe fn create(&self, place: AggregateDataPtr) -> Result<()> {
            let sequence = self.created.load(Ordering::Relaxed);
            if self.fail_at == Some(sequence) {
                let err: SendableError = "injected failure".into();
                return Err(err).context(CreateStateSnafu { func: self.name() });
            }
            assert_eq!(place.as_ptr() as usize % 4, 0);
            unsafe { place.write(sequence as u32) };
            self.created.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        unsafe fn destroy(&self, place: AggregateDataPtr) {
            let sequence = unsafe { *place.as_ref::<u32>() };
            self.destroyed.lock().unwrap().push(sequence as usize);
        }

        unsafe fn add(
            &self,
            _place: AggregateDataPtr,
            _columns: &[&ArrayImpl],
            _row: usize,
            _arena: &Arena,
        ) -> Result<()> {
            Ok(())
        }

        unsafe fn merge(
            &self,
            _place: AggregateDataPtr,
            _rhs: AggregateDataPtr,
            _arena: &Arena,
        ) -> Result<()> {
            Ok(())
        }

        unsafe fn serialize(
            &self,
            place: AggregateDataPtr,
            buf: &mut WriteBuffer,
            version: Option<usize>,
        ) -> Result<()> {
            self.versions.lock().unwrap().push(version);
            buf.write_u32(unsafe { *place.as_ref::<u32>() });
            Ok(())
        }

        unsafe fn deserialize(
            &self,
            place: AggregateDataPtr,
            buf: &mut ReadBuffer<'_>,
            version: Option<usize>,
            _arena: &Arena,
        ) -> Result<()> {
            self.deserialized_versions.lock().unwrap().push(version);
            let sequence = buf
                .read_u32()
                .context(DeserializeSnafu { func: self.name() })?;
            unsafe { *place.as_mut::<u32>() = sequence };
            Ok(())
        }

        unsafe fn insert_result_into(
            &self,
            place: AggregateDataPtr,
            to: &mut ArrayImpl,
            _arena: &Arena,
        ) -> Result<()> {
            let sequence = unsafe { *place.as_ref::<u32>() };
            to.push(Some(data_block::element::ElementImplRef::UInt64(
                sequence as u64,
            )))
            .context(ResultArrayMismatchSnafu { func: self.name() })
        }

        /// Merged results are shifted by 1000 to distinguish them from the finalized
        /// results
        unsafe fn insert_merge_result_into(
            &self,
            place: AggregateDataPtr,
            to: &mut ArrayImpl,
            _arena: &Arena,
        ) -> Result<()> {
            let sequence = unsafe { *place.as_ref::<u32>() };
            to.push(Some(data_block::element::ElementImplRef::UInt64(
                sequence as u64 + 1000,
            )))
            .context(ResultArrayMismatchSnafu { func: self.name() })
        }
    }

    fn recorder_resample(recorder: &Arc<Recorder>, total: i64) -> Resample<i64> {
        Resample::try_new(
            Arc::clone(recorder) as _,
            0,
            total,
            1,
            vec![LogicalType::BigInt],
        )
        .unwrap()
    }

    #[test]
    fn test_create_rollback() {
        for fail_at in 0..5 {
            let recorder = Arc::new(Recorder {
                fail_at: Some(fail_at),
                ..Default::default()
            });
            let func = Arc::new(recorder_resample(&recorder, 5));
            let err = StateSlab::try_new(func).unwrap_err();
            assert!(matches!(err, AggregationError::CreateState { .. }));

            let mut destroyed = recorder.destroyed.lock().unwrap().clone();
            destroyed.sort_unstable();
            assert_eq!(destroyed, (0..fail_at).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_create_and_destroy() {
        let recorder = Arc::new(Recorder::default());
        let func: Arc<dyn AggregateFunction> = Arc::new(recorder_resample(&recorder, 4));
        // Stride is rounded up to the alignment
        assert_eq!(func.size_of_data(), 4 * 12);
        assert_eq!(func.align_of_data(), 4);

        for _ in 0..3 {
            let slab = StateSlab::try_new(Arc::clone(&func)).unwrap();
            drop(slab);
        }
        let mut destroyed = recorder.destroyed.lock().unwrap().clone();
        destroyed.sort_unstable();
        assert_eq!(destroyed, (0..12).collect::<Vec<_>>());

        // destroy_up_to_state tears down all of the buckets too
        let arena = Arena::new();
        unsafe {
            let place = alloc_state_in(&arena, &*func).unwrap();
            func.destroy_up_to_state(place);
        }
        assert_eq!(recorder.destroyed.lock().unwrap().len(), 16);
    }

    #[test]
    fn test_capability_passthrough() {
        let recorder = Arc::new(Recorder::default());
        let func = recorder_resample(&recorder, 3);
        assert!(func.is_state());
        assert!(func.is_versioned());
        assert_eq!(func.default_version(), 3);
        assert_eq!(func.version_from_revision(54_321), 5432);
        assert!(func.allocates_memory_in_arena());
        assert!(!func.has_trivial_destructor());

        let sum = sum_resample(0, 3, 1).unwrap();
        assert!(!sum.is_state());
        assert!(!sum.is_versioned());
        assert!(sum.has_trivial_destructor());
    }

    #[test]
    fn test_version_is_forwarded() {
        let recorder = Arc::new(Recorder::default());
        let func = Arc::new(recorder_resample(&recorder, 3));
        let slab = StateSlab::try_new(func).unwrap();

        let mut buf = WriteBuffer::new();
        slab.serialize(&mut buf, Some(2)).unwrap();
        slab.serialize(&mut buf, None).unwrap();
        assert_eq!(buf.len(), 2 * 3 * 4);
        assert_eq!(
            *recorder.versions.lock().unwrap(),
            [Some(2), Some(2), Some(2), None, None, None]
        );
    }

    #[test]
    fn test_deserialize_version_is_forwarded() {
        let arena = Arena::new();
        let recorder = Arc::new(Recorder::default());
        let func: Arc<dyn AggregateFunction> = Arc::new(recorder_resample(&recorder, 3));
        // Buckets of the source are created with sequence 0, 1, 2
        let source = StateSlab::try_new(Arc::clone(&func)).unwrap();
        let mut buf = WriteBuffer::new();
        source.serialize(&mut buf, Some(4)).unwrap();

        // Buckets of the target are created with sequence 3, 4, 5
        let mut target = StateSlab::try_new(Arc::clone(&func)).unwrap();
        let mut reader = ReadBuffer::new(buf.as_slice());
        target.deserialize(&mut reader, Some(4), &arena).unwrap();
        assert!(reader.is_exhausted());
        assert_eq!(
            *recorder.deserialized_versions.lock().unwrap(),
            [Some(4), Some(4), Some(4)]
        );

        let mut reader = ReadBuffer::new(buf.as_slice());
        target.deserialize(&mut reader, None, &arena).unwrap();
        assert_eq!(
            recorder.deserialized_versions.lock().unwrap()[3..],
            [None, None, None]
        );

        let mut output = ArrayImpl::new(func.return_type());
        target.insert_result_into(&mut output, &arena).unwrap();
        assert_eq!(rows(&output), ["[0, 1, 2]"]);
    }

    #[test]
    fn test_insert_merge_result_is_forwarded() {
        let arena = Arena::new();
        let recorder = Arc::new(Recorder::default());
        let func: Arc<dyn AggregateFunction> = Arc::new(recorder_resample(&recorder, 3));
        let mut slab = StateSlab::try_new(Arc::clone(&func)).unwrap();

        let mut output = ArrayImpl::new(func.return_type());
        slab.insert_merge_result_into(&mut output, &arena).unwrap();
        slab.insert_result_into(&mut output, &arena).unwrap();
        assert_eq!(rows(&output), ["[1000, 1001, 1002]", "[0, 1, 2]"]);
    }

    #[test]
    fn test_result_array_mismatch() {
        let arena = Arena::new();
        let func = Arc::new(sum_resample(0, 10, 5).unwrap());
        let mut slab = StateSlab::try_new(func).unwrap();
        let mut output = ArrayImpl::new(LogicalType::BigInt);
        let err = slab.insert_result_into(&mut output, &arena).unwrap_err();
        assert!(matches!(err, AggregationError::ResultArrayMismatch { .. }));
    }
}
