use crate::error::AntiparserError;
use crate::integer::FixedInt;
use crate::object::{DataField, DataObject, MutationMode};
use crate::strings::{CharSet, KeywordString};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::BTreeSet;
use tracing::trace;

/// Sizes that commonly sit on buffer boundaries in parsers.
pub const SIZE_BOUNDARIES: [i64; 12] = [
    16, 32, 128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65536,
];

/// How far past each boundary incremental mode probes.
pub const INCREMENT_DELTA: i64 = 4;

/// A `Mutator` rewrites the content of a single data object in place.
///
/// # Type Parameters
/// * `R`: The random number generator driving every sampling decision.
pub trait Mutator<R: Rng + ?Sized> {
    /// Mutates `object` according to this strategy.
    ///
    /// # Returns
    /// `Err(AntiparserError::Configuration)` when the object has nothing to
    /// sample from (no keywords, empty character range).
    fn mutate(&mut self, object: &mut DataObject, rng: &mut R) -> Result<(), AntiparserError>;
}

/// Fresh content of a random length on every call.
///
/// String-like objects get a length drawn from `[min_size, max_size)` (exactly
/// `min_size` when both bounds are equal) filled with bytes sampled from their
/// character range. Integers get a value from `[min_size, max_size)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomMutator;

impl<R: Rng + ?Sized> Mutator<R> for RandomMutator {
    fn mutate(&mut self, object: &mut DataObject, rng: &mut R) -> Result<(), AntiparserError> {
        match object {
            DataObject::Freeform(string) | DataObject::CString(string) => {
                let length = random_length(string.min_size(), string.max_size(), rng);
                let content = sample_bytes(string.charset(), length, rng)?;
                string.set_content(content);
            }
            DataObject::Keyword(keyword) => {
                select_keyword(keyword, rng)?;
                let length = random_length(keyword.min_size(), keyword.max_size(), rng);
                let content = sample_bytes(keyword.charset(), length, rng)?;
                keyword.set_content(content);
            }
            DataObject::Int(int) => mutate_int(int, rng),
        }
        Ok(())
    }
}

/// Content whose length steps up the boundary ladder by one rung per call.
///
/// The length sequence is deterministic; the bytes, and the keyword of a
/// keyword string, are freshly sampled on every step. Integers are left as is.
#[derive(Debug, Default, Clone, Copy)]
pub struct IncrementalMutator;

impl<R: Rng + ?Sized> Mutator<R> for IncrementalMutator {
    fn mutate(&mut self, object: &mut DataObject, rng: &mut R) -> Result<(), AntiparserError> {
        match object {
            DataObject::Freeform(string) | DataObject::CString(string) => {
                let target = next_incremental_size(
                    string.content_size(),
                    string.min_size(),
                    string.max_size(),
                );
                let content = sample_bytes(string.charset(), target, rng)?;
                string.set_content(content);
            }
            DataObject::Keyword(keyword) => {
                let target = next_incremental_size(
                    keyword.content_size(),
                    keyword.min_size(),
                    keyword.max_size(),
                );
                select_keyword(keyword, rng)?;
                // Keyword content is one byte shorter than the ladder target.
                let content = sample_bytes(keyword.charset(), target.saturating_sub(1), rng)?;
                keyword.set_content(content);
            }
            DataObject::Int(_) => {}
        }
        Ok(())
    }
}

/// Applies the object's own mutation mode to it, unless it is static.
pub fn mutate_object<R: Rng + ?Sized>(
    object: &mut DataObject,
    rng: &mut R,
) -> Result<(), AntiparserError> {
    if object.is_static() {
        return Ok(());
    }
    match object.mode() {
        MutationMode::Random => RandomMutator.mutate(object, rng)?,
        MutationMode::Incremental => IncrementalMutator.mutate(object, rng)?,
    }
    trace!(kind = object.kind(), size = ?object.content_size(), "object mutated");
    Ok(())
}

/// Builds the ascending, de-duplicated ladder of candidate lengths:
/// `[min, min+delta]`, `[b, b+delta]` for every boundary strictly between the
/// bounds, and `[max, max+delta]`.
pub fn size_ladder(min_size: i64, max_size: i64) -> Vec<i64> {
    let mut ladder = BTreeSet::new();
    ladder.extend(min_size..=min_size.saturating_add(INCREMENT_DELTA));
    for boundary in SIZE_BOUNDARIES {
        if boundary > min_size && boundary < max_size {
            ladder.extend(boundary..=boundary + INCREMENT_DELTA);
        }
    }
    ladder.extend(max_size..=max_size.saturating_add(INCREMENT_DELTA));
    ladder.into_iter().collect()
}

/// The length incremental mode moves to from `current_size`.
///
/// Below `min_size` it jumps to `min_size`; on a rung it moves to the next one,
/// and on the last rung (`max_size + delta`) it stays there. Lengths above the
/// ceiling are clamped to it first. A length between rungs restarts the climb
/// from empty content.
pub fn next_incremental_size(current_size: usize, min_size: i64, max_size: i64) -> usize {
    let ceiling = max_size.saturating_add(INCREMENT_DELTA);
    let current = i64::try_from(current_size).unwrap_or(i64::MAX).min(ceiling);
    if current < min_size {
        return to_length(min_size);
    }
    let ladder = size_ladder(min_size, max_size);
    let next = match ladder.iter().position(|&size| size == current) {
        Some(index) => ladder.get(index + 1).or(ladder.last()).copied().unwrap_or(0),
        None => 0,
    };
    to_length(next)
}

fn to_length(size: i64) -> usize {
    usize::try_from(size).unwrap_or(0)
}

fn random_length<R: Rng + ?Sized>(min_size: i64, max_size: i64, rng: &mut R) -> usize {
    if min_size >= max_size {
        return to_length(min_size);
    }
    to_length(rng.random_range(min_size..max_size))
}

fn sample_bytes<R: Rng + ?Sized>(
    charset: &CharSet,
    length: usize,
    rng: &mut R,
) -> Result<Vec<u8>, AntiparserError> {
    if length == 0 {
        return Ok(Vec::new());
    }
    let range = charset.range();
    if range.is_empty() {
        return Err(AntiparserError::config(format!(
            "cannot sample {length} bytes from an empty character range"
        )));
    }
    Ok((0..length)
        .map(|_| range[rng.random_range(0..range.len())])
        .collect())
}

fn select_keyword<R: Rng + ?Sized>(
    keyword: &mut KeywordString,
    rng: &mut R,
) -> Result<(), AntiparserError> {
    let chosen = keyword
        .keywords()
        .choose(rng)
        .cloned()
        .ok_or_else(|| AntiparserError::config("keyword string has no keywords to choose from"))?;
    keyword.set_current_keyword(chosen)
}

fn mutate_int<R: Rng + ?Sized>(int: &mut FixedInt, rng: &mut R) {
    let (min, max) = (int.min_size(), int.max_size());
    let value = if min >= max {
        min
    } else {
        rng.random_range(min..max)
    };
    int.set_content(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strings::FreeformString;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    fn incremental_string(min: i64, max: i64) -> DataObject {
        let mut string = FreeformString::new();
        string.set_bounds(min, max).unwrap();
        string.set_mode(MutationMode::Incremental).unwrap();
        DataObject::from(string)
    }

    #[test]
    fn ladder_covers_bounds_and_inner_boundaries() {
        assert_eq!(size_ladder(1, 5), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(
            size_ladder(1, 100),
            vec![1, 2, 3, 4, 5, 16, 17, 18, 19, 20, 32, 33, 34, 35, 36, 100, 101, 102, 103, 104]
        );
    }

    #[test]
    fn ladder_excludes_boundaries_equal_to_bounds_and_merges_overlaps() {
        let ladder = size_ladder(14, 32);
        assert_eq!(
            ladder,
            vec![14, 15, 16, 17, 18, 19, 20, 32, 33, 34, 35, 36]
        );
        assert!(ladder.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn next_size_follows_ladder_and_halts_at_ceiling() {
        assert_eq!(next_incremental_size(0, 1, 100), 1);
        assert_eq!(next_incremental_size(5, 1, 100), 16);
        assert_eq!(next_incremental_size(36, 1, 100), 100);
        assert_eq!(next_incremental_size(103, 1, 100), 104);
        assert_eq!(next_incremental_size(104, 1, 100), 104);
        // Oversized content is clamped to the ceiling, which is a fixed point.
        assert_eq!(next_incremental_size(5000, 1, 100), 104);
    }

    #[test]
    fn next_size_between_rungs_restarts_from_empty() {
        assert_eq!(next_incremental_size(10, 1, 100), 0);
        assert_eq!(next_incremental_size(0, 1, 100), 1);
    }

    #[test]
    fn extreme_bounds_saturate_instead_of_overflowing() {
        assert_eq!(next_incremental_size(0, 0, i64::MAX), 1);
        assert_eq!(*size_ladder(0, i64::MAX).last().unwrap(), i64::MAX);

        let mut rng = ChaCha8Rng::from_seed([18u8; 32]);
        let mut object = incremental_string(0, i64::MAX - INCREMENT_DELTA);
        mutate_object(&mut object, &mut rng).unwrap();
        mutate_object(&mut object, &mut rng).unwrap();
        assert_eq!(object.content_size(), Some(2));
    }

    #[test]
    fn random_string_with_equal_bounds_has_exact_length() {
        let mut rng = ChaCha8Rng::from_seed([7u8; 32]);
        let mut string = FreeformString::new();
        string.set_bounds(12, 12).unwrap();
        let mut object = DataObject::from(string);
        for _ in 0..10 {
            mutate_object(&mut object, &mut rng).unwrap();
            assert_eq!(object.content_size(), Some(12));
        }
    }

    #[test]
    fn random_string_length_is_half_open_and_respects_illegal_chars() {
        let mut rng = ChaCha8Rng::from_seed([8u8; 32]);
        let mut string = FreeformString::new();
        string.set_bounds(2, 6).unwrap();
        string.set_illegal_chars(b"\r\n").unwrap();
        let mut object = DataObject::from(string);
        for _ in 0..200 {
            mutate_object(&mut object, &mut rng).unwrap();
            let DataObject::Freeform(s) = &object else {
                panic!("variant changed");
            };
            assert!((2..6).contains(&s.content_size()));
            assert!(!s.content().contains(&b'\r') && !s.content().contains(&b'\n'));
        }
    }

    #[test]
    fn random_keyword_selects_from_list() {
        let mut rng = ChaCha8Rng::from_seed([9u8; 32]);
        let mut keyword = KeywordString::new(["CWD", "MKD", "RMD"]).unwrap();
        keyword.set_bounds(3, 3).unwrap();
        let mut object = DataObject::from(keyword);
        let mut seen = BTreeSet::new();
        for _ in 0..60 {
            mutate_object(&mut object, &mut rng).unwrap();
            let DataObject::Keyword(k) = &object else {
                panic!("variant changed");
            };
            assert_eq!(k.content_size(), 3);
            seen.insert(k.current_keyword().to_vec());
        }
        assert_eq!(seen.len(), 3, "every keyword should be picked at least once");
    }

    #[test]
    fn random_integer_stays_in_half_open_bounds() {
        let mut rng = ChaCha8Rng::from_seed([10u8; 32]);
        let mut int = FixedInt::int8();
        int.set_signed(true);
        int.set_bounds(-3, 3).unwrap();
        let mut object = DataObject::from(int);
        for _ in 0..100 {
            mutate_object(&mut object, &mut rng).unwrap();
            let DataObject::Int(i) = &object else {
                panic!("variant changed");
            };
            assert!((-3..3).contains(&i.content()));
        }
    }

    #[test]
    fn random_integer_with_equal_bounds_takes_that_value() {
        let mut rng = ChaCha8Rng::from_seed([11u8; 32]);
        let mut int = FixedInt::int16();
        int.set_bounds(77, 77).unwrap();
        let mut object = DataObject::from(int);
        mutate_object(&mut object, &mut rng).unwrap();
        assert_eq!(object, {
            let mut expected = FixedInt::int16();
            expected.set_bounds(77, 77).unwrap();
            expected.set_content(77);
            DataObject::from(expected)
        });
    }

    #[test]
    fn incremental_mode_is_a_noop_for_integers() {
        let mut rng = ChaCha8Rng::from_seed([12u8; 32]);
        let mut int = FixedInt::int32();
        int.set_mode(MutationMode::Incremental).unwrap();
        int.set_content(1234);
        let mut object = DataObject::from(int);
        mutate_object(&mut object, &mut rng).unwrap();
        let DataObject::Int(i) = &object else {
            panic!("variant changed");
        };
        assert_eq!(i.content(), 1234);
    }

    #[test]
    fn incremental_lengths_are_bounded_and_non_decreasing() {
        let mut rng = ChaCha8Rng::from_seed([13u8; 32]);
        let mut object = incremental_string(1, 5);
        let mut lengths = Vec::new();
        for _ in 0..20 {
            mutate_object(&mut object, &mut rng).unwrap();
            lengths.push(object.content_size().unwrap_or_default());
        }
        assert!(lengths.iter().all(|&len| len <= 9));
        assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(&lengths[..9], &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert!(lengths[9..].iter().all(|&len| len == 9));
    }

    #[test]
    fn incremental_reaches_and_keeps_fixed_point() {
        let mut rng = ChaCha8Rng::from_seed([14u8; 32]);
        let mut object = incremental_string(1, 1024);
        let ceiling = 1024 + INCREMENT_DELTA as usize;
        let mut reached = false;
        for _ in 0..200 {
            mutate_object(&mut object, &mut rng).unwrap();
            let size = object.content_size().unwrap_or_default();
            assert!(size <= ceiling);
            if reached {
                assert_eq!(size, ceiling, "fixed point must repeat");
            }
            reached |= size == ceiling;
        }
        assert!(reached);
    }

    #[test]
    fn incremental_cstring_samples_full_target_length() {
        let mut rng = ChaCha8Rng::from_seed([15u8; 32]);
        let mut string = FreeformString::new();
        string.set_bounds(3, 10).unwrap();
        string.set_mode(MutationMode::Incremental).unwrap();
        let mut object = DataObject::cstring(string);
        mutate_object(&mut object, &mut rng).unwrap();
        assert_eq!(object.content_size(), Some(3));
        mutate_object(&mut object, &mut rng).unwrap();
        assert_eq!(object.content_size(), Some(4));
    }

    // Keyword strings sample one byte fewer than the ladder target. Because the
    // next step is computed from the shortened content, a keyword string whose
    // content starts below `min_size` stays pinned at `min_size - 1`.
    #[test]
    fn incremental_keyword_content_is_one_short_of_target() {
        let mut rng = ChaCha8Rng::from_seed([16u8; 32]);
        let mut keyword = KeywordString::new(["A", "B"]).unwrap();
        keyword.set_bounds(3, 10).unwrap();
        keyword.set_mode(MutationMode::Incremental).unwrap();
        let mut object = DataObject::from(keyword);
        for _ in 0..5 {
            mutate_object(&mut object, &mut rng).unwrap();
            assert_eq!(object.content_size(), Some(2));
        }

        let DataObject::Keyword(k) = &mut object else {
            panic!("variant changed");
        };
        k.set_content("xxxx");
        mutate_object(&mut object, &mut rng).unwrap();
        // Ladder target after 4 is 5, minus the reserved byte.
        assert_eq!(object.content_size(), Some(4));
    }

    #[test]
    fn static_objects_are_untouched() {
        let mut rng = ChaCha8Rng::from_seed([17u8; 32]);
        let mut string = FreeformString::with_content("fixed");
        string.set_static(true);
        let mut object = DataObject::from(string);
        let before = object.clone();
        for _ in 0..10 {
            mutate_object(&mut object, &mut rng).unwrap();
        }
        assert_eq!(object, before);
    }
}
