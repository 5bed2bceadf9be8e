//! Backward as-of lookup over key-sorted slices.
//!
//! For a query key `q`, the match is the **last** element whose key is `<= q`:
//!
//! - equal keys are eligible (a same-day fixing matches)
//! - duplicate keys resolve to the last duplicate
//! - a query before the first key has no match
//!
//! Slices must be sorted by key (non-decreasing). This is the building block for
//! every temporal join in the pipeline.

/// Position of the as-of match for `query`, if any.
pub fn asof_position<T, K, F>(sorted: &[T], query: K, key: F) -> Option<usize>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    // Number of elements with key <= query; the match is the one just before.
    let after = sorted.partition_point(|item| key(item) <= query);
    after.checked_sub(1)
}

/// The as-of matched element for `query`, if any.
pub fn asof_lookup<T, K, F>(sorted: &[T], query: K, key: F) -> Option<&T>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    asof_position(sorted, query, key).map(|idx| &sorted[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<(i32, &'static str)> {
        vec![(1, "a"), (3, "b"), (3, "c"), (7, "d")]
    }

    #[test]
    fn query_before_first_key_has_no_match() {
        let data = keys();
        assert!(asof_lookup(&data, 0, |x| x.0).is_none());
        assert!(asof_lookup::<(i32, &str), i32, _>(&[], 5, |x| x.0).is_none());
    }

    #[test]
    fn equal_key_is_eligible() {
        let data = keys();
        assert_eq!(asof_lookup(&data, 1, |x| x.0).map(|x| x.1), Some("a"));
        assert_eq!(asof_lookup(&data, 7, |x| x.0).map(|x| x.1), Some("d"));
    }

    #[test]
    fn falls_back_to_previous_key() {
        let data = keys();
        assert_eq!(asof_lookup(&data, 2, |x| x.0).map(|x| x.1), Some("a"));
        assert_eq!(asof_lookup(&data, 6, |x| x.0).map(|x| x.1), Some("c"));
        assert_eq!(asof_lookup(&data, 100, |x| x.0).map(|x| x.1), Some("d"));
    }

    #[test]
    fn duplicate_keys_resolve_to_last() {
        let data = keys();
        assert_eq!(asof_position(&data, 3, |x| x.0), Some(2));
    }
}
