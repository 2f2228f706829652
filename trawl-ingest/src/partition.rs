//! Work partitioning
//!
//! Splits an ordered work list into fixed-size batches. The final batch may be
//! shorter than `size`; an empty list yields no batches at all.

use crate::error::{IngestError, Result};

/// Splits `items` into consecutive batches of at most `size` items
///
/// Batch `k` holds `items[k * size .. min((k + 1) * size, items.len())]`.
///
/// # Errors
/// Returns [`IngestError::InvalidArgument`] when `size` is zero.
pub fn partition<T: Clone>(items: &[T], size: usize) -> Result<Vec<Vec<T>>> {
    if size == 0 {
        return Err(IngestError::InvalidArgument(
            "batch size must be greater than 0".to_string(),
        ));
    }

    Ok(items.chunks(size).map(<[T]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_rejected() {
        let result = partition(&[1, 2, 3], 0);
        assert!(matches!(result, Err(IngestError::InvalidArgument(_))));
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        let batches = partition::<u32>(&[], 25).unwrap();
        assert!(batches.is_empty());
    }

    #[test]
    fn test_last_batch_is_shorter() {
        let items: Vec<u32> = (0..55).collect();
        let batches = partition(&items, 25).unwrap();

        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![25, 25, 5]);
        assert_eq!(batches[1][0], 25);
        assert_eq!(batches[2][4], 54);
    }

    #[test]
    fn test_concatenation_preserves_order() {
        for len in 1..40usize {
            for size in 1..12usize {
                let items: Vec<usize> = (0..len).collect();
                let batches = partition(&items, size).unwrap();

                let flattened: Vec<usize> = batches.concat();
                assert_eq!(flattened, items);

                let (last, full) = batches.split_last().unwrap();
                assert!(full.iter().all(|b| b.len() == size));
                assert!(!last.is_empty() && last.len() <= size);
            }
        }
    }

    #[test]
    fn test_repartition_is_stable() {
        let items: Vec<char> = "abcdefghijklmnopq".chars().collect();
        let once = partition(&items, 4).unwrap();
        let twice = partition(&once.concat(), 4).unwrap();
        assert_eq!(once, twice);
    }
}
