/// Split `items` into contiguous chunks of `size`, the last one holding the
/// remainder. Empty input yields no chunks.
///
/// Panics if `size` is zero: call sites pass fixed API limits, so a zero is a
/// bug rather than bad input.
pub fn batch<T>(items: &[T], size: usize) -> Vec<&[T]> {
    assert!(size > 0, "batch size must be greater than 0");
    items.chunks(size).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batching() {
        let cases: Vec<(&str, Vec<i32>, usize, Vec<Vec<i32>>)> = vec![
            ("empty", vec![], 1, vec![]),
            ("single", vec![1], 1, vec![vec![1]]),
            ("single with larger size", vec![1], 2, vec![vec![1]]),
            ("multiple in unit batches", vec![1, 2, 3], 1, vec![vec![1], vec![2], vec![3]]),
            ("multiple in larger, even batches", vec![1, 2, 3, 4], 2, vec![vec![1, 2], vec![3, 4]]),
            ("multiple in larger, odd batches", vec![1, 2, 3, 4, 5], 2, vec![vec![1, 2], vec![3, 4], vec![5]]),
        ];

        for (name, input, size, expected) in cases {
            let actual: Vec<Vec<i32>> = batch(&input, size).into_iter().map(<[i32]>::to_vec).collect();
            assert_eq!(actual, expected, "case: {}", name);
        }
    }

    #[test]
    fn batches_reassemble_to_input() {
        let input: Vec<usize> = (0..97).collect();
        for size in 1..=40 {
            let batches = batch(&input, size);
            let (last, full) = batches.split_last().unwrap();

            assert!(full.iter().all(|b| b.len() == size));
            assert!(!last.is_empty() && last.len() <= size);
            assert_eq!(batches.concat(), input);
        }
    }

    #[test]
    #[should_panic(expected = "batch size must be greater than 0")]
    fn zero_size_panics() {
        batch(&[1, 2, 3], 0);
    }
}
