//! Parallel in-memory merge sort.
//!
//! A chunk is sorted by splitting it into one contiguous sub-range per
//! worker, merge-sorting the sub-ranges concurrently on the thread pool, and
//! then merging adjacent sorted units in a sequential pairwise cascade of
//! doubling width. Workers touch disjoint sub-slices, so the only
//! synchronization is the scope join before the cascade starts.

use log;

/// Sorts `buf` in non-decreasing order using up to `threads` workers.
///
/// The worker count clamps to the slice length; with a single worker the
/// whole slice is merge-sorted on the calling thread. The cascade always runs
/// on the calling thread, after every worker has finished.
pub fn sort_chunk(pool: &rayon::ThreadPool, buf: &mut [i32], threads: usize) {
    let len = buf.len();
    if len <= 1 {
        return;
    }

    let threads = threads.min(len);
    // Elements per worker; the last worker absorbs the remainder.
    let npt = len / threads;

    if threads == 1 {
        merge_sort(buf);
        return;
    }

    log::debug!("sorting chunk: len={}, workers={}", len, threads);

    pool.scope(|scope| {
        let mut rest = &mut *buf;
        for _ in 0..threads - 1 {
            let (unit, tail) = rest.split_at_mut(npt);
            scope.spawn(move |_| merge_sort(unit));
            rest = tail;
        }
        scope.spawn(move |_| merge_sort(rest));
    });

    // Pairwise cascade: merge adjacent sorted units, doubling the unit width
    // each pass. The right boundary clamps to `len`, which is what absorbs
    // the oversized unit owned by the last worker.
    let mut width = npt;
    while width < len {
        let mut left = 0;
        while left + width < len {
            let mid = left + width;
            let right = usize::min(left + 2 * width, len);
            merge(buf, left, mid, right);
            left += 2 * width;
        }
        width *= 2;
    }
}

/// Sequential top-down merge sort.
fn merge_sort(arr: &mut [i32]) {
    let len = arr.len();
    if len <= 1 {
        return;
    }

    let mid = len / 2;
    let (left, right) = arr.split_at_mut(mid);
    merge_sort(left);
    merge_sort(right);

    merge(arr, 0, mid, len);
}

/// Merges the adjacent sorted ranges `[left, mid)` and `[mid, right)`.
fn merge(arr: &mut [i32], left: usize, mid: usize, right: usize) {
    let left_part = arr[left..mid].to_vec();
    let right_part = arr[mid..right].to_vec();

    let mut i = 0;
    let mut j = 0;
    let mut k = left;

    while i < left_part.len() && j < right_part.len() {
        if left_part[i] <= right_part[j] {
            arr[k] = left_part[i];
            i += 1;
        } else {
            arr[k] = right_part[j];
            j += 1;
        }
        k += 1;
    }

    while i < left_part.len() {
        arr[k] = left_part[i];
        i += 1;
        k += 1;
    }
    while j < right_part.len() {
        arr[k] = right_part[j];
        j += 1;
        k += 1;
    }
}

#[cfg(test)]
mod test {
    use rand::seq::SliceRandom;
    use rstest::*;

    use super::{merge_sort, sort_chunk};

    fn pool(threads: usize) -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    #[case(5)]
    #[case(8)]
    fn test_sort_chunk(#[case] threads: usize) {
        let pool = pool(threads);

        let mut data = Vec::from_iter(0..1000);
        data.shuffle(&mut rand::thread_rng());
        let mut expected = data.clone();
        expected.sort_unstable();

        sort_chunk(&pool, &mut data, threads);
        assert_eq!(data, expected);
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![7])]
    #[case(vec![2, 1])]
    #[case(vec![3, 1, 2, 1])]
    #[case(vec![0, -1, i32::MIN, i32::MAX, 0])]
    fn test_sort_chunk_shorter_than_workers(#[case] mut data: Vec<i32>) {
        // Worker count clamps to the slice length.
        let pool = pool(4);

        let mut expected = data.clone();
        expected.sort_unstable();

        sort_chunk(&pool, &mut data, 8);
        assert_eq!(data, expected);
    }

    #[rstest]
    #[case(997, 3)]
    #[case(100, 7)]
    #[case(64, 6)]
    fn test_sort_chunk_uneven_split(#[case] len: i32, #[case] threads: usize) {
        // Length not divisible by the worker count: the cascade picks up the
        // tail owned by the last worker.
        let pool = pool(threads);

        let mut data = Vec::from_iter((0..len).rev());
        let mut expected = data.clone();
        expected.sort_unstable();

        sort_chunk(&pool, &mut data, threads);
        assert_eq!(data, expected);
    }

    #[test]
    fn test_merge_sort_sequential() {
        let mut data = vec![5, -3, 4, 4, 0, -7, 2];
        merge_sort(&mut data);
        assert_eq!(data, vec![-7, -3, 0, 2, 4, 4, 5]);
    }
}
