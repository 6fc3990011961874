//! Contiguous sharding of the admitted task list.

/// Split `items` into shards for `workers` concurrent workers.
///
/// The worker count is clamped to `1..=items.len()`. The first `W'` shards hold
/// `len / W'` items each; when the division leaves a remainder, one extra shard
/// holds the last `len % W'` items. Shard contents keep the input order and
/// concatenating the shards yields the input.
pub fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let len = items.len();
    if len == 0 {
        return Vec::new();
    }

    let workers = workers.clamp(1, len);
    let shard_size = len / workers;
    let mut shards = Vec::with_capacity(workers + 1);
    let mut items = items.into_iter();

    for _ in 0..workers {
        shards.push(items.by_ref().take(shard_size).collect());
    }

    let remainder: Vec<T> = items.collect();
    if !remainder.is_empty() {
        shards.push(remainder);
    }

    shards
}
