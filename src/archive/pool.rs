use rayon::prelude::*;

/// Run `work` once per item on up to `jobs` threads, keeping input order.
///
/// Items are independent units; a failing item never stops its siblings.
pub fn run_per_object<T, R, F>(jobs: usize, items: &[T], work: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if jobs <= 1 || items.len() <= 1 {
        return items.iter().map(&work).collect();
    }

    match rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.min(items.len()))
        .thread_name(|i| format!("archive-worker-{i}"))
        .build()
    {
        Ok(pool) => pool.install(|| items.par_iter().map(&work).collect()),
        Err(_) => items.iter().map(&work).collect(),
    }
}
