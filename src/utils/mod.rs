use std::time::Instant;

use log::debug;

/// Logs the wall time of the enclosing scope at debug level when dropped.
pub(crate) struct TimedContext {
    name: &'static str,
    start: Instant,
}

impl TimedContext {
    pub(crate) fn new(name: &'static str) -> Self {
        debug!("{} started", name);
        TimedContext {
            name,
            start: Instant::now(),
        }
    }
}

impl Drop for TimedContext {
    fn drop(&mut self) {
        debug!("{} took {:.3?}", self.name, self.start.elapsed());
    }
}

/// Permutation sorting `values` ascending.
pub(crate) fn ascending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    order
}
