//! Progress reporting shared by the scanner, injector and translation driver

/// Progress callback: percentage (0.0 to 100.0) and a status line
///
/// Must be `Sync + Send` so a front end can run a pass on a worker thread.
pub type ProgressCallback<'a> = &'a (dyn Fn(f32, &str) + Sync + Send);

/// A callback that discards every update
pub fn no_progress(_percent: f32, _status: &str) {}

/// Percentage for the `current`-th (1-based) of `total` items
#[must_use]
pub fn percent(current: usize, total: usize) -> f32 {
    if total == 0 {
        100.0
    } else {
        current as f32 / total as f32 * 100.0
    }
}
