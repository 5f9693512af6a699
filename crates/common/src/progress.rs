//! Generic progress callback trait and implementations.

use std::marker::PhantomData;

/// Generic progress callback trait.
///
/// Type parameter `T` is the progress data type, allowing different
/// operations (batch transfers, folder scans, DICOM loads) to report their
/// own progress shape while sharing the same callback pattern.
pub trait ProgressCallback<T>: Send + Sync {
    /// Called with progress updates.
    ///
    /// # Returns
    /// - `true` to continue the operation
    /// - `false` to cancel the operation
    fn on_progress(&self, progress: &T) -> bool;
}

/// A no-op progress callback that always continues.
pub struct NoOpProgress;

impl<T> ProgressCallback<T> for NoOpProgress {
    fn on_progress(&self, _progress: &T) -> bool {
        true
    }
}

/// A progress callback that wraps a closure.
pub struct FnProgress<F, T> {
    callback: F,
    _marker: PhantomData<T>,
}

impl<F, T> FnProgress<F, T>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    /// Create a new closure-based progress callback.
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            _marker: PhantomData,
        }
    }
}

impl<F, T> ProgressCallback<T> for FnProgress<F, T>
where
    F: Fn(&T) -> bool + Send + Sync,
    T: Send + Sync,
{
    fn on_progress(&self, progress: &T) -> bool {
        (self.callback)(progress)
    }
}

/// Create a progress callback from a closure.
pub fn progress_fn<F, T>(f: F) -> FnProgress<F, T>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    FnProgress::new(f)
}
