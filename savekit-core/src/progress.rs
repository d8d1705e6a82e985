//! Milestone progress reporting for long-running operations

/// Sink for coarse progress. Purely observational: implementations must not
/// block and have no way to fail the operation.
pub trait Progress: Send + Sync {
    /// Operation started with `total` milestones ahead
    fn show(&self, current: u32, total: u32);
    /// Milestone `step` reached
    fn report(&self, step: u32);
    /// Operation finished, successfully or not
    fn hide(&self);
}

/// Discards all progress
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn show(&self, _current: u32, _total: u32) {}
    fn report(&self, _step: u32) {}
    fn hide(&self) {}
}

impl<P: Progress + ?Sized> Progress for std::sync::Arc<P> {
    fn show(&self, current: u32, total: u32) {
        (**self).show(current, total)
    }
    fn report(&self, step: u32) {
        (**self).report(step)
    }
    fn hide(&self) {
        (**self).hide()
    }
}

/// Shows on creation, hides on drop so every exit path is covered
pub(crate) struct ProgressScope<'a> {
    sink: &'a dyn Progress,
}

impl<'a> ProgressScope<'a> {
    pub(crate) fn start(sink: &'a dyn Progress, total: u32) -> Self {
        sink.show(0, total);
        Self { sink }
    }

    pub(crate) fn step(&self, step: u32) {
        self.sink.report(step);
    }
}

impl Drop for ProgressScope<'_> {
    fn drop(&mut self) {
        self.sink.hide();
    }
}
