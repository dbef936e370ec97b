/// Progress indicator for long-running loops
pub trait Progress {
    /// Advance by `i` steps
    fn inc(&self, i: u64);

    fn finish(&self);
}
