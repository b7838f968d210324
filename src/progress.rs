/// Receives a percent-complete value (0..=100).
pub type ProgressCallback<'a> = dyn Fn(u32) + 'a;

/// Percent reporter that only forwards a value when it changes.
pub struct PercentProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    total: u64,
    last: Option<u32>,
}

impl<'a> PercentProgress<'a> {
    pub fn new(inner: &'a ProgressCallback<'a>, total: u64) -> Self {
        Self {
            inner,
            total,
            last: None,
        }
    }

    pub fn percent(count: u64, total: u64) -> u32 {
        if total == 0 {
            return 100;
        }
        (count as f64 / total as f64 * 100.0).round() as u32
    }

    /// Report `count` records done.
    pub fn report(&mut self, count: u64) {
        let percent = Self::percent(count, self.total);
        if self.last != Some(percent) {
            self.last = Some(percent);
            (self.inner)(percent);
        }
    }

    /// Always emits 100, even if it was the last value reported.
    pub fn finish(self) {
        (self.inner)(100);
    }
}
