use std::sync::{Arc, PoisonError, RwLock};

/// Raw fraction reported while the amount of remaining work is unknown.
pub const INDETERMINATE: f64 = -1.0;

/// Point-in-time view of a task's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// `INDETERMINATE` or a value in `[0, 1]`.
    pub fraction: f64,
    pub status: Option<String>,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            fraction: INDETERMINATE,
            status: None,
        }
    }
}

impl ProgressSnapshot {
    pub fn is_indeterminate(&self) -> bool {
        self.fraction < 0.0
    }

    /// Whole percent for display, `None` while indeterminate.
    pub fn percent(&self) -> Option<u8> {
        if self.is_indeterminate() {
            None
        } else {
            Some((self.fraction * 100.0).round() as u8)
        }
    }
}

/// Shared, thread-safe progress source.
///
/// The computation owns a clone and writes to it; displays poll
/// [`Progress::snapshot`] from any thread without blocking on the work.
/// While determinate, the fraction never moves backwards.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    inner: Arc<RwLock<ProgressSnapshot>>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Update fraction and status together so readers never see a torn pair.
    pub fn set(&self, fraction: f64, status: impl Into<String>) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.fraction = next_fraction(guard.fraction, fraction);
        guard.status = Some(status.into());
    }

    pub fn set_fraction(&self, fraction: f64) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.fraction = next_fraction(guard.fraction, fraction);
    }

    pub fn set_status(&self, status: impl Into<String>) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.status = Some(status.into());
    }

    pub fn set_indeterminate(&self) {
        self.set_fraction(INDETERMINATE);
    }
}

fn next_fraction(current: f64, requested: f64) -> f64 {
    if requested.is_nan() || requested < 0.0 {
        return INDETERMINATE;
    }
    let requested = requested.min(1.0);
    if current >= 0.0 && requested < current {
        current
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_indeterminate_without_status() {
        let progress = Progress::new();
        let snapshot = progress.snapshot();
        assert!(snapshot.is_indeterminate());
        assert_eq!(snapshot.fraction, INDETERMINATE);
        assert_eq!(snapshot.status, None);
        assert_eq!(snapshot.percent(), None);
    }

    #[test]
    fn zero_is_distinct_from_indeterminate() {
        let progress = Progress::new();
        progress.set(0.0, "Loading");
        let snapshot = progress.snapshot();
        assert!(!snapshot.is_indeterminate());
        assert_eq!(snapshot.percent(), Some(0));
    }

    #[test]
    fn determinate_fraction_never_decreases() {
        let progress = Progress::new();
        let mut seen = Vec::new();
        for requested in [0.1, 0.4, 0.2, 0.4, 0.9, 0.5, 1.7] {
            progress.set_fraction(requested);
            seen.push(progress.snapshot().fraction);
        }
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]), "{seen:?}");
        assert_eq!(progress.snapshot().fraction, 1.0);
    }

    #[test]
    fn indeterminate_can_interrupt_determinate_phase() {
        let progress = Progress::new();
        progress.set(0.3, "Checking");
        progress.set_indeterminate();
        assert!(progress.snapshot().is_indeterminate());
        assert_eq!(progress.snapshot().status.as_deref(), Some("Checking"));

        progress.set_fraction(f64::NAN);
        assert!(progress.snapshot().is_indeterminate());
    }

    #[test]
    fn readable_from_other_threads() {
        let progress = Progress::new();
        let reader = progress.clone();
        progress.set(0.5, "Halfway");
        let snapshot = std::thread::spawn(move || reader.snapshot())
            .join()
            .unwrap();
        assert_eq!(snapshot.percent(), Some(50));
        assert_eq!(snapshot.status.as_deref(), Some("Halfway"));
    }
}
