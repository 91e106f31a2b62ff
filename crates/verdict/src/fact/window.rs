use std::collections::VecDeque;
use std::time::Duration;

/// A bounded FIFO of fetch durations with a running mean.
///
/// The mean damps single-fetch outliers, so the SLA check compares against
/// it rather than the latest observation.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
    sum: f64,
}

impl RollingWindow {
    /// Creates a window keeping up to `capacity` samples (at least one).
    pub fn new(capacity: usize) -> RollingWindow {
        let capacity = capacity.max(1);
        RollingWindow {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
        }
    }

    /// Pushes a fetch duration, dropping the oldest sample at capacity.
    pub fn push(&mut self, sample: Duration) {
        let millis = sample.as_secs_f64() * 1_000.0;
        if self.samples.len() == self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum -= evicted;
            }
        }
        self.samples.push_back(millis);
        self.sum += millis;
    }

    /// The mean of the kept samples, in milliseconds (0.0 when empty).
    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f64
        }
    }

    /// How many samples the window currently holds.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_averages_zero() {
        assert_eq!(RollingWindow::new(4).average_ms(), 0.0);
    }

    #[test]
    fn mean_follows_the_samples() {
        let mut window = RollingWindow::new(4);
        window.push(Duration::from_millis(10));
        window.push(Duration::from_millis(30));
        assert_eq!(window.average_ms(), 20.0);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn oldest_samples_roll_out_at_capacity() {
        let mut window = RollingWindow::new(2);
        window.push(Duration::from_millis(100));
        window.push(Duration::from_millis(10));
        window.push(Duration::from_millis(20));
        // The 100ms outlier has rolled out.
        assert_eq!(window.average_ms(), 15.0);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn zero_capacity_still_keeps_the_latest_sample() {
        let mut window = RollingWindow::new(0);
        window.push(Duration::from_millis(8));
        assert_eq!(window.average_ms(), 8.0);
    }
}
