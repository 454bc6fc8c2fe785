//! Fixed-capacity rolling window with O(1) mean/variance.
//!
//! A circular buffer of compile-time capacity `N` maintaining a running
//! sum and sum of squares. Min, max and percentiles are recomputed from
//! the live buffer on demand; keep those out of hot paths.

/// Rolling window over `f64` samples with capacity `N`.
#[derive(Debug, Clone)]
pub struct RollingWindow<const N: usize> {
    buffer: [f64; N],
    head: usize,
    count: usize,
    sum: f64,
    sum_sq: f64,
}

impl<const N: usize> RollingWindow<N> {
    /// Creates an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: [0.0; N],
            head: 0,
            count: 0,
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    /// Pushes a sample, evicting the oldest when full. O(1).
    pub fn add(&mut self, value: f64) {
        if self.count == N {
            let old = self.buffer[self.head];
            self.sum -= old;
            self.sum_sq -= old * old;
        } else {
            self.count += 1;
        }
        self.buffer[self.head] = value;
        self.sum += value;
        self.sum_sq += value * value;
        self.head = (self.head + 1) % N;
    }

    /// Arithmetic mean, 0 when empty. O(1).
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    /// Sample variance with Bessel's correction; 0 for fewer than two
    /// samples. Floating-point underflow clamps at 0.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        ((self.sum_sq - self.sum * mean) / (n - 1.0)).max(0.0)
    }

    /// Sample standard deviation.
    #[must_use]
    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Minimum of the live elements; 0 when empty. O(N).
    #[must_use]
    pub fn min(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.live().fold(f64::INFINITY, f64::min)
    }

    /// Maximum of the live elements; 0 when empty. O(N).
    #[must_use]
    pub fn max(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.live().fold(f64::NEG_INFINITY, f64::max)
    }

    /// `max - min`; 0 when empty.
    #[must_use]
    pub fn range(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.max() - self.min()
    }

    /// Number of live samples.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Compile-time capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Whether the window has wrapped.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// Running sum of the live elements.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Most recently added sample; 0 when empty. O(1).
    #[must_use]
    pub fn last(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let idx = if self.head == 0 { N - 1 } else { self.head - 1 };
        self.buffer[idx]
    }

    /// Oldest live sample (next to be evicted); 0 when empty. O(1).
    #[must_use]
    pub fn oldest(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        if self.count < N {
            self.buffer[0]
        } else {
            self.buffer[self.head]
        }
    }

    /// Percentile with linear interpolation, `p` in `[0, 1]`. Copies and
    /// sorts the live buffer: O(N log N).
    #[must_use]
    pub fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        if p <= 0.0 {
            return self.min();
        }
        if p >= 1.0 {
            return self.max();
        }
        let mut sorted: Vec<f64> = self.live().collect();
        sorted.sort_by(f64::total_cmp);

        let idx = p * (self.count - 1) as f64;
        let lower = idx as usize;
        let upper = (lower + 1).min(self.count - 1);
        let frac = idx - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }

    /// The 50th percentile.
    #[must_use]
    pub fn median(&self) -> f64 {
        self.percentile(0.5)
    }

    /// Resets all state.
    pub fn clear(&mut self) {
        self.buffer = [0.0; N];
        self.head = 0;
        self.count = 0;
        self.sum = 0.0;
        self.sum_sq = 0.0;
    }

    fn live(&self) -> impl Iterator<Item = f64> + '_ {
        self.buffer.iter().take(self.count).copied()
    }
}

impl<const N: usize> Default for RollingWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}
