//! Calibration sample collection

use alloc::vec::Vec;
use nalgebra::Vector3;

/// Fixed-capacity buffer of sensor samples collected during a calibration run
///
/// Capacity is fixed when the run starts (typically 500–1000 samples for a
/// full rotation sweep). [`push`](SampleSet::push) returns a countdown the
/// host uses to drive a progress display; once the set is full further
/// pushes are ignored and the fitter can consume the samples. `clear`
/// recycles the buffer for the next run; abandoning a run is simply
/// dropping or clearing the set, no other rollback exists.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use telescope_compass::SampleSet;
///
/// let mut samples = SampleSet::new(500);
/// let remaining = samples.push(Vector3::new(0.21, -0.05, 0.43));
/// assert_eq!(remaining, 500);
/// ```
#[derive(Debug, Clone)]
pub struct SampleSet {
    samples: Vec<Vector3<f32>>,
    capacity: usize,
}

impl SampleSet {
    /// Create an empty set that will accept `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a sample, returning the collection countdown
    ///
    /// The countdown starts at `capacity` for the first accepted sample and
    /// ends at 1 for the last; a full set returns 0 and discards the sample.
    pub fn push(&mut self, sample: Vector3<f32>) -> usize {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
            self.capacity - self.samples.len() + 1
        } else {
            0
        }
    }

    /// Whether the set has reached capacity
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// Number of samples collected so far
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no samples have been collected
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples collected so far
    pub fn as_slice(&self) -> &[Vector3<f32>] {
        &self.samples
    }

    /// Discard all samples, keeping the capacity, for the next run
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
