use tracing::debug;

use super::filter::{clipped_decibels, BoxFilter};

/// Streaming state of one extraction.
///
/// Raw bytes are decoded into `pending` as they arrive; every full run of
/// `samples_per_pixel` samples is folded into one dB point immediately, so the
/// buffer never holds more than one window plus the latest read.
///
/// At most `max_points` full windows are emitted. Anything the source delivers
/// beyond that is averaged into a single trailing point, the same way a short
/// remainder is.
pub(crate) struct Accumulator {
    filter: BoxFilter,
    noise_floor_db: f32,
    max_points: usize,
    pending: Vec<i16>,
    carry: Option<u8>,
    scratch: Vec<f32>,
    points: Vec<f32>,
    tail_sum: f64,
    tail_len: u64,
    peak_db: f32,
    samples: u64,
}

/// Points and peak in dB, before normalization
pub(crate) struct Accumulated {
    pub points: Vec<f32>,
    pub peak_db: f32,
    pub samples: u64,
}

impl Accumulator {
    pub fn new(samples_per_pixel: usize, max_points: usize, noise_floor_db: f32) -> Self {
        Self {
            filter: BoxFilter::new(samples_per_pixel),
            noise_floor_db,
            max_points,
            pending: Vec::new(),
            carry: None,
            scratch: Vec::new(),
            points: Vec::new(),
            tail_sum: 0.0,
            tail_len: 0,
            peak_db: noise_floor_db,
            samples: 0,
        }
    }

    /// Decode little-endian i16 pairs from `bytes` and fold complete windows.
    pub fn push_bytes(&mut self, mut bytes: &[u8]) {
        if let Some(low) = self.carry.take() {
            match bytes.split_first() {
                Some((&high, rest)) => {
                    self.pending.push(i16::from_le_bytes([low, high]));
                    bytes = rest;
                }
                None => {
                    self.carry = Some(low);
                    return;
                }
            }
        }

        let mut pairs = bytes.chunks_exact(2);
        for pair in &mut pairs {
            self.pending.push(i16::from_le_bytes([pair[0], pair[1]]));
        }
        self.carry = pairs.remainder().first().copied();

        let width = self.filter.width();
        let open = self.max_points - self.points.len();
        let batch = (self.pending.len() / width).min(open) * width;
        if batch > 0 {
            self.fold_prefix(batch);
        }
        if self.points.len() == self.max_points {
            self.fold_tail();
        }
    }

    fn convert_prefix(&mut self, count: usize) {
        let floor = self.noise_floor_db;
        self.scratch.clear();
        self.scratch
            .extend(self.pending[..count].iter().map(|&s| clipped_decibels(s, floor)));
        self.peak_db = self.scratch.iter().copied().fold(self.peak_db, f32::max);
        self.pending.drain(..count);
        self.samples += count as u64;
    }

    fn fold_prefix(&mut self, count: usize) {
        self.convert_prefix(count);
        self.filter.downsample(&self.scratch, &mut self.points);
    }

    fn fold_tail(&mut self) {
        let count = self.pending.len();
        if count == 0 {
            return;
        }
        self.convert_prefix(count);
        self.tail_sum += self.scratch.iter().map(|&db| db as f64).sum::<f64>();
        self.tail_len += count as u64;
    }

    /// Flush the trailing partial window as one last point.
    pub fn finish(mut self) -> Accumulated {
        if self.carry.is_some() {
            debug!("Dropping dangling odd byte at end of PCM stream");
        }
        if self.points.len() < self.max_points {
            let remainder = self.pending.len();
            if remainder > 0 {
                self.filter = BoxFilter::new(remainder);
                self.fold_prefix(remainder);
            }
        } else {
            self.fold_tail();
            if self.tail_len > 0 {
                debug!("Averaging {} trailing samples into the final point", self.tail_len);
                self.points.push((self.tail_sum / self.tail_len as f64) as f32);
            }
        }
        Accumulated {
            points: self.points,
            peak_db: self.peak_db,
            samples: self.samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_folds_full_windows_only() {
        let mut acc = Accumulator::new(4, 10, -50.0);
        acc.push_bytes(&le_bytes(&[0; 6]));
        assert_eq!(acc.points.len(), 1);
        assert_eq!(acc.pending.len(), 2);

        let done = acc.finish();
        assert_eq!(done.points, vec![-50.0, -50.0]);
        assert_eq!(done.samples, 6);
    }

    #[test]
    fn test_odd_byte_carried_across_reads() {
        let mut acc = Accumulator::new(1, 10, -50.0);
        let bytes = le_bytes(&[i16::MIN, 0x1234]);
        acc.push_bytes(&bytes[..1]);
        assert!(acc.points.is_empty());
        acc.push_bytes(&bytes[1..3]);
        acc.push_bytes(&bytes[3..]);

        let done = acc.finish();
        assert_eq!(done.points.len(), 2);
        assert_eq!(done.points[0], 0.0);
        assert_eq!(done.peak_db, 0.0);
    }

    #[test]
    fn test_peak_tracks_loudest_sample_in_db() {
        let mut acc = Accumulator::new(100, 1, -50.0);
        let mut samples = vec![0i16; 100];
        samples[42] = 16384;
        acc.push_bytes(&le_bytes(&samples));
        let done = acc.finish();
        assert!((done.peak_db + 6.02).abs() < 0.01);
        assert!(done.points[0] > -50.0);
    }

    #[test]
    fn test_overflow_folds_into_one_tail_point() {
        let mut acc = Accumulator::new(2, 3, -50.0);
        acc.push_bytes(&le_bytes(&[0; 6]));
        acc.push_bytes(&le_bytes(&[i16::MIN; 5]));
        acc.push_bytes(&le_bytes(&[i16::MIN; 5]));

        let done = acc.finish();
        assert_eq!(done.points, vec![-50.0, -50.0, -50.0, 0.0]);
        assert_eq!(done.samples, 16);
        assert_eq!(done.peak_db, 0.0);
    }

    #[test]
    fn test_empty_stream_has_no_points() {
        let done = Accumulator::new(10, 5, -40.0).finish();
        assert!(done.points.is_empty());
        assert_eq!(done.peak_db, -40.0);
    }
}
