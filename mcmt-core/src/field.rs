//! Read-only views over sampled scalar fields
//!
//! A field stores `channels` scalars per decomposition sample, sample-major:
//! the value of channel `c` at sample `s` lives at `values[s * channels + c]`.
//! Single-channel fields are the usual signed-distance/occupancy case;
//! multi-channel fields carry one score per labelled region.

use crate::error::{Error, Result};

/// Borrowed view of a sampled field
#[derive(Debug, Clone, Copy)]
pub struct FieldBuffer<'a> {
    values: &'a [f64],
    channels: usize,
}

impl<'a> FieldBuffer<'a> {
    /// Single-channel field, one value per sample
    pub fn scalar(values: &'a [f64]) -> Self {
        Self {
            values,
            channels: 1,
        }
    }

    /// Multi-channel field. Fails when `channels` is zero or does not divide
    /// the buffer length.
    pub fn with_channels(values: &'a [f64], channels: usize) -> Result<Self> {
        if channels == 0 {
            return Err(Error::InvalidData(
                "Field must have at least one channel".to_string(),
            ));
        }
        if values.len() % channels != 0 {
            return Err(Error::InvalidData(format!(
                "Field length {} is not a multiple of {} channels",
                values.len(),
                channels
            )));
        }
        Ok(Self { values, channels })
    }

    /// Number of samples (not scalars) in the buffer
    pub fn sample_count(&self) -> usize {
        self.values.len() / self.channels
    }

    /// Number of channels per sample
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Total number of scalars
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw sample-major storage
    pub fn as_slice(&self) -> &'a [f64] {
        self.values
    }

    /// Value of `channel` at `sample`
    #[inline]
    pub fn value(&self, sample: usize, channel: usize) -> f64 {
        self.values[sample * self.channels + channel]
    }

    /// All channels of one sample
    #[inline]
    pub fn sample(&self, sample: usize) -> &'a [f64] {
        let start = sample * self.channels;
        &self.values[start..start + self.channels]
    }

    /// Gather the scalar values of `corners` for a single channel
    #[inline]
    pub fn gather<const N: usize>(&self, corners: &[u32; N], channel: usize) -> [f64; N] {
        std::array::from_fn(|i| self.value(corners[i] as usize, channel))
    }

    /// Ensure the field covers exactly `sample_count` samples
    pub fn check_sample_count(&self, sample_count: usize) -> Result<()> {
        if self.sample_count() != sample_count {
            return Err(Error::length_mismatch(
                "field buffer",
                sample_count * self.channels,
                self.values.len(),
            ));
        }
        if self.values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidData(
                "Field buffer contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_field_access() {
        let values = [0.5, -1.0, 2.0];
        let field = FieldBuffer::scalar(&values);

        assert_eq!(field.sample_count(), 3);
        assert_eq!(field.channels(), 1);
        assert_eq!(field.value(1, 0), -1.0);
        assert_eq!(field.gather(&[2, 0], 0), [2.0, 0.5]);
    }

    #[test]
    fn test_multi_channel_layout() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let field = FieldBuffer::with_channels(&values, 3).unwrap();

        assert_eq!(field.sample_count(), 2);
        assert_eq!(field.value(1, 0), 4.0);
        assert_eq!(field.sample(0), &[1.0, 2.0, 3.0]);
        assert_eq!(field.gather(&[1, 0], 2), [6.0, 3.0]);
    }

    #[test]
    fn test_invalid_channel_counts() {
        let values = [1.0, 2.0, 3.0];
        assert!(FieldBuffer::with_channels(&values, 0).is_err());
        assert!(FieldBuffer::with_channels(&values, 2).is_err());
    }

    #[test]
    fn test_sample_count_check() {
        let values = [1.0, -1.0, 1.0, -1.0];
        let field = FieldBuffer::with_channels(&values, 2).unwrap();

        assert!(field.check_sample_count(2).is_ok());
        assert_eq!(
            field.check_sample_count(3),
            Err(Error::length_mismatch("field buffer", 6, 4))
        );

        let bad = [1.0, f64::NAN];
        assert!(FieldBuffer::scalar(&bad).check_sample_count(2).is_err());
    }
}
