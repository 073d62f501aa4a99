//! Cell classification
//!
//! Turns the corner values of one cell into a sign bitmask and its case
//! table entry. For multi-channel fields the cell is first reduced to a
//! scalar "cut" function, the difference of its two dominant channels.

use crate::case_table::{CaseEntry, CaseTable};
use mcmt_core::{FieldBuffer, Result};
use serde::{Deserialize, Serialize};

/// Scalar function a cell is classified on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Cut {
    /// Single-channel field, used as is
    Scalar,
    /// Difference `f_a - f_b` of two channels, `a < b`
    Channels { a: u32, b: u32 },
}

impl Cut {
    /// Value of the cut function at `sample`, before the iso level shift
    #[inline]
    pub fn evaluate(&self, field: &FieldBuffer<'_>, sample: usize) -> f64 {
        match *self {
            Cut::Scalar => field.value(sample, 0),
            Cut::Channels { a, b } => {
                field.value(sample, a as usize) - field.value(sample, b as usize)
            }
        }
    }

    /// Channels the cut depends on with their derivative signs
    pub fn channel_weights(&self) -> [Option<(usize, f64)>; 2] {
        match *self {
            Cut::Scalar => [Some((0, 1.0)), None],
            Cut::Channels { a, b } => [Some((a as usize, 1.0)), Some((b as usize, -1.0))],
        }
    }
}

/// Sign bitmask of four corner values; bit `i` is set iff `values[i] >= 0`
#[inline]
pub fn sign_mask(values: &[f64; 4]) -> u8 {
    values
        .iter()
        .enumerate()
        .fold(0u8, |mask, (i, &v)| if v >= 0.0 { mask | (1 << i) } else { mask })
}

/// Pick the cut for a cell.
///
/// Scalar fields always use [`Cut::Scalar`]. Otherwise the two channels with
/// the highest maximum corner value win, ties going to the lower channel.
pub fn select_cut(field: &FieldBuffer<'_>, corners: &[u32; 4]) -> Cut {
    if field.channels() == 1 {
        return Cut::Scalar;
    }

    let peak = |channel: usize| {
        field
            .gather(corners, channel)
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max)
    };

    let mut first = (0usize, f64::NEG_INFINITY);
    let mut second = (usize::MAX, f64::NEG_INFINITY);
    for channel in 0..field.channels() {
        let score = peak(channel);
        if score > first.1 {
            second = first;
            first = (channel, score);
        } else if score > second.1 {
            second = (channel, score);
        }
    }

    let (a, b) = if first.0 < second.0 {
        (first.0, second.0)
    } else {
        (second.0, first.0)
    };
    Cut::Channels {
        a: a as u32,
        b: b as u32,
    }
}

/// Result of classifying one cell
#[derive(Debug, Clone, Copy)]
pub struct ClassifiedCell {
    pub cut: Cut,
    /// Cut values at the four corners, iso level already subtracted
    pub values: [f64; 4],
    pub mask: u8,
    pub entry: &'static CaseEntry,
}

/// Classify the cell with corner samples `corners`
pub fn classify_cell(
    field: &FieldBuffer<'_>,
    corners: &[u32; 4],
    iso_level: f64,
) -> Result<ClassifiedCell> {
    let cut = select_cut(field, corners);
    let values = corners.map(|s| cut.evaluate(field, s as usize) - iso_level);
    let mask = sign_mask(&values);
    let entry = CaseTable::global().lookup(mask)?;

    Ok(ClassifiedCell {
        cut,
        values,
        mask,
        entry,
    })
}
