//! Row predictors for Flate and LZW streams.
//!
//! Only `/Predictor 1` (none) and the PNG family (10-15) are recognized.
//! Every PNG row starts with a tag byte naming its filter; tags None, Sub
//! and Up are decoded, Average and Paeth are reported as unsupported.

use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObject, dict_get};

/// Predictor parameters from a `/DecodeParms` dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl PredictorParams {
    pub fn from_dict(parms: Option<&PDFDict>) -> Result<Self> {
        let mut params = Self::default();
        let Some(parms) = parms else {
            return Ok(params);
        };
        let int = |key: &str, default: i64| -> Result<i64> {
            match dict_get(parms, key) {
                None | Some(PDFObject::Null) => Ok(default),
                Some(v) => v.as_int(),
            }
        };
        params.predictor = int("Predictor", 1)?;
        params.colors = positive(int("Colors", 1)?, "Colors")?;
        params.bits_per_component = positive(int("BitsPerComponent", 8)?, "BitsPerComponent")?;
        params.columns = positive(int("Columns", 1)?, "Columns")?;
        Ok(params)
    }

    pub const fn is_png(&self) -> bool {
        self.predictor >= 10 && self.predictor <= 15
    }

    /// Bytes of pixel data per row, excluding the PNG tag byte.
    pub const fn row_bytes(&self) -> usize {
        (self.colors * self.bits_per_component * self.columns).div_ceil(8)
    }

    /// Distance in bytes to the corresponding byte of the previous pixel.
    pub fn pixel_bytes(&self) -> usize {
        (self.colors * self.bits_per_component / 8).max(1)
    }
}

fn positive(value: i64, key: &str) -> Result<usize> {
    usize::try_from(value)
        .ok()
        .filter(|&v| v > 0 && v <= 1 << 24)
        .ok_or_else(|| PdfError::UnsupportedPredictor(format!("/{key} {value}")))
}

/// PNG row filter tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PngFilter {
    None = 0,
    Sub = 1,
    Up = 2,
}

impl PngFilter {
    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Sub),
            2 => Ok(Self::Up),
            other => Err(PdfError::UnsupportedPredictor(format!(
                "PNG row filter {other}"
            ))),
        }
    }
}

/// Output of PNG predictor decoding.
#[derive(Debug)]
pub struct PngDecoded {
    pub data: Vec<u8>,
    /// Trailing bytes that did not fill a whole row and were dropped.
    pub leftover: usize,
}

/// Undo the predictor described by `params`.
pub fn png_decode(data: &[u8], params: &PredictorParams) -> Result<PngDecoded> {
    let row_bytes = params.row_bytes();
    let bpp = params.pixel_bytes();
    let row_size = row_bytes + 1;

    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_bytes];
    let mut cur = vec![0u8; row_bytes];

    let mut rows = data.chunks_exact(row_size);
    for row in rows.by_ref() {
        let filter = PngFilter::from_tag(row[0])?;
        let row = &row[1..];
        match filter {
            PngFilter::None => cur.copy_from_slice(row),
            PngFilter::Sub => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { cur[i - bpp] } else { 0 };
                    cur[i] = row[i].wrapping_add(left);
                }
            }
            PngFilter::Up => {
                for i in 0..row_bytes {
                    cur[i] = row[i].wrapping_add(prev[i]);
                }
            }
        }
        out.extend_from_slice(&cur);
        std::mem::swap(&mut prev, &mut cur);
    }

    Ok(PngDecoded {
        data: out,
        leftover: rows.remainder().len(),
    })
}

/// Apply a PNG predictor with the same `filter` on every row.
///
/// `data` must hold a whole number of rows.
pub fn png_encode(data: &[u8], params: &PredictorParams, filter: PngFilter) -> Result<Vec<u8>> {
    let row_bytes = params.row_bytes();
    let bpp = params.pixel_bytes();
    if row_bytes == 0 || data.len() % row_bytes != 0 {
        return Err(PdfError::UnsupportedPredictor(format!(
            "{} bytes is not a whole number of {row_bytes}-byte rows",
            data.len()
        )));
    }

    let mut out = Vec::with_capacity(data.len() + data.len() / row_bytes);
    let zero = vec![0u8; row_bytes];
    let mut prev: &[u8] = &zero;
    for row in data.chunks_exact(row_bytes) {
        out.push(filter as u8);
        for i in 0..row_bytes {
            let base = match filter {
                PngFilter::None => 0,
                PngFilter::Sub if i >= bpp => row[i - bpp],
                PngFilter::Sub => 0,
                PngFilter::Up => prev[i],
            };
            out.push(row[i].wrapping_sub(base));
        }
        prev = row;
    }
    Ok(out)
}
