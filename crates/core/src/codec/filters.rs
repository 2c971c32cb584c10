//! Stream filter pipeline.
//!
//! A stream's `/Filter` entry names one filter or an array of them; they
//! are applied left to right, each with the matching `/DecodeParms` entry.

use std::sync::Arc;

use tracing::warn;

use super::ascii85::{ascii85decode, ascii85encode};
use super::asciihex::{asciihexdecode, asciihexencode};
use super::flate::{flatedecode, flatedecode_salvage, flateencode};
use super::lzw::{lzwdecode, lzwencode};
use super::predictor::{PngFilter, PredictorParams, png_decode, png_encode};
use super::runlength::rldecode;
use crate::config::ReadOptions;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObject, dict_get};

/// Filters the pipeline knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamFilter {
    Flate,
    Lzw,
    Ascii85,
    AsciiHex,
    RunLength,
    Crypt,
}

impl StreamFilter {
    /// Look up a filter by its full name or inline-image abbreviation.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FlateDecode" | "Fl" => Some(Self::Flate),
            "LZWDecode" | "LZW" => Some(Self::Lzw),
            "ASCII85Decode" | "A85" => Some(Self::Ascii85),
            "ASCIIHexDecode" | "AHx" => Some(Self::AsciiHex),
            "RunLengthDecode" | "RL" => Some(Self::RunLength),
            "Crypt" => Some(Self::Crypt),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Flate => "FlateDecode",
            Self::Lzw => "LZWDecode",
            Self::Ascii85 => "ASCII85Decode",
            Self::AsciiHex => "ASCIIHexDecode",
            Self::RunLength => "RunLengthDecode",
            Self::Crypt => "Crypt",
        }
    }

    /// Whether `/DecodeParms` may carry predictor settings for this filter.
    const fn takes_predictor(self) -> bool {
        matches!(self, Self::Flate | Self::Lzw)
    }
}

/// Decodes (and for some filters encodes) stream data.
#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    strict: bool,
    tolerate_unknown: bool,
    diagnostics: Option<Arc<Diagnostics>>,
}

impl FilterPipeline {
    pub fn new(options: &ReadOptions) -> Self {
        Self {
            strict: options.strict,
            tolerate_unknown: options.tolerate_unknown_filters,
            diagnostics: None,
        }
    }

    /// Record warnings in `diagnostics` instead of only logging them.
    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    fn warn(&self, kind: WarningKind, message: String) -> Result<()> {
        match &self.diagnostics {
            Some(diag) => diag.warn(kind, None, message),
            None if self.strict => Err(PdfError::Strict(format!("{kind}: {message}"))),
            None => {
                warn!(domain = "pdf.filter", kind = kind.as_str(), "{}", message);
                Ok(())
            }
        }
    }

    /// Decode `raw` through a single named filter.
    pub fn decode(&self, raw: &[u8], filter_name: &str, params: Option<&PDFDict>) -> Result<Vec<u8>> {
        match StreamFilter::from_name(filter_name) {
            Some(filter) => self.decode_one(raw, filter, params),
            None if self.tolerate_unknown => {
                self.warn(
                    WarningKind::UnknownFilter,
                    format!("passing through data for unknown filter /{filter_name}"),
                )?;
                Ok(raw.to_vec())
            }
            None => Err(PdfError::UnsupportedFilter(filter_name.to_string())),
        }
    }

    fn decode_one(&self, raw: &[u8], filter: StreamFilter, params: Option<&PDFDict>) -> Result<Vec<u8>> {
        let data = match filter {
            StreamFilter::Flate => match flatedecode(raw) {
                Ok(data) => data,
                Err(e) if self.strict => return Err(e),
                Err(e) => {
                    self.warn(WarningKind::CorruptFlate, format!("{e}; keeping the readable prefix"))?;
                    flatedecode_salvage(raw)
                }
            },
            StreamFilter::Lzw => lzwdecode(raw)?,
            StreamFilter::Ascii85 => ascii85decode(raw)?,
            StreamFilter::AsciiHex => asciihexdecode(raw)?,
            StreamFilter::RunLength => rldecode(raw)?,
            StreamFilter::Crypt => {
                let named = params.is_some_and(|p| p.contains_key("Name") || p.contains_key("Type"));
                if named {
                    return Err(PdfError::UnsupportedFilter(
                        "Crypt filter with /Name or /Type".into(),
                    ));
                }
                raw.to_vec()
            }
        };

        if filter.takes_predictor() {
            self.unpredict(data, params)
        } else {
            Ok(data)
        }
    }

    fn unpredict(&self, data: Vec<u8>, params: Option<&PDFDict>) -> Result<Vec<u8>> {
        let params = PredictorParams::from_dict(params)?;
        if params.predictor == 1 {
            return Ok(data);
        }
        if !params.is_png() {
            return Err(PdfError::UnsupportedPredictor(format!(
                "/Predictor {}",
                params.predictor
            )));
        }
        let decoded = png_decode(&data, &params)?;
        if decoded.leftover > 0 {
            self.warn(
                WarningKind::Predictor,
                format!("dropping {} bytes after the last whole predictor row", decoded.leftover),
            )?;
        }
        Ok(decoded.data)
    }

    /// Decode a stream's raw data through every filter its dictionary names.
    ///
    /// `/Filter` and `/DecodeParms` must already be direct objects.
    pub fn decode_stream(&self, attrs: &PDFDict, raw: &[u8]) -> Result<Vec<u8>> {
        let chain = filter_chain(attrs)?;
        if chain.is_empty() {
            return Ok(raw.to_vec());
        }

        let mut data = raw.to_vec();
        for (name, params) in &chain {
            match StreamFilter::from_name(name) {
                Some(filter) => data = self.decode_one(&data, filter, params.as_ref())?,
                None if self.tolerate_unknown => {
                    self.warn(
                        WarningKind::UnknownFilter,
                        format!("stopping at unknown filter /{name}"),
                    )?;
                    break;
                }
                None => return Err(PdfError::UnsupportedFilter(name.clone())),
            }
        }
        Ok(data)
    }

    /// Encode `data` with a single named filter.
    pub fn encode(&self, data: &[u8], filter_name: &str, params: Option<&PDFDict>) -> Result<Vec<u8>> {
        let filter = StreamFilter::from_name(filter_name)
            .ok_or_else(|| PdfError::UnsupportedFilter(filter_name.to_string()))?;

        let data = if filter.takes_predictor() {
            predict(data, params)?
        } else {
            data.to_vec()
        };

        match filter {
            StreamFilter::Flate => flateencode(&data),
            StreamFilter::Lzw => lzwencode(&data),
            StreamFilter::Ascii85 => Ok(ascii85encode(&data)),
            StreamFilter::AsciiHex => Ok(asciihexencode(&data)),
            StreamFilter::RunLength | StreamFilter::Crypt => Err(PdfError::NotImplemented(
                format!("encoding with /{}", filter.name()),
            )),
        }
    }
}

fn predict(data: &[u8], params: Option<&PDFDict>) -> Result<Vec<u8>> {
    let params = PredictorParams::from_dict(params)?;
    let filter = match params.predictor {
        1 => return Ok(data.to_vec()),
        10 => PngFilter::None,
        11 => PngFilter::Sub,
        12 | 15 => PngFilter::Up,
        other => {
            return Err(PdfError::UnsupportedPredictor(format!(
                "/Predictor {other} for encoding"
            )));
        }
    };
    png_encode(data, &params, filter)
}

/// Normalize `/Filter` and `/DecodeParms` into a list of (name, params).
pub fn filter_chain(attrs: &PDFDict) -> Result<Vec<(String, Option<PDFDict>)>> {
    let names: Vec<String> = match dict_get(attrs, "Filter") {
        None | Some(PDFObject::Null) => return Ok(Vec::new()),
        Some(PDFObject::Name(n)) => vec![n.clone()],
        Some(PDFObject::Array(items)) => items
            .iter()
            .map(|item| item.as_name().map(str::to_string))
            .collect::<Result<_>>()?,
        Some(other) => {
            return Err(PdfError::TypeError {
                expected: "name or array",
                got: other.type_name(),
            });
        }
    };

    let params: Vec<Option<PDFDict>> = match dict_get(attrs, "DecodeParms").or_else(|| dict_get(attrs, "DP")) {
        None | Some(PDFObject::Null) => Vec::new(),
        Some(PDFObject::Dict(d)) => vec![Some(d.clone())],
        Some(PDFObject::Array(items)) => items
            .iter()
            .map(|item| match item {
                PDFObject::Dict(d) => Some(d.clone()),
                _ => None,
            })
            .collect(),
        Some(_) => Vec::new(),
    };

    Ok(names
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name, params.get(i).cloned().flatten()))
        .collect())
}
