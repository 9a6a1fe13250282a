use std::path::Path;

use calib_targets_aruco::builtins::builtin_dictionary;
use calib_targets_aruco::{Dictionary, Matcher};
pub use calib_targets_aruco::{Match, rotate_code_u64};
use serde::{Deserialize, Serialize};

use crate::error::{CalibError, Result};
use crate::io::object_from_json;

/// Marker codes, row-major inner bits with black = 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerDictionary {
    pub name: String,
    /// Inner bits per side.
    pub marker_size: usize,
    pub max_correction_bits: u8,
    pub codes: Vec<u64>,
}

impl MarkerDictionary {
    pub fn new(
        name: &str,
        marker_size: usize,
        max_correction_bits: u8,
        codes: Vec<u64>,
    ) -> Result<MarkerDictionary> {
        let dict = MarkerDictionary {
            name: name.to_string(),
            marker_size,
            max_correction_bits,
            codes,
        };
        dict.validate()?;
        Ok(dict)
    }

    fn validate(&self) -> Result<()> {
        let bits = self.marker_size * self.marker_size;
        if self.marker_size < 2 || bits > 64 {
            return Err(CalibError::UnknownDictionary(format!(
                "{} (unsupported marker size {})",
                self.name, self.marker_size
            )));
        }
        if self.codes.is_empty() {
            return Err(CalibError::UnknownDictionary(format!("{} (no codes)", self.name)));
        }
        Ok(())
    }

    /// One of the OpenCV predefined dictionaries, e.g. `DICT_6X6_50`.
    pub fn builtin(name: &str) -> Result<MarkerDictionary> {
        let dict = builtin_dictionary(name)
            .ok_or_else(|| CalibError::UnknownDictionary(name.to_string()))?;
        MarkerDictionary::new(
            dict.name,
            dict.marker_size,
            dict.max_correction_bits,
            dict.codes.to_vec(),
        )
    }

    pub fn from_json_file(path: &Path) -> Result<MarkerDictionary> {
        let dict: MarkerDictionary = object_from_json(path)?;
        dict.validate()?;
        Ok(dict)
    }

    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    /// Code tables with the `'static` lifetime [`Matcher`] needs.
    ///
    /// Built-in dictionaries reuse the embedded tables. Custom ones are leaked,
    /// once per codec.
    fn static_tables(&self) -> Dictionary {
        if let Some(dict) = builtin_dictionary(&self.name) {
            if dict.marker_size == self.marker_size && dict.codes == self.codes.as_slice() {
                return Dictionary {
                    max_correction_bits: self.max_correction_bits,
                    ..dict
                };
            }
        }
        Dictionary {
            name: Box::leak(self.name.clone().into_boxed_str()),
            marker_size: self.marker_size,
            max_correction_bits: self.max_correction_bits,
            codes: Box::leak(self.codes.clone().into_boxed_slice()),
        }
    }
}

/// Identifies sampled marker bits.
pub trait MarkerCodec {
    /// Inner bits per side the sampler must read.
    fn marker_size(&self) -> usize;
    /// Best match with `observed == rotate_code_u64(code[id], n, rotation)`.
    fn identify(&self, observed: u64) -> Option<Match>;
}

/// Nearest code over ids and rotations, backed by [`Matcher`].
#[derive(Debug, Clone)]
pub struct DictionaryCodec {
    dictionary: MarkerDictionary,
    matcher: Matcher,
}

impl DictionaryCodec {
    /// Accepts up to `floor(error_correction_rate * max_correction_bits)` bit errors.
    pub fn new(
        dictionary: MarkerDictionary,
        error_correction_rate: f32,
    ) -> Result<DictionaryCodec> {
        dictionary.validate()?;
        let max_hamming =
            (dictionary.max_correction_bits as f32 * error_correction_rate.clamp(0.0, 1.0)) as u8;
        let matcher = Matcher::new(dictionary.static_tables(), max_hamming);
        Ok(DictionaryCodec {
            dictionary,
            matcher,
        })
    }

    pub fn dictionary(&self) -> &MarkerDictionary {
        &self.dictionary
    }

    pub fn max_hamming(&self) -> u8 {
        self.matcher.max_hamming()
    }
}

impl MarkerCodec for DictionaryCodec {
    fn marker_size(&self) -> usize {
        self.dictionary.marker_size
    }

    fn identify(&self, observed: u64) -> Option<Match> {
        self.matcher.match_code(observed)
    }
}
