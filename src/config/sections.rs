//! Prefix-filtered extraction of INI sections.
//!
//! A device configuration holds one section per logical entity:
//!
//! ```ini
//! [DAQmxChannel_Mod1_ai0]
//! ChanType = Analog Input
//! AI.MeasType = Voltage
//! PhysicalChanName = cDAQ1Mod1/ai0
//! AI.Min = -10
//! AI.Max = 10
//!
//! [DAQmxTask]
//! SampClk.Rate = 1000
//! SampQuant.SampPerChan = 100
//! ```
//!
//! [`extract_sections`] returns every section whose name starts with a prefix, in
//! file order, with keys exactly as written plus a synthetic [`SECTION_NAME_KEY`].

use std::collections::HashMap;
use std::path::Path;

use ini::{Ini, ParseOption};
use tracing::debug;

use crate::error::{DaqError, Result};

/// Synthetic attribute holding the original section name.
pub const SECTION_NAME_KEY: &str = "__section__";

/// One configuration section: its attributes plus the section name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSection {
    attributes: HashMap<String, String>,
}

impl ConfigSection {
    /// Build a section from its name and key/value pairs.
    pub fn new<I, K, V>(name: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut attributes: HashMap<String, String> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        attributes.insert(SECTION_NAME_KEY.to_string(), name.to_string());
        Self { attributes }
    }

    /// The section name as written in the file.
    pub fn name(&self) -> &str {
        self.attributes
            .get(SECTION_NAME_KEY)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Look up an attribute (case-sensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// All attributes, including [`SECTION_NAME_KEY`].
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Look up an attribute that must be present.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| DaqError::MissingKey {
            section: self.name().to_string(),
            key: key.to_string(),
        })
    }

    /// Parse a required attribute as a float.
    pub fn require_f64(&self, key: &str) -> Result<f64> {
        let raw = self.require(key)?;
        self.parse_f64(key, raw)
    }

    /// Parse an attribute as a float, treating absence as a failed conversion.
    ///
    /// Used for sensor parameters that only become mandatory for some
    /// measurement types.
    pub fn numeric_f64(&self, key: &str) -> Result<f64> {
        self.parse_f64(key, self.get(key).unwrap_or_default())
    }

    /// Parse a required attribute as an unsigned integer.
    pub fn require_u32(&self, key: &str) -> Result<u32> {
        let raw = self.require(key)?;
        raw.trim().parse::<u32>().map_err(|_| self.conversion_error(key, raw))
    }

    fn parse_f64(&self, key: &str, raw: &str) -> Result<f64> {
        raw.trim().parse::<f64>().map_err(|_| self.conversion_error(key, raw))
    }

    fn conversion_error(&self, key: &str, raw: &str) -> DaqError {
        DaqError::ValueConversion {
            section: self.name().to_string(),
            key: key.to_string(),
            value: raw.to_string(),
        }
    }
}

/// Read `path` and return every section whose name starts with `prefix`.
///
/// Returns an empty vector when nothing matches. Fails with
/// [`DaqError::Config`] when the file cannot be opened or parsed.
pub fn extract_sections(path: impl AsRef<Path>, prefix: &str) -> Result<Vec<ConfigSection>> {
    let path = path.as_ref();
    let ini = Ini::load_from_file_opt(path, parse_options()).map_err(|e| DaqError::Config {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let sections = filter_sections(&ini, prefix);
    debug!(
        path = %path.display(),
        prefix,
        matched = sections.len(),
        "Extracted configuration sections"
    );
    Ok(sections)
}

/// Same as [`extract_sections`] for configuration text already in memory.
pub fn extract_sections_from_str(contents: &str, prefix: &str) -> Result<Vec<ConfigSection>> {
    let ini = Ini::load_from_str_opt(contents, parse_options()).map_err(|e| DaqError::Config {
        path: "<memory>".to_string(),
        message: e.to_string(),
    })?;
    Ok(filter_sections(&ini, prefix))
}

// Values are taken literally: NI exports contain Windows paths with backslashes
// and quotes are part of the value.
fn parse_options() -> ParseOption {
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    }
}

fn filter_sections(ini: &Ini, prefix: &str) -> Vec<ConfigSection> {
    ini.iter()
        .filter_map(|(name, props)| {
            let name = name?;
            name.starts_with(prefix)
                .then(|| ConfigSection::new(name, props.iter()))
        })
        .collect()
}
