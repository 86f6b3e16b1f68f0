// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Runtime configuration.

Some hosts need buffer mapping emulated in-process, others are better served by
forwarding map calls to the driver and mirroring the results afterwards. Which
one applies depends on the environment, so the embedder chooses explicitly and
[`Config`] has no `Default`.
*/

use std::str::FromStr;

/// Environment variable consulted by [`Config::from_env`].
pub const BUFFER_MAPPING_ENV: &str = "GLSHARE_BUFFER_MAPPING";

/// How `glMapBufferRange` and friends are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMapping {
    /// Map calls are served from a staging allocation managed by this crate.
    Emulated,
    /// Map calls are refused with [`crate::Error::MappingNotEmulated`]; the shim
    /// forwards them to the driver and mirrors contents via `buffer_sub_data`.
    Passthrough,
}

impl FromStr for BufferMapping {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emulated" | "emulate" | "1" => Ok(BufferMapping::Emulated),
            "passthrough" | "driver" | "0" => Ok(BufferMapping::Passthrough),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    buffer_mapping: BufferMapping,
    texture_units: usize,
}

impl Config {
    /// Number of texture units tracked per context unless overridden.
    pub const DEFAULT_TEXTURE_UNITS: usize = 32;

    pub fn new(buffer_mapping: BufferMapping) -> Self {
        Self {
            buffer_mapping,
            texture_units: Self::DEFAULT_TEXTURE_UNITS,
        }
    }

    /**
    Reads the mapping strategy from [`BUFFER_MAPPING_ENV`].

    Returns `None` when the variable is unset or unparseable, leaving the decision
    with the caller.
    */
    pub fn from_env() -> Option<Self> {
        let value = std::env::var(BUFFER_MAPPING_ENV).ok()?;
        match value.parse::<BufferMapping>() {
            Ok(mapping) => Some(Self::new(mapping)),
            Err(()) => {
                logwise::warn_sync!(
                    "ignoring unrecognized {var} value {value}",
                    var = logwise::privacy::LogIt(&BUFFER_MAPPING_ENV),
                    value = logwise::privacy::LogIt(&value)
                );
                None
            }
        }
    }

    pub fn with_texture_units(mut self, texture_units: usize) -> Self {
        self.texture_units = texture_units.max(1);
        self
    }

    pub fn buffer_mapping(&self) -> BufferMapping {
        self.buffer_mapping
    }

    pub fn texture_units(&self) -> usize {
        self.texture_units
    }
}
