//! Type-safe request and environment types
//!
//! The presentation layer hands over raw form strings; everything past
//! [`GenerationRequest::parse`] works with validated values and enums.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{JadwalError, Result};

/// Value used for the positional protocol's third argument when the form
/// leaves it empty or unparsable.
pub const DEFAULT_EXTRA_PARAM: u32 = 3;

/// Whether the process runs from a source tree or an installed bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Development,
    Packaged,
}

impl DeploymentMode {
    /// Environment variable that forces the deployment mode
    pub const ENV_VAR: &'static str = "JADWAL_DEPLOYMENT";

    /// Mode from `JADWAL_DEPLOYMENT`, falling back to the build profile.
    pub fn detect() -> Self {
        std::env::var(Self::ENV_VAR)
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(if cfg!(debug_assertions) {
                Self::Development
            } else {
                Self::Packaged
            })
    }

    pub fn is_packaged(self) -> bool {
        self == Self::Packaged
    }
}

/// Host operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Windows,
    #[strum(serialize = "macos")]
    MacOs,
    Linux,
    #[strum(serialize = "unix")]
    OtherUnix,
}

impl Platform {
    /// Platform this binary was compiled for
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::OtherUnix
        }
    }

    pub fn is_windows(self) -> bool {
        self == Self::Windows
    }

    /// File name of the native engine binary
    pub fn engine_binary_name(self) -> &'static str {
        if self.is_windows() {
            "jadwal-engine.exe"
        } else {
            "jadwal-engine"
        }
    }

    /// File name of the wrapper script for the positional protocol
    pub fn wrapper_script_name(self) -> &'static str {
        if self.is_windows() { "run.bat" } else { "run.sh" }
    }
}

/// Calling convention spoken by the engine artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum EngineProtocol {
    /// Shell wrapper taking `<month> <year> <extra>`, output path via `OUTPUT_PATH`
    Positional,
    /// Native binary taking `-bulan`/`-tahun` flags, reporting `SUKSES: <path>`
    Flag,
}

/// Which protocol the orchestrator should look for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProtocolChoice {
    /// Probe for a native binary first, then a wrapper script
    #[default]
    Auto,
    Positional,
    Flag,
}

impl ProtocolChoice {
    /// Protocols to probe, in preference order
    pub fn protocols(self) -> &'static [EngineProtocol] {
        match self {
            Self::Auto => &[EngineProtocol::Flag, EngineProtocol::Positional],
            Self::Positional => &[EngineProtocol::Positional],
            Self::Flag => &[EngineProtocol::Flag],
        }
    }
}

/// A validated generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Month, 1-12
    pub month: u32,
    /// Year, at least 1
    pub year: u32,
    /// Day of month for single-day mode
    pub single_day: Option<u32>,
    /// Third positional argument for the wrapper script
    pub extra_param: Option<u32>,
}

impl GenerationRequest {
    /// Whole-month request
    pub fn month(month: u32, year: u32) -> Result<Self> {
        let request = Self {
            month,
            year,
            single_day: None,
            extra_param: None,
        };
        request.validate()?;
        Ok(request)
    }

    /// Build a request from raw form values.
    ///
    /// Month and year are mandatory. An empty day means whole-month mode.
    /// The extra parameter is read from its leading digits (`"5abc"` is 5);
    /// missing, non-numeric or zero values are left unset.
    pub fn parse(
        month: &str,
        year: &str,
        single_day: Option<&str>,
        extra_param: Option<&str>,
    ) -> Result<Self> {
        let month = parse_positive("month", month)?;
        let year = parse_positive("year", year)?;
        let single_day = match single_day.map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_positive("day", raw)?),
        };
        let extra_param = extra_param.and_then(leading_integer).filter(|v| *v > 0);

        let request = Self {
            month,
            year,
            single_day,
            extra_param,
        };
        request.validate()?;
        Ok(request)
    }

    /// Check field ranges
    pub fn validate(&self) -> Result<()> {
        if !(1..=12).contains(&self.month) {
            return Err(JadwalError::invalid_request(format!(
                "month must be between 1 and 12, got {}",
                self.month
            )));
        }
        if self.year < 1 {
            return Err(JadwalError::invalid_request("year must be a positive integer"));
        }
        if let Some(day) = self.single_day {
            if !(1..=31).contains(&day) {
                return Err(JadwalError::invalid_request(format!(
                    "day must be between 1 and 31, got {}",
                    day
                )));
            }
        }
        Ok(())
    }

    /// True when a single day rather than the whole month is requested
    pub fn is_single_day(&self) -> bool {
        self.single_day.is_some()
    }

    /// Extra parameter with the default applied
    pub fn extra_param_or_default(&self) -> u32 {
        self.extra_param.unwrap_or(DEFAULT_EXTRA_PARAM)
    }
}

/// Integer prefix of a form value: optional sign, then digits up to the first
/// non-digit. Negative values yield `None`.
fn leading_integer(raw: &str) -> Option<u32> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let value = rest[..end].parse::<u32>().ok()?;
    if negative && value != 0 {
        return None;
    }
    Some(value)
}

fn parse_positive(field: &str, raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(JadwalError::invalid_request(format!("{} is required", field)));
    }
    match trimmed.parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(JadwalError::invalid_request(format!(
            "{} must be a positive integer, got {:?}",
            field, raw
        ))),
    }
}
