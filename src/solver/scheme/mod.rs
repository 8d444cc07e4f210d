//! Discretization scheme selection (`fvSchemes`).
//!
//! Entries are whitespace-separated strings as in `"bounded Gauss
//! limitedLinear 1"`; each section is looked up by term name (`div(phi,U)`)
//! and falls back to its `default` entry.

pub mod interpolation;
pub mod limiter;

pub use interpolation::InterpolationScheme;
pub use limiter::Limiter;

use crate::solver::dictionary::{ConfigError, Dictionary};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum SchemeError {
    /// No entry for the term and no usable `default`.
    NotSpecified { section: String, term: String },
    Unknown {
        kind: &'static str,
        name: String,
        valid: Vec<String>,
    },
    Malformed { entry: String, reason: String },
    Config(ConfigError),
}

impl fmt::Display for SchemeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemeError::NotSpecified { section, term } => {
                write!(f, "no scheme specified for {} in {}", term, section)
            }
            SchemeError::Unknown { kind, name, valid } => write!(
                f,
                "unknown {} scheme {}; valid {} schemes are: ({})",
                kind,
                name,
                kind,
                valid.join(" ")
            ),
            SchemeError::Malformed { entry, reason } => {
                write!(f, "malformed scheme entry '{}': {}", entry, reason)
            }
            SchemeError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SchemeError {}

impl From<ConfigError> for SchemeError {
    fn from(e: ConfigError) -> Self {
        SchemeError::Config(e)
    }
}

fn unknown(kind: &'static str, name: &str, valid: &[&str]) -> SchemeError {
    SchemeError::Unknown {
        kind,
        name: name.to_string(),
        valid: valid.iter().map(|s| s.to_string()).collect(),
    }
}

fn expect_gauss<'a>(entry: &str, tokens: &mut impl Iterator<Item = &'a str>) -> Result<(), SchemeError> {
    match tokens.next() {
        Some("Gauss") => Ok(()),
        Some(other) => Err(unknown("discretisation", other, &["Gauss"])),
        None => Err(SchemeError::Malformed {
            entry: entry.to_string(),
            reason: "empty scheme".to_string(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DdtScheme {
    SteadyState,
    #[default]
    Euler,
    Backward,
}

impl DdtScheme {
    pub const NAMES: [&'static str; 3] = ["steadyState", "Euler", "backward"];

    pub fn as_str(self) -> &'static str {
        match self {
            DdtScheme::SteadyState => "steadyState",
            DdtScheme::Euler => "Euler",
            DdtScheme::Backward => "backward",
        }
    }
}

impl FromStr for DdtScheme {
    type Err = SchemeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "steadyState" => Ok(DdtScheme::SteadyState),
            "Euler" => Ok(DdtScheme::Euler),
            "backward" => Ok(DdtScheme::Backward),
            other => Err(unknown("ddt", other, &Self::NAMES)),
        }
    }
}

/// `[bounded] Gauss <interpolation>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvectionScheme {
    pub bounded: bool,
    pub interpolation: InterpolationScheme,
}

impl ConvectionScheme {
    pub fn new(interpolation: InterpolationScheme) -> Self {
        Self {
            bounded: false,
            interpolation,
        }
    }

    pub fn upwind() -> Self {
        Self::new(InterpolationScheme::Upwind)
    }

    pub fn bounded(mut self) -> Self {
        self.bounded = true;
        self
    }
}

impl FromStr for ConvectionScheme {
    type Err = SchemeError;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = entry.split_whitespace().collect();
        let mut iter = tokens.iter();
        let bounded = tokens.first() == Some(&"bounded");
        if bounded {
            iter.next();
        }
        expect_gauss(entry, &mut iter.by_ref().copied())?;
        let interpolation = InterpolationScheme::parse(&mut iter)?;
        if let Some(extra) = iter.next() {
            return Err(SchemeError::Malformed {
                entry: entry.to_string(),
                reason: format!("unexpected token {}", extra),
            });
        }
        Ok(Self {
            bounded,
            interpolation,
        })
    }
}

impl fmt::Display for ConvectionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bounded {
            f.write_str("bounded ")?;
        }
        write!(f, "Gauss {}", self.interpolation)
    }
}

/// Face-normal gradient treatment of the Laplacian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnGradScheme {
    /// Non-orthogonal delta coefficients plus explicit correction.
    Corrected,
    /// Non-orthogonal delta coefficients, no correction.
    Uncorrected,
    /// `1/|d|` delta coefficients, no correction.
    Orthogonal,
    /// Correction limited to `psi` times the orthogonal part; 0 is
    /// uncorrected, 1 corrected.
    Limited(f64),
}

impl SnGradScheme {
    pub const NAMES: [&'static str; 4] = ["corrected", "uncorrected", "orthogonal", "limited"];

    pub fn corrected(self) -> bool {
        match self {
            SnGradScheme::Corrected => true,
            SnGradScheme::Limited(psi) => psi > 0.0,
            _ => false,
        }
    }

    /// Parses `corrected`, `limited 0.5` or `limited corrected 0.5`.
    pub fn parse<'a>(entry: &str, tokens: &mut impl Iterator<Item = &'a str>) -> Result<Self, SchemeError> {
        let name = tokens.next().ok_or_else(|| SchemeError::Malformed {
            entry: entry.to_string(),
            reason: "missing snGrad scheme".to_string(),
        })?;
        match name {
            "corrected" => Ok(SnGradScheme::Corrected),
            "uncorrected" => Ok(SnGradScheme::Uncorrected),
            "orthogonal" => Ok(SnGradScheme::Orthogonal),
            "limited" => {
                let mut next = tokens.next();
                if next == Some("corrected") {
                    next = tokens.next();
                }
                let psi = next
                    .and_then(|t| t.parse::<f64>().ok())
                    .filter(|psi| (0.0..=1.0).contains(psi))
                    .ok_or_else(|| SchemeError::Malformed {
                        entry: entry.to_string(),
                        reason: "limited needs a coefficient in [0, 1]".to_string(),
                    })?;
                Ok(match psi {
                    p if p == 0.0 => SnGradScheme::Uncorrected,
                    p if p == 1.0 => SnGradScheme::Corrected,
                    p => SnGradScheme::Limited(p),
                })
            }
            other => Err(unknown("snGrad", other, &Self::NAMES)),
        }
    }

    /// Fraction of the explicit correction kept on a face with orthogonal
    /// part `uncorrected` and correction `correction`.
    pub fn limit(self, uncorrected: f64, correction: f64) -> f64 {
        match self {
            SnGradScheme::Corrected => 1.0,
            SnGradScheme::Limited(psi) => {
                (psi * uncorrected.abs() / ((1.0 - psi) * correction.abs() + f64::MIN_POSITIVE)).min(1.0)
            }
            _ => 0.0,
        }
    }
}

impl FromStr for SnGradScheme {
    type Err = SchemeError;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let mut tokens = entry.split_whitespace();
        let scheme = Self::parse(entry, &mut tokens)?;
        if let Some(extra) = tokens.next() {
            return Err(SchemeError::Malformed {
                entry: entry.to_string(),
                reason: format!("unexpected token {}", extra),
            });
        }
        Ok(scheme)
    }
}

/// `Gauss linear <snGrad>`; the diffusivity is interpolated linearly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaplacianScheme {
    pub sn_grad: SnGradScheme,
}

impl LaplacianScheme {
    pub fn new(sn_grad: SnGradScheme) -> Self {
        Self { sn_grad }
    }
}

impl Default for LaplacianScheme {
    fn default() -> Self {
        Self::new(SnGradScheme::Corrected)
    }
}

impl FromStr for LaplacianScheme {
    type Err = SchemeError;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let mut tokens = entry.split_whitespace();
        expect_gauss(entry, &mut tokens)?;
        match tokens.next() {
            Some("linear") => {}
            Some(other) => return Err(unknown("laplacian interpolation", other, &["linear"])),
            None => {
                return Err(SchemeError::Malformed {
                    entry: entry.to_string(),
                    reason: "missing interpolation scheme".to_string(),
                })
            }
        }
        let sn_grad = SnGradScheme::parse(entry, &mut tokens)?;
        Ok(Self { sn_grad })
    }
}

/// Cell gradient reconstruction; only Green-Gauss with linear face values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GradScheme {
    #[default]
    GaussLinear,
}

impl FromStr for GradScheme {
    type Err = SchemeError;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let mut tokens = entry.split_whitespace();
        expect_gauss(entry, &mut tokens)?;
        match tokens.next() {
            Some("linear") => Ok(GradScheme::GaussLinear),
            Some(other) => Err(unknown("grad", other, &["linear"])),
            None => Err(SchemeError::Malformed {
                entry: entry.to_string(),
                reason: "missing interpolation scheme".to_string(),
            }),
        }
    }
}

/// Parsed `fvSchemes` dictionary.
#[derive(Debug, Clone, Default)]
pub struct FvSchemes {
    sections: IndexMap<&'static str, IndexMap<String, String>>,
}

impl FvSchemes {
    pub const SECTIONS: [&'static str; 6] = [
        "ddtSchemes",
        "gradSchemes",
        "divSchemes",
        "laplacianSchemes",
        "interpolationSchemes",
        "snGradSchemes",
    ];

    pub fn from_dict(dict: &Dictionary) -> Result<Self, SchemeError> {
        let mut sections = IndexMap::new();
        for section in Self::SECTIONS {
            let sub = dict.sub_dict_or_empty(section)?;
            let mut entries = IndexMap::new();
            for key in sub.keys() {
                let entry = match sub.entry(key)? {
                    Value::String(s) => s.clone(),
                    other => {
                        return Err(SchemeError::Malformed {
                            entry: other.to_string(),
                            reason: format!("{}.{} must be a string", sub.scope(), key),
                        })
                    }
                };
                entries.insert(key.clone(), entry);
            }
            sections.insert(section, entries);
        }
        Ok(Self { sections })
    }

    /// Sets an entry programmatically, e.g. `set("divSchemes", "div(phi,T)", "Gauss upwind")`.
    pub fn set(&mut self, section: &'static str, term: &str, entry: &str) {
        self.sections
            .entry(section)
            .or_default()
            .insert(term.to_string(), entry.to_string());
    }

    pub fn entry(&self, section: &str, term: &str) -> Result<&str, SchemeError> {
        let entries = self.sections.get(section);
        let found = entries
            .and_then(|e| e.get(term))
            .or_else(|| entries.and_then(|e| e.get("default")))
            .filter(|e| e.trim() != "none");
        found.map(|s| s.as_str()).ok_or_else(|| SchemeError::NotSpecified {
            section: section.to_string(),
            term: term.to_string(),
        })
    }

    /// `ddt(T)`.
    pub fn ddt(&self, term: &str) -> Result<DdtScheme, SchemeError> {
        self.entry("ddtSchemes", term)?.parse()
    }

    /// `div(phi,T)`.
    pub fn div(&self, term: &str) -> Result<ConvectionScheme, SchemeError> {
        self.entry("divSchemes", term)?.parse()
    }

    /// `laplacian(DT,T)`.
    pub fn laplacian(&self, term: &str) -> Result<LaplacianScheme, SchemeError> {
        self.entry("laplacianSchemes", term)?.parse()
    }

    pub fn grad(&self, term: &str) -> Result<GradScheme, SchemeError> {
        self.entry("gradSchemes", term)?.parse()
    }
}
