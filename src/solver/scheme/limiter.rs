use super::SchemeError;
use std::fmt;
use std::str::FromStr;

/// TVD limiter functions of the gradient ratio `r`. A limiter of 1 gives the
/// linear weight, 0 gives upwind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limiter {
    /// `limitedLinear k`, `k` in `[0, 1]`.
    LimitedLinear(f64),
    VanLeer,
    Muscl,
    Minmod,
    SuperBee,
}

impl Limiter {
    pub const NAMES: [&'static str; 5] = ["limitedLinear", "vanLeer", "MUSCL", "Minmod", "SuperBee"];

    pub fn as_str(self) -> &'static str {
        match self {
            Limiter::LimitedLinear(_) => "limitedLinear",
            Limiter::VanLeer => "vanLeer",
            Limiter::Muscl => "MUSCL",
            Limiter::Minmod => "Minmod",
            Limiter::SuperBee => "SuperBee",
        }
    }

    /// Whether the limiter takes a coefficient after its name.
    pub fn takes_coefficient(name: &str) -> bool {
        name == "limitedLinear"
    }

    pub fn with_coefficient(name: &str, k: f64) -> Result<Self, SchemeError> {
        if !(0.0..=1.0).contains(&k) {
            return Err(SchemeError::Malformed {
                entry: format!("{} {}", name, k),
                reason: "coefficient must lie in [0, 1]".to_string(),
            });
        }
        Ok(Limiter::LimitedLinear(k))
    }

    /// Limiter value for gradient ratio `r`, clipped to `[0, 2]`.
    pub fn limit(self, r: f64) -> f64 {
        match self {
            Limiter::LimitedLinear(k) => {
                let two_by_k = 2.0 / k.max(f64::EPSILON);
                (two_by_k * r).min(1.0).max(0.0)
            }
            Limiter::VanLeer => (r + r.abs()) / (1.0 + r.abs()),
            Limiter::Muscl => (2.0 * r).min(0.5 * r + 0.5).min(2.0).max(0.0),
            Limiter::Minmod => r.min(1.0).max(0.0),
            Limiter::SuperBee => (2.0 * r).min(1.0).max(r.min(2.0)).max(0.0),
        }
    }
}

impl fmt::Display for Limiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limiter::LimitedLinear(k) => write!(f, "limitedLinear {}", k),
            other => f.write_str(other.as_str()),
        }
    }
}

impl FromStr for Limiter {
    type Err = SchemeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "vanLeer" => Ok(Limiter::VanLeer),
            "MUSCL" => Ok(Limiter::Muscl),
            "Minmod" => Ok(Limiter::Minmod),
            "SuperBee" => Ok(Limiter::SuperBee),
            "limitedLinear" => Err(SchemeError::Malformed {
                entry: value.to_string(),
                reason: "limitedLinear needs a coefficient".to_string(),
            }),
            _ => Err(SchemeError::Unknown {
                kind: "limiter",
                name: value.to_string(),
                valid: Limiter::NAMES.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

/// Gradient ratio seen from the upwind cell of a face.
///
/// `phi_p`/`phi_n` are owner and neighbour values; `grad_p_dot_d` and
/// `grad_n_dot_d` are the owner and neighbour cell gradients projected on the
/// owner-to-neighbour vector.
pub fn gradient_ratio(flux: f64, phi_p: f64, phi_n: f64, grad_p_dot_d: f64, grad_n_dot_d: f64) -> f64 {
    let grad_f = phi_n - phi_p;
    let grad_cf = if flux >= 0.0 { grad_p_dot_d } else { grad_n_dot_d };

    if grad_cf.abs() >= 1000.0 * grad_f.abs() {
        2.0 * 1000.0 * grad_cf.signum() * grad_f.signum() - 1.0
    } else {
        2.0 * (grad_cf / grad_f) - 1.0
    }
}
