use std::fmt;

/// Rational exponent of a single base dimension, always stored reduced with a
/// positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Exponent {
    num: i32,
    den: i32,
}

impl Exponent {
    pub const fn zero() -> Self {
        Self { num: 0, den: 1 }
    }

    pub const fn from_i32(value: i32) -> Self {
        Self { num: value, den: 1 }
    }

    pub const fn new(num: i32, den: i32) -> Self {
        assert!(den != 0, "dimension exponent denominator must be non-zero");
        reduced(num as i64, den as i64)
    }

    pub const fn is_zero(self) -> bool {
        self.num == 0
    }

    pub const fn numerator(self) -> i32 {
        self.num
    }

    pub const fn denominator(self) -> i32 {
        self.den
    }

    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub const fn add_exp(self, rhs: Self) -> Self {
        let (a, b) = self.widened();
        let (c, d) = rhs.widened();
        reduced(a * d + c * b, b * d)
    }

    pub const fn sub_exp(self, rhs: Self) -> Self {
        self.add_exp(rhs.neg_exp())
    }

    pub const fn neg_exp(self) -> Self {
        Self {
            num: -self.num,
            den: self.den,
        }
    }

    pub const fn mul_exp(self, rhs: Self) -> Self {
        let (a, b) = self.widened();
        let (c, d) = rhs.widened();
        reduced(a * c, b * d)
    }

    const fn widened(self) -> (i64, i64) {
        (self.num as i64, self.den as i64)
    }

    /// Closest rational with a denominator up to 12, if `value` is one.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        (1..=12).find_map(|den| {
            let scaled = value * den as f64;
            let whole = scaled.round();
            ((scaled - whole).abs() < 1e-9 && whole.abs() < i32::MAX as f64).then(|| Self::new(whole as i32, den))
        })
    }
}

impl fmt::Display for Exponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.den {
            1 => write!(f, "{}", self.num),
            den => write!(f, "{}/{}", self.num, den),
        }
    }
}

/// Lowest terms with a positive denominator; `den` must be non-zero.
const fn reduced(num: i64, den: i64) -> Exponent {
    if num == 0 {
        return Exponent::zero();
    }
    let sign = if den < 0 { -1 } else { 1 };
    let (mut a, mut b) = (num.abs(), den.abs());
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    let (num, den) = (sign * num / a, sign * den / a);
    if num < i32::MIN as i64 || num > i32::MAX as i64 || den > i32::MAX as i64 {
        panic!("dimension exponent overflow");
    }
    Exponent {
        num: num as i32,
        den: den as i32,
    }
}

/// Number of SI base dimensions tracked by a [`DimensionSet`].
pub const N_BASE_DIMENSIONS: usize = 7;

/// Base dimension names in storage order.
pub const BASE_NAMES: [&str; N_BASE_DIMENSIONS] = ["kg", "m", "s", "K", "mol", "A", "cd"];

/// Physical dimension exponents over the seven SI base units, in the order
/// mass, length, time, temperature, moles, current, luminous intensity.
///
/// Only dimensions are encoded, never scale factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DimensionSet {
    exps: [Exponent; N_BASE_DIMENSIONS],
}

impl DimensionSet {
    /// Mass, length, time, temperature, moles, current, luminous intensity.
    pub const fn new(mass: i8, length: i8, time: i8, temperature: i8, moles: i8, current: i8, luminous: i8) -> Self {
        Self {
            exps: [
                Exponent::from_i32(mass as i32),
                Exponent::from_i32(length as i32),
                Exponent::from_i32(time as i32),
                Exponent::from_i32(temperature as i32),
                Exponent::from_i32(moles as i32),
                Exponent::from_i32(current as i32),
                Exponent::from_i32(luminous as i32),
            ],
        }
    }

    /// Mechanical dimensions only: mass, length, time.
    pub const fn mlt(mass: i8, length: i8, time: i8) -> Self {
        Self::new(mass, length, time, 0, 0, 0, 0)
    }

    pub const fn dimensionless() -> Self {
        Self {
            exps: [Exponent::zero(); N_BASE_DIMENSIONS],
        }
    }

    /// Parses the seven-entry exponent list used in field dictionaries.
    pub fn from_exponents(values: &[f64]) -> Result<Self, DimensionError> {
        if values.len() != N_BASE_DIMENSIONS {
            return Err(DimensionError::BadExponentList {
                found: values.len(),
            });
        }
        let mut exps = [Exponent::zero(); N_BASE_DIMENSIONS];
        for (slot, &value) in exps.iter_mut().zip(values) {
            *slot = Exponent::from_f64(value).ok_or(DimensionError::IrrationalExponent { value })?;
        }
        Ok(Self { exps })
    }

    pub const fn exponent(&self, base: usize) -> Exponent {
        self.exps[base]
    }

    pub fn is_dimensionless(&self) -> bool {
        self.exps.iter().all(|e| e.is_zero())
    }

    pub const fn mul_dim(self, rhs: Self) -> Self {
        let mut exps = self.exps;
        let mut i = 0;
        while i < N_BASE_DIMENSIONS {
            exps[i] = self.exps[i].add_exp(rhs.exps[i]);
            i += 1;
        }
        Self { exps }
    }

    pub const fn div_dim(self, rhs: Self) -> Self {
        let mut exps = self.exps;
        let mut i = 0;
        while i < N_BASE_DIMENSIONS {
            exps[i] = self.exps[i].sub_exp(rhs.exps[i]);
            i += 1;
        }
        Self { exps }
    }

    pub const fn pow_ratio(self, num: i32, den: i32) -> Self {
        let exp = Exponent::new(num, den);
        let mut exps = self.exps;
        let mut i = 0;
        while i < N_BASE_DIMENSIONS {
            exps[i] = self.exps[i].mul_exp(exp);
            i += 1;
        }
        Self { exps }
    }

    pub const fn powi(self, exp: i32) -> Self {
        self.pow_ratio(exp, 1)
    }

    pub const fn sqrt(self) -> Self {
        self.pow_ratio(1, 2)
    }

    pub const fn inv(self) -> Self {
        Self::dimensionless().div_dim(self)
    }

    /// Dimensions of `self + rhs` / `self - rhs`: both sides must agree.
    pub fn check_same(self, rhs: Self, operation: &str) -> Result<Self, DimensionError> {
        if self == rhs {
            Ok(self)
        } else {
            Err(DimensionError::Mismatch {
                operation: operation.to_string(),
                lhs: self,
                rhs,
            })
        }
    }

    /// Arguments of transcendental functions must be dimensionless.
    pub fn ensure_dimensionless(self, operation: &str) -> Result<Self, DimensionError> {
        if self.is_dimensionless() {
            Ok(self)
        } else {
            Err(DimensionError::NotDimensionless {
                operation: operation.to_string(),
                found: self,
            })
        }
    }

    /// Bracketed exponent list, e.g. `[0 2 -1 0 0 0 0]`.
    pub fn exponent_list(&self) -> String {
        let parts: Vec<String> = self.exps.iter().map(|e| e.to_string()).collect();
        format!("[{}]", parts.join(" "))
    }
}

impl Default for DimensionSet {
    fn default() -> Self {
        Self::dimensionless()
    }
}

impl std::ops::Mul for DimensionSet {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.mul_dim(rhs)
    }
}

impl std::ops::Div for DimensionSet {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        self.div_dim(rhs)
    }
}

impl fmt::Display for DimensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "1");
        }

        let mut parts = Vec::new();
        for (name, exp) in BASE_NAMES.iter().zip(self.exps.iter()) {
            push_dim(&mut parts, name, *exp);
        }
        write!(f, "{}", parts.join(" "))
    }
}

fn push_dim(parts: &mut Vec<String>, name: &str, exp: Exponent) {
    if exp.is_zero() {
        return;
    }
    if exp.den == 1 && exp.num == 1 {
        parts.push(name.to_string());
    } else if exp.den == 1 {
        parts.push(format!("{name}^{}", exp.num));
    } else {
        parts.push(format!("{name}^({exp})"));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DimensionError {
    Mismatch {
        operation: String,
        lhs: DimensionSet,
        rhs: DimensionSet,
    },
    NotDimensionless {
        operation: String,
        found: DimensionSet,
    },
    BadExponentList {
        found: usize,
    },
    IrrationalExponent {
        value: f64,
    },
}

impl fmt::Display for DimensionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionError::Mismatch {
                operation,
                lhs,
                rhs,
            } => write!(
                f,
                "dimension mismatch in {}: lhs {} ({}) vs rhs {} ({})",
                operation,
                lhs.exponent_list(),
                lhs,
                rhs.exponent_list(),
                rhs
            ),
            DimensionError::NotDimensionless { operation, found } => write!(
                f,
                "argument of {} must be dimensionless, found {} ({})",
                operation,
                found.exponent_list(),
                found
            ),
            DimensionError::BadExponentList { found } => write!(
                f,
                "dimension list must have {} entries, found {}",
                N_BASE_DIMENSIONS, found
            ),
            DimensionError::IrrationalExponent { value } => {
                write!(f, "dimension exponent {} is not a small rational", value)
            }
        }
    }
}

impl std::error::Error for DimensionError {}

pub mod si {
    use super::DimensionSet;

    pub const DIMENSIONLESS: DimensionSet = DimensionSet::dimensionless();

    pub const MASS: DimensionSet = DimensionSet::mlt(1, 0, 0);
    pub const LENGTH: DimensionSet = DimensionSet::mlt(0, 1, 0);
    pub const TIME: DimensionSet = DimensionSet::mlt(0, 0, 1);
    pub const TEMPERATURE: DimensionSet = DimensionSet::new(0, 0, 0, 1, 0, 0, 0);
    pub const MOLES: DimensionSet = DimensionSet::new(0, 0, 0, 0, 1, 0, 0);
    pub const CURRENT: DimensionSet = DimensionSet::new(0, 0, 0, 0, 0, 1, 0);
    pub const LUMINOUS_INTENSITY: DimensionSet = DimensionSet::new(0, 0, 0, 0, 0, 0, 1);

    pub const AREA: DimensionSet = LENGTH.powi(2);
    pub const VOLUME: DimensionSet = AREA.mul_dim(LENGTH);

    pub const INV_TIME: DimensionSet = TIME.powi(-1);

    pub const DENSITY: DimensionSet = MASS.div_dim(VOLUME);
    pub const VELOCITY: DimensionSet = LENGTH.div_dim(TIME);
    pub const ACCELERATION: DimensionSet = VELOCITY.div_dim(TIME);

    pub const FORCE: DimensionSet = MASS.mul_dim(ACCELERATION);
    pub const PRESSURE: DimensionSet = FORCE.div_dim(AREA);
    /// Pressure divided by density, the unknown of incompressible solvers.
    pub const KINEMATIC_PRESSURE: DimensionSet = PRESSURE.div_dim(DENSITY);
    pub const DYNAMIC_VISCOSITY: DimensionSet = PRESSURE.mul_dim(TIME);
    pub const KINEMATIC_VISCOSITY: DimensionSet = AREA.div_dim(TIME);

    /// Volumetric face flux, `U & Sf`.
    pub const VOLUMETRIC_FLUX: DimensionSet = VOLUME.div_dim(TIME);
    pub const MASS_FLUX: DimensionSet = MASS.div_dim(TIME);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqrt_halves_exponents() {
        let length_sq = DimensionSet::mlt(0, 2, 0);
        assert_eq!(length_sq.sqrt(), DimensionSet::mlt(0, 1, 0));

        let length = DimensionSet::mlt(0, 1, 0);
        let sqrt_length = length.sqrt();
        assert_eq!(sqrt_length * sqrt_length, length);
    }

    #[test]
    fn si_derived_dimensions_match_expected_exponents() {
        assert_eq!(si::AREA, DimensionSet::mlt(0, 2, 0));
        assert_eq!(si::VOLUME, DimensionSet::mlt(0, 3, 0));
        assert_eq!(si::INV_TIME, DimensionSet::mlt(0, 0, -1));
        assert_eq!(si::DENSITY, DimensionSet::mlt(1, -3, 0));
        assert_eq!(si::PRESSURE, DimensionSet::mlt(1, -1, -2));
        assert_eq!(si::KINEMATIC_PRESSURE, DimensionSet::mlt(0, 2, -2));
        assert_eq!(si::KINEMATIC_VISCOSITY, DimensionSet::mlt(0, 2, -1));
        assert_eq!(si::VOLUMETRIC_FLUX, DimensionSet::mlt(0, 3, -1));
        assert_eq!(si::TEMPERATURE, DimensionSet::new(0, 0, 0, 1, 0, 0, 0));
    }

    #[test]
    fn display_uses_si_base_names() {
        assert_eq!(DimensionSet::dimensionless().to_string(), "1");
        assert_eq!(si::LENGTH.to_string(), "m");
        assert_eq!(si::DENSITY.to_string(), "kg m^-3");
        assert_eq!(si::TEMPERATURE.to_string(), "K");
        assert_eq!(si::LENGTH.sqrt().to_string(), "m^(1/2)");
        assert_eq!(si::KINEMATIC_VISCOSITY.exponent_list(), "[0 2 -1 0 0 0 0]");
    }

    #[test]
    fn check_same_reports_both_sides() {
        let err = si::VELOCITY.check_same(si::PRESSURE, "U + p").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("U + p"));
        assert!(msg.contains("[0 1 -1 0 0 0 0]"));
        assert!(msg.contains("[1 -1 -2 0 0 0 0]"));
    }

    #[test]
    fn exponent_list_parsing_accepts_half_powers() {
        let dims = DimensionSet::from_exponents(&[0.0, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(dims, si::LENGTH.sqrt());

        let err = DimensionSet::from_exponents(&[0.0, 1.0]).unwrap_err();
        assert_eq!(err, DimensionError::BadExponentList { found: 2 });
    }

    #[test]
    fn transcendental_arguments_must_be_dimensionless() {
        assert!(si::DIMENSIONLESS.ensure_dimensionless("exp").is_ok());
        assert!(si::TIME.ensure_dimensionless("exp").is_err());
    }
}
