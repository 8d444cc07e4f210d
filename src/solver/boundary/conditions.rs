use super::function1::Function1;
use super::registry::PatchSetup;
use super::{PatchCondition, PatchContext, ValueCoeffs};
use crate::solver::dictionary::{ConfigError, Dictionary};
use crate::solver::field::{FieldError, FieldValue};
use serde_json::{json, Value};

/// Reads a per-face list: a bare value, `{"uniform": v}` or
/// `{"nonuniform": [v, ...]}`.
pub fn read_patch_values<T: FieldValue>(
    dict: &Dictionary,
    key: &str,
    n_faces: usize,
) -> Result<Vec<T>, ConfigError> {
    let entry = dict.entry(key)?;
    parse_values(entry, n_faces).map_err(|reason| ConfigError::InvalidEntry {
        scope: dict.scope().to_string(),
        key: key.to_string(),
        reason,
    })
}

pub(crate) fn parse_values<T: FieldValue>(entry: &Value, n: usize) -> Result<Vec<T>, String> {
    let parse_one = |v: &Value| {
        T::from_json(v).ok_or_else(|| format!("cannot read {} from {}", T::TYPE_NAME, v))
    };
    match entry {
        Value::Object(map) => {
            if let Some(u) = map.get("uniform") {
                Ok(vec![parse_one(u)?; n])
            } else if let Some(Value::Array(list)) = map.get("nonuniform") {
                if list.len() != n {
                    return Err(format!("expected {} values, found {}", n, list.len()));
                }
                list.iter().map(parse_one).collect()
            } else {
                Err("expected uniform or nonuniform".to_string())
            }
        }
        // A list with the component count of T is a single uniform value.
        other => Ok(vec![parse_one(other)?; n]),
    }
}

fn uniform_or_list<T: FieldValue>(values: &[T]) -> Value {
    match values.first() {
        Some(first) if values.iter().all(|v| v == first) => json!({ "uniform": first.to_json() }),
        _ => json!({ "nonuniform": values.iter().map(|v| v.to_json()).collect::<Vec<_>>() }),
    }
}

/// Dirichlet condition: `Ci = 0`, `Cv = value`.
#[derive(Clone, Debug)]
pub struct FixedValue<T> {
    values: Vec<T>,
}

impl<T: FieldValue> FixedValue<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self { values }
    }

    pub fn from_dict(dict: &Dictionary, setup: &PatchSetup) -> Result<Box<dyn PatchCondition<T>>, ConfigError> {
        Ok(Box::new(Self::new(read_patch_values(dict, "value", setup.n_faces)?)))
    }
}

impl<T: FieldValue> PatchCondition<T> for FixedValue<T> {
    fn type_name(&self) -> &'static str {
        "fixedValue"
    }

    fn coeffs(&self, _ctx: &PatchContext<'_, T>) -> ValueCoeffs<T> {
        ValueCoeffs {
            internal: vec![T::zero(); self.values.len()],
            boundary: self.values.clone(),
        }
    }

    fn fixes_value(&self) -> bool {
        true
    }

    fn write(&self) -> Value {
        json!({ "type": "fixedValue" })
    }

    fn box_clone(&self) -> Box<dyn PatchCondition<T>> {
        Box::new(self.clone())
    }
}

/// Fixed value of zero, the usual wall velocity.
#[derive(Clone, Debug)]
pub struct NoSlip {
    n_faces: usize,
}

impl NoSlip {
    pub fn from_dict<T: FieldValue>(
        _dict: &Dictionary,
        setup: &PatchSetup,
    ) -> Result<Box<dyn PatchCondition<T>>, ConfigError> {
        Ok(Box::new(Self {
            n_faces: setup.n_faces,
        }))
    }
}

impl<T: FieldValue> PatchCondition<T> for NoSlip {
    fn type_name(&self) -> &'static str {
        "noSlip"
    }

    fn coeffs(&self, _ctx: &PatchContext<'_, T>) -> ValueCoeffs<T> {
        ValueCoeffs::uniform(self.n_faces, T::zero(), T::zero())
    }

    fn fixes_value(&self) -> bool {
        true
    }

    fn write(&self) -> Value {
        json!({ "type": "noSlip" })
    }

    fn box_clone(&self) -> Box<dyn PatchCondition<T>> {
        Box::new(self.clone())
    }
}

/// Fixed value following a function of time.
#[derive(Clone, Debug)]
pub struct UniformFixedValue<T> {
    function: Function1<T>,
    current: T,
    n_faces: usize,
}

impl<T: FieldValue> UniformFixedValue<T> {
    pub fn new(function: Function1<T>, n_faces: usize) -> Self {
        let current = function.value(0.0);
        Self {
            function,
            current,
            n_faces,
        }
    }

    pub fn from_dict(dict: &Dictionary, setup: &PatchSetup) -> Result<Box<dyn PatchCondition<T>>, ConfigError> {
        let function = Function1::from_dict(dict, "uniformValue")?;
        Ok(Box::new(Self::new(function, setup.n_faces)))
    }
}

impl<T: FieldValue> PatchCondition<T> for UniformFixedValue<T> {
    fn type_name(&self) -> &'static str {
        "uniformFixedValue"
    }

    fn update_coeffs(&mut self, ctx: &PatchContext<'_, T>) -> Result<(), FieldError> {
        self.current = self.function.value(ctx.time.value);
        Ok(())
    }

    fn coeffs(&self, _ctx: &PatchContext<'_, T>) -> ValueCoeffs<T> {
        ValueCoeffs::uniform(self.n_faces, T::zero(), self.current)
    }

    fn fixes_value(&self) -> bool {
        true
    }

    fn write(&self) -> Value {
        json!({ "type": "uniformFixedValue", "uniformValue": self.function.write() })
    }

    fn box_clone(&self) -> Box<dyn PatchCondition<T>> {
        Box::new(self.clone())
    }
}

/// Neumann condition with zero normal gradient.
#[derive(Clone, Debug)]
pub struct ZeroGradient {
    n_faces: usize,
}

impl ZeroGradient {
    pub fn new(n_faces: usize) -> Self {
        Self { n_faces }
    }

    pub fn from_dict<T: FieldValue>(
        _dict: &Dictionary,
        setup: &PatchSetup,
    ) -> Result<Box<dyn PatchCondition<T>>, ConfigError> {
        Ok(Box::new(Self::new(setup.n_faces)))
    }
}

impl<T: FieldValue> PatchCondition<T> for ZeroGradient {
    fn type_name(&self) -> &'static str {
        "zeroGradient"
    }

    fn coeffs(&self, _ctx: &PatchContext<'_, T>) -> ValueCoeffs<T> {
        ValueCoeffs::uniform(self.n_faces, T::splat(1.0), T::zero())
    }

    fn assignable(&self) -> bool {
        false
    }

    fn write(&self) -> Value {
        json!({ "type": "zeroGradient" })
    }

    fn box_clone(&self) -> Box<dyn PatchCondition<T>> {
        Box::new(self.clone())
    }
}

/// Neumann condition: `Ci = 1`, `Cv = gradient / deltaCoeff`.
#[derive(Clone, Debug)]
pub struct FixedGradient<T> {
    gradient: Vec<T>,
}

impl<T: FieldValue> FixedGradient<T> {
    pub fn new(gradient: Vec<T>) -> Self {
        Self { gradient }
    }

    pub fn from_dict(dict: &Dictionary, setup: &PatchSetup) -> Result<Box<dyn PatchCondition<T>>, ConfigError> {
        Ok(Box::new(Self::new(read_patch_values(dict, "gradient", setup.n_faces)?)))
    }
}

impl<T: FieldValue> PatchCondition<T> for FixedGradient<T> {
    fn type_name(&self) -> &'static str {
        "fixedGradient"
    }

    fn coeffs(&self, ctx: &PatchContext<'_, T>) -> ValueCoeffs<T> {
        ValueCoeffs {
            internal: vec![T::splat(1.0); self.gradient.len()],
            boundary: self
                .gradient
                .iter()
                .zip(&ctx.patch.delta_coeffs)
                .map(|(&g, &d)| g * (1.0 / d))
                .collect(),
        }
    }

    fn assignable(&self) -> bool {
        false
    }

    fn write(&self) -> Value {
        json!({ "type": "fixedGradient", "gradient": uniform_or_list(&self.gradient) })
    }

    fn box_clone(&self) -> Box<dyn PatchCondition<T>> {
        Box::new(self.clone())
    }
}

/// Blend of a fixed value and a fixed gradient by `value_fraction`.
#[derive(Clone, Debug)]
pub struct Mixed<T> {
    pub ref_value: Vec<T>,
    pub ref_grad: Vec<T>,
    pub value_fraction: Vec<f64>,
}

impl<T: FieldValue> Mixed<T> {
    pub fn from_dict(dict: &Dictionary, setup: &PatchSetup) -> Result<Box<dyn PatchCondition<T>>, ConfigError> {
        let n = setup.n_faces;
        Ok(Box::new(Self {
            ref_value: read_patch_values(dict, "refValue", n)?,
            ref_grad: read_patch_values(dict, "refGradient", n)?,
            value_fraction: read_patch_values(dict, "valueFraction", n)?,
        }))
    }
}

fn mixed_coeffs<T: FieldValue>(
    ref_value: &[T],
    ref_grad: &[T],
    fraction: &[f64],
    delta_coeffs: &[f64],
) -> ValueCoeffs<T> {
    let n = fraction.len();
    let mut internal = Vec::with_capacity(n);
    let mut boundary = Vec::with_capacity(n);
    for i in 0..n {
        let f = fraction[i];
        internal.push(T::splat(1.0 - f));
        boundary.push(ref_value[i] * f + ref_grad[i] * ((1.0 - f) / delta_coeffs[i]));
    }
    ValueCoeffs { internal, boundary }
}

impl<T: FieldValue> PatchCondition<T> for Mixed<T> {
    fn type_name(&self) -> &'static str {
        "mixed"
    }

    fn coeffs(&self, ctx: &PatchContext<'_, T>) -> ValueCoeffs<T> {
        mixed_coeffs(
            &self.ref_value,
            &self.ref_grad,
            &self.value_fraction,
            &ctx.patch.delta_coeffs,
        )
    }

    fn fixes_value(&self) -> bool {
        self.value_fraction.iter().all(|&f| f == 1.0)
    }

    fn assignable(&self) -> bool {
        false
    }

    fn write(&self) -> Value {
        json!({
            "type": "mixed",
            "refValue": uniform_or_list(&self.ref_value),
            "refGradient": uniform_or_list(&self.ref_grad),
            "valueFraction": uniform_or_list(&self.value_fraction),
        })
    }

    fn box_clone(&self) -> Box<dyn PatchCondition<T>> {
        Box::new(self.clone())
    }
}

/// Fixed `inletValue` where the flux enters, zero gradient where it leaves.
#[derive(Clone, Debug)]
pub struct InletOutlet<T> {
    inlet_value: Vec<T>,
    value_fraction: Vec<f64>,
    flux_name: String,
}

impl<T: FieldValue> InletOutlet<T> {
    pub fn from_dict(dict: &Dictionary, setup: &PatchSetup) -> Result<Box<dyn PatchCondition<T>>, ConfigError> {
        let n = setup.n_faces;
        Ok(Box::new(Self {
            inlet_value: read_patch_values(dict, "inletValue", n)?,
            value_fraction: vec![0.0; n],
            flux_name: dict.lookup_or("phi", "phi".to_string())?,
        }))
    }
}

impl<T: FieldValue> PatchCondition<T> for InletOutlet<T> {
    fn type_name(&self) -> &'static str {
        "inletOutlet"
    }

    fn update_coeffs(&mut self, ctx: &PatchContext<'_, T>) -> Result<(), FieldError> {
        let flux = ctx.flux.ok_or_else(|| FieldError::MissingFlux {
            field: ctx.field_name.to_string(),
            patch: ctx.patch.name.clone(),
            flux: self.flux_name.clone(),
        })?;
        for (f, &phi) in self.value_fraction.iter_mut().zip(flux) {
            *f = 1.0 - pos0(phi);
        }
        Ok(())
    }

    fn coeffs(&self, ctx: &PatchContext<'_, T>) -> ValueCoeffs<T> {
        let zero = vec![T::zero(); self.inlet_value.len()];
        mixed_coeffs(
            &self.inlet_value,
            &zero,
            &self.value_fraction,
            &ctx.patch.delta_coeffs,
        )
    }

    fn assignable(&self) -> bool {
        false
    }

    fn write(&self) -> Value {
        json!({
            "type": "inletOutlet",
            "inletValue": uniform_or_list(&self.inlet_value),
            "phi": self.flux_name,
        })
    }

    fn box_clone(&self) -> Box<dyn PatchCondition<T>> {
        Box::new(self.clone())
    }
}

/// No user constraint; values are whatever was last assigned, and the
/// implicit coefficients extrapolate from the cell.
#[derive(Clone, Debug)]
pub struct Calculated {
    n_faces: usize,
    extrapolated: bool,
}

impl Calculated {
    pub fn new(n_faces: usize) -> Self {
        Self {
            n_faces,
            extrapolated: false,
        }
    }

    pub fn extrapolated(n_faces: usize) -> Self {
        Self {
            n_faces,
            extrapolated: true,
        }
    }

    pub fn from_dict<T: FieldValue>(
        _dict: &Dictionary,
        setup: &PatchSetup,
    ) -> Result<Box<dyn PatchCondition<T>>, ConfigError> {
        Ok(Box::new(Self::new(setup.n_faces)))
    }

    pub fn extrapolated_from_dict<T: FieldValue>(
        _dict: &Dictionary,
        setup: &PatchSetup,
    ) -> Result<Box<dyn PatchCondition<T>>, ConfigError> {
        Ok(Box::new(Self::extrapolated(setup.n_faces)))
    }
}

impl<T: FieldValue> PatchCondition<T> for Calculated {
    fn type_name(&self) -> &'static str {
        if self.extrapolated {
            "extrapolatedCalculated"
        } else {
            "calculated"
        }
    }

    fn coeffs(&self, _ctx: &PatchContext<'_, T>) -> ValueCoeffs<T> {
        ValueCoeffs::uniform(self.n_faces, T::splat(1.0), T::zero())
    }

    fn evaluate(&self, coeffs: &ValueCoeffs<T>, patch_internal: &[T], values: &mut [T]) {
        if self.extrapolated {
            for (i, v) in values.iter_mut().enumerate() {
                *v = coeffs.internal[i].cmpt_multiply(&patch_internal[i]) + coeffs.boundary[i];
            }
        }
    }

    fn write(&self) -> Value {
        json!({ "type": <Self as PatchCondition<T>>::type_name(self) })
    }

    fn box_clone(&self) -> Box<dyn PatchCondition<T>> {
        Box::new(self.clone())
    }
}

/// 1 for non-negative arguments, else 0.
pub fn pos0(x: f64) -> f64 {
    if x >= 0.0 {
        1.0
    } else {
        0.0
    }
}
