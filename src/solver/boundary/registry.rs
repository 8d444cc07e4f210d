use super::conditions::{
    Calculated, FixedGradient, FixedValue, InletOutlet, Mixed, NoSlip, UniformFixedValue,
    ZeroGradient,
};
use super::coupled::{Cyclic, Processor};
use super::PatchCondition;
use crate::solver::dictionary::{ConfigError, Dictionary};
use crate::solver::field::FieldValue;
use crate::solver::mesh::{Coupling, Patch};
use indexmap::IndexMap;

/// What a condition constructor knows about the patch it is built for.
#[derive(Clone, Debug)]
pub struct PatchSetup {
    pub field_name: String,
    pub patch_name: String,
    /// Dictionary scope for error messages, e.g. `T.boundaryField.inlet`.
    pub scope: String,
    pub n_faces: usize,
    pub coupling: Option<Coupling>,
}

impl PatchSetup {
    pub fn new(field_name: &str, patch: &Patch) -> Self {
        Self {
            field_name: field_name.to_string(),
            patch_name: patch.name.clone(),
            scope: format!("{}.boundaryField.{}", field_name, patch.name),
            n_faces: patch.size(),
            coupling: patch.coupling,
        }
    }
}

pub type PatchConstructor<T> =
    fn(&Dictionary, &PatchSetup) -> Result<Box<dyn PatchCondition<T>>, ConfigError>;

/// Boundary condition constructors keyed by type name.
pub struct PatchFieldRegistry<T: FieldValue> {
    constructors: IndexMap<&'static str, PatchConstructor<T>>,
}

impl<T: FieldValue> PatchFieldRegistry<T> {
    pub fn empty() -> Self {
        Self {
            constructors: IndexMap::new(),
        }
    }

    /// All built-in condition types.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("fixedValue", FixedValue::<T>::from_dict);
        registry.register("uniformFixedValue", UniformFixedValue::<T>::from_dict);
        registry.register("noSlip", NoSlip::from_dict::<T>);
        registry.register("zeroGradient", ZeroGradient::from_dict::<T>);
        registry.register("fixedGradient", FixedGradient::<T>::from_dict);
        registry.register("mixed", Mixed::<T>::from_dict);
        registry.register("inletOutlet", InletOutlet::<T>::from_dict);
        registry.register("calculated", Calculated::from_dict::<T>);
        registry.register("extrapolatedCalculated", Calculated::extrapolated_from_dict::<T>);
        registry.register("cyclic", Cyclic::from_dict::<T>);
        registry.register("processor", Processor::from_dict::<T>);
        registry
    }

    /// Adds or replaces a constructor.
    pub fn register(&mut self, name: &'static str, constructor: PatchConstructor<T>) {
        self.constructors.insert(name, constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().map(|k| k.to_string()).collect()
    }

    /// Builds the condition named by the dictionary's `type` entry.
    pub fn construct(
        &self,
        dict: &Dictionary,
        setup: &PatchSetup,
    ) -> Result<Box<dyn PatchCondition<T>>, ConfigError> {
        let type_name: String = dict.lookup("type")?;
        self.construct_type(&type_name, dict, setup)
    }

    pub fn construct_type(
        &self,
        type_name: &str,
        dict: &Dictionary,
        setup: &PatchSetup,
    ) -> Result<Box<dyn PatchCondition<T>>, ConfigError> {
        let constructor = self
            .constructors
            .get(type_name)
            .ok_or_else(|| ConfigError::UnknownType {
                what: "patchField",
                name: type_name.to_string(),
                valid: self.names(),
            })?;
        constructor(dict, setup)
    }
}

impl<T: FieldValue> Default for PatchFieldRegistry<T> {
    fn default() -> Self {
        Self::standard()
    }
}
