use super::registry::PatchSetup;
use super::{CoupledKind, PatchCondition, PatchContext, ValueCoeffs};
use crate::solver::dictionary::{ConfigError, Dictionary};
use crate::solver::field::FieldValue;
use crate::solver::mesh::{Coupling, FvMesh};
use crate::solver::parallel::{CommError, Communicator};
use serde_json::{json, Value};

fn coupled_coeffs<T: FieldValue>(ctx: &PatchContext<'_, T>) -> ValueCoeffs<T> {
    let n = ctx.patch.size();
    match ctx.neighbour {
        Some(nbr) => ValueCoeffs {
            internal: ctx.patch.weights.iter().map(|&w| T::splat(w)).collect(),
            boundary: ctx
                .patch
                .weights
                .iter()
                .zip(nbr)
                .map(|(&w, &v)| v * (1.0 - w))
                .collect(),
        },
        // No partner snapshot yet
        None => ValueCoeffs::uniform(n, T::splat(1.0), T::zero()),
    }
}

/// Periodic coupling to another patch of the same mesh.
#[derive(Clone, Debug)]
pub struct Cyclic;

impl Cyclic {
    pub fn from_dict<T: FieldValue>(
        _dict: &Dictionary,
        setup: &PatchSetup,
    ) -> Result<Box<dyn PatchCondition<T>>, ConfigError> {
        require_coupling(setup, CoupledKind::Cyclic)?;
        Ok(Box::new(Cyclic))
    }
}

impl<T: FieldValue> PatchCondition<T> for Cyclic {
    fn type_name(&self) -> &'static str {
        "cyclic"
    }

    fn coeffs(&self, ctx: &PatchContext<'_, T>) -> ValueCoeffs<T> {
        coupled_coeffs(ctx)
    }

    fn assignable(&self) -> bool {
        false
    }

    fn coupled(&self) -> Option<CoupledKind> {
        Some(CoupledKind::Cyclic)
    }

    fn write(&self) -> Value {
        json!({ "type": "cyclic" })
    }

    fn box_clone(&self) -> Box<dyn PatchCondition<T>> {
        Box::new(self.clone())
    }
}

/// Coupling to the adjacent sub-domain on another rank.
#[derive(Clone, Debug)]
pub struct Processor;

impl Processor {
    pub fn from_dict<T: FieldValue>(
        _dict: &Dictionary,
        setup: &PatchSetup,
    ) -> Result<Box<dyn PatchCondition<T>>, ConfigError> {
        require_coupling(setup, CoupledKind::Processor)?;
        Ok(Box::new(Processor))
    }
}

impl<T: FieldValue> PatchCondition<T> for Processor {
    fn type_name(&self) -> &'static str {
        "processor"
    }

    fn coeffs(&self, ctx: &PatchContext<'_, T>) -> ValueCoeffs<T> {
        coupled_coeffs(ctx)
    }

    fn assignable(&self) -> bool {
        false
    }

    fn coupled(&self) -> Option<CoupledKind> {
        Some(CoupledKind::Processor)
    }

    fn write(&self) -> Value {
        json!({ "type": "processor" })
    }

    fn box_clone(&self) -> Box<dyn PatchCondition<T>> {
        Box::new(self.clone())
    }
}

fn require_coupling(setup: &PatchSetup, kind: CoupledKind) -> Result<(), ConfigError> {
    let ok = matches!(
        (setup.coupling, kind),
        (Some(Coupling::Cyclic { .. }), CoupledKind::Cyclic)
            | (Some(Coupling::Processor { .. }), CoupledKind::Processor)
    );
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidEntry {
            scope: setup.scope.clone(),
            key: "type".to_string(),
            reason: format!("patch {} is not a {:?} patch", setup.patch_name, kind),
        })
    }
}

/// Cell values across a cyclic patch: the cells of the partner patch, face
/// by face.
pub fn cyclic_neighbour_values<T: Copy>(mesh: &FvMesh, patch: usize, internal: &[T]) -> Option<Vec<T>> {
    match mesh.patches[patch].coupling {
        Some(Coupling::Cyclic { neighbour }) => {
            Some(mesh.patches[neighbour].patch_internal_field(internal))
        }
        _ => None,
    }
}

/// Sends the patch-internal values of every processor patch, then receives
/// the partner values for all of them. Returns one entry per patch (`None`
/// for patches that are not processor patches).
pub fn exchange_processor_values<T: FieldValue>(
    mesh: &FvMesh,
    internal: &[T],
    comm: &dyn Communicator,
) -> Result<Vec<Option<Vec<T>>>, CommError> {
    let processor_patches: Vec<(usize, usize, u64)> = mesh
        .patches
        .iter()
        .filter_map(|p| match p.coupling {
            Some(Coupling::Processor { rank, tag }) => Some((p.index, rank, tag)),
            _ => None,
        })
        .collect();

    let mut received: Vec<Option<Vec<T>>> = vec![None; mesh.patches.len()];
    if processor_patches.is_empty() {
        return Ok(received);
    }

    // Post all sends first.
    for &(patch, rank, tag) in &processor_patches {
        let values = mesh.patches[patch].patch_internal_field(internal);
        let mut flat = Vec::with_capacity(values.len() * T::N_COMPONENTS);
        for v in &values {
            for d in 0..T::N_COMPONENTS {
                flat.push(v.component(d));
            }
        }
        comm.send(rank, tag, flat)?;
    }

    for &(patch, rank, tag) in &processor_patches {
        let flat = comm.recv(rank, tag)?;
        let n = mesh.patches[patch].size();
        if flat.len() != n * T::N_COMPONENTS {
            return Err(CommError::SizeMismatch {
                from: rank,
                tag,
                expected: n * T::N_COMPONENTS,
                found: flat.len(),
            });
        }
        let values = flat
            .chunks(T::N_COMPONENTS)
            .map(T::from_components)
            .collect();
        received[patch] = Some(values);
        log::debug!(
            "rank {} received {} values on {}",
            comm.rank(),
            n,
            mesh.patches[patch].name
        );
    }

    Ok(received)
}
