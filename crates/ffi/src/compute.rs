//! Per-step FFI entry points: PBL diagnosis and tracer mixing.
//!
//! Arrays follow the core layout. Column `c = j * nx + i`, levels 1-based
//! in documentation but 0-based in memory:
//! - pressure edges: `[column][nz + 1]`, surface first (hPa)
//! - box heights and air mass: `[column][nz]`
//! - species: `[column][species][nz]`

use pbl_mix_core::{AirMass, GridGeometry, SpeciesId, SpeciesSliceMut};

use crate::error::{DefaultPblMixError, PblMixErrorCode};
use crate::helpers::{slice_from_raw, slice_from_raw_mut, to_code, with_context, with_context_mut};
use crate::instance::PblMixInstance;

/// Diagnose the PBL top of every column.
///
/// Returns
/// - `PblMixErrorCode::Ok` (0): success
/// - `PblMixErrorCode::NullPointer`: a non-empty array pointer is null
/// - `PblMixErrorCode::InvalidDimensions`: array lengths or geometry invalid
/// - `PblMixErrorCode::NotReady`: `pbl_mix_initialize` not called
/// - `PblMixErrorCode::InvariantViolation`: a column's PBL is physically
///   inconsistent; the run must be aborted
///
/// # Safety
/// `instance` must be a live pointer from `pbl_mix_new`; each array pointer
/// must be valid for reads of its stated length.
#[no_mangle]
pub unsafe extern "C" fn pbl_mix_compute_height(
    instance: *mut PblMixInstance,
    pressure_edges: *const f64,
    pressure_edges_len: usize,
    box_heights: *const f64,
    box_heights_len: usize,
    pbl_height_m: *const f64,
    pbl_height_len: usize,
) -> PblMixErrorCode {
    let result = unsafe {
        with_context_mut(instance, |context| {
            let edges = slice_from_raw(pressure_edges, pressure_edges_len, "pressure_edges")?;
            let heights = slice_from_raw(box_heights, box_heights_len, "box_heights")?;
            let pbl = slice_from_raw(pbl_height_m, pbl_height_len, "pbl_height_m")?;

            let geometry = GridGeometry::new(context.dims(), edges.to_vec(), heights.to_vec())?;
            context.compute_pbl_height(&geometry, pbl)?;
            Ok(())
        })
    };
    to_code(result)
}

/// Homogenize the advected species below the PBL top.
///
/// `species` holds mixing ratios for `species_ids_len` species and is updated
/// in place without an intermediate copy. When `out_mass_delta` is non-null it receives the mass change
/// per `[column][advected][nz]` and `out_mass_delta_len` must match.
///
/// Returns
/// - `PblMixErrorCode::Ok` (0): success
/// - `PblMixErrorCode::NotReady`: no PBL height computed yet
/// - `PblMixErrorCode::UnknownSpecies`: an advected id is not in `species_ids`
/// - `PblMixErrorCode::DegenerateColumn`: a column has no air below its PBL
///   top; nothing was modified and the run must be aborted
///
/// # Safety
/// `instance` must be a live pointer from `pbl_mix_new`; each array pointer
/// must be valid for its stated length and `species` / `out_mass_delta` must
/// not alias any other argument.
#[no_mangle]
pub unsafe extern "C" fn pbl_mix_mix(
    instance: *const PblMixInstance,
    species: *mut f64,
    species_len: usize,
    species_ids: *const u32,
    species_ids_len: usize,
    air_mass: *const f64,
    air_mass_len: usize,
    advected: *const u32,
    advected_len: usize,
    out_mass_delta: *mut f64,
    out_mass_delta_len: usize,
) -> PblMixErrorCode {
    let result = unsafe {
        with_context(instance, |context| {
            let values = slice_from_raw_mut(species, species_len, "species")?;
            let ids = slice_from_raw(species_ids, species_ids_len, "species_ids")?;
            let air = slice_from_raw(air_mass, air_mass_len, "air_mass")?;
            let advected = slice_from_raw(advected, advected_len, "advected")?;

            let dims = context.dims();
            let ids: Vec<SpeciesId> = ids.iter().copied().map(SpeciesId).collect();
            let advected: Vec<SpeciesId> = advected.iter().copied().map(SpeciesId).collect();
            let mut field = SpeciesSliceMut::new(dims, &ids, values)?;
            let air = AirMass::new(dims, air.to_vec())?;

            let expected_deltas = dims.field_len("mass_delta", advected.len())?;
            if !out_mass_delta.is_null() && out_mass_delta_len != expected_deltas {
                return Err(DefaultPblMixError::length_mismatch(
                    "out_mass_delta",
                    expected_deltas,
                    out_mass_delta_len,
                ));
            }

            let deltas = context.mix(&mut field, &air, &advected)?;

            if !out_mass_delta.is_null() {
                let out = slice_from_raw_mut(out_mass_delta, out_mass_delta_len, "out_mass_delta")?;
                out.copy_from_slice(deltas.as_slice());
            }
            Ok(())
        })
    };
    to_code(result)
}
