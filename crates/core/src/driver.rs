//! Per-timestep driver tying the engines to the host's collaborators
//!
//! Each step the PBL top is rediagnosed from fresh meteorology. When mixing
//! is enabled the tracers are converted to mixing ratios, homogenized,
//! converted back, and the mass changes are handed to the diagnostics sink.

use crate::boundary_layer::PblContext;
use crate::diagnostics::MixingDiagnostics;
use crate::error::PblError;
use crate::grid::{AirMass, GridGeometry, SpeciesField, SpeciesId};
use rayon::prelude::*;
use tracing::debug;

/// Converts host tracer units to and from air-mass compatible mixing ratios
pub trait UnitConverter {
    /// Convert `species` to mixing ratios in place
    ///
    /// # Errors
    ///
    /// Returns `PblError::UnitConversion` (or a shape error) if conversion fails.
    fn to_mixing_ratio(&mut self, species: &mut SpeciesField, air_mass: &AirMass)
        -> Result<(), PblError>;

    /// Convert `species` back from mixing ratios in place
    ///
    /// # Errors
    ///
    /// Returns `PblError::UnitConversion` (or a shape error) if conversion fails.
    fn from_mixing_ratio(
        &mut self,
        species: &mut SpeciesField,
        air_mass: &AirMass,
    ) -> Result<(), PblError>;
}

/// For hosts whose tracers are already dry mixing ratios
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityUnits;

impl UnitConverter for IdentityUnits {
    fn to_mixing_ratio(&mut self, _: &mut SpeciesField, _: &AirMass) -> Result<(), PblError> {
        Ok(())
    }

    fn from_mixing_ratio(&mut self, _: &mut SpeciesField, _: &AirMass) -> Result<(), PblError> {
        Ok(())
    }
}

/// For hosts storing tracer mass per box (kg); converts to kg/kg of dry air
#[derive(Debug, Clone, Copy, Default)]
pub struct TracerMassUnits;

impl TracerMassUnits {
    fn apply(
        species: &mut SpeciesField,
        air_mass: &AirMass,
        op: fn(f64, f64) -> f64,
    ) -> Result<(), PblError> {
        if species.dims() != air_mass.dims() {
            return Err(PblError::UnitConversion(format!(
                "species grid {:?} differs from air-mass grid {:?}",
                species.dims(),
                air_mass.dims()
            )));
        }
        let column_len = species.column_len();
        if column_len == 0 {
            return Ok(());
        }
        let nz = species.dims().nz();
        species
            .as_mut_slice()
            .par_chunks_mut(column_len)
            .enumerate()
            .for_each(|(column, block)| {
                let air = air_mass.column(column);
                for profile in block.chunks_mut(nz) {
                    for (value, mass) in profile.iter_mut().zip(air) {
                        *value = op(*value, *mass);
                    }
                }
            });
        Ok(())
    }
}

impl UnitConverter for TracerMassUnits {
    fn to_mixing_ratio(
        &mut self,
        species: &mut SpeciesField,
        air_mass: &AirMass,
    ) -> Result<(), PblError> {
        Self::apply(species, air_mass, |kg, air| kg / air)
    }

    fn from_mixing_ratio(
        &mut self,
        species: &mut SpeciesField,
        air_mass: &AirMass,
    ) -> Result<(), PblError> {
        Self::apply(species, air_mass, |ratio, air| ratio * air)
    }
}

/// Outcome of one driver step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSummary {
    /// Columns diagnosed
    pub columns: usize,
    /// Highest PBL top level over all columns
    pub max_top_level: usize,
    /// Species mixed (0 when mixing is disabled)
    pub mixed_species: usize,
}

/// Owns the PBL context and the host collaborators for a run
pub struct PblMixer<U, D> {
    context: PblContext,
    units: U,
    diagnostics: D,
    mixing_enabled: bool,
}

impl<U: UnitConverter, D: MixingDiagnostics> PblMixer<U, D> {
    /// Create a driver with mixing enabled
    pub fn new(context: PblContext, units: U, diagnostics: D) -> Self {
        Self {
            context,
            units,
            diagnostics,
            mixing_enabled: true,
        }
    }

    /// Enable or disable tracer mixing (PBL diagnosis always runs)
    pub fn with_mixing(mut self, enabled: bool) -> Self {
        self.mixing_enabled = enabled;
        self
    }

    /// The shared PBL context
    pub fn context(&self) -> &PblContext {
        &self.context
    }

    /// The diagnostics sink
    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    /// Release the context and collaborators
    pub fn into_parts(self) -> (PblContext, U, D) {
        (self.context, self.units, self.diagnostics)
    }

    /// Run one timestep
    ///
    /// # Errors
    ///
    /// Propagates any error from initialization, PBL diagnosis, unit
    /// conversion or mixing. All are fatal to the run.
    pub fn step(
        &mut self,
        geometry: &GridGeometry,
        pbl_height_m: &[f64],
        species: &mut SpeciesField,
        air_mass: &AirMass,
        advected: &[SpeciesId],
    ) -> Result<StepSummary, PblError> {
        self.context.initialize()?;
        self.context.compute_pbl_height(geometry, pbl_height_m)?;

        let mut summary = StepSummary {
            columns: self.context.dims().columns(),
            max_top_level: self.context.max_top_level(),
            mixed_species: 0,
        };

        if self.mixing_enabled {
            self.context.check_mix(&*species, air_mass, advected)?;
            self.units.to_mixing_ratio(species, air_mass)?;
            // Host units are restored even when mixing fails
            let mixed = self.context.mix(species, air_mass, advected);
            self.units.from_mixing_ratio(species, air_mass)?;
            let deltas = mixed?;
            self.diagnostics.record_mixing(&deltas);
            summary.mixed_species = advected.len();
        }

        debug!(
            "PBL step: {} columns, max top level {}, {} species mixed",
            summary.columns, summary.max_top_level, summary.mixed_species
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PblConfig;
    use crate::diagnostics::{LevelBudget, NoDiagnostics};
    use crate::grid::GridDims;
    use approx::assert_relative_eq;

    fn setup() -> (GridGeometry, AirMass, SpeciesField, PblContext) {
        let dims = GridDims::new(2, 1, 3, 3).unwrap();
        let geometry = GridGeometry::uniform(
            dims,
            &[1000.0, 800.0, 500.0, 200.0],
            &[1800.0, 3500.0, 6000.0],
        )
        .unwrap();
        let air = AirMass::uniform(dims, &[20.0, 30.0, 30.0]).unwrap();
        let species = SpeciesField::from_vec(
            dims,
            vec![SpeciesId(1)],
            vec![40.0, 30.0, 3.0, 20.0, 60.0, 3.0],
        )
        .unwrap();
        let context = PblContext::new(dims, PblConfig::default()).unwrap();
        (geometry, air, species, context)
    }

    #[test]
    fn test_tracer_mass_round_trip() {
        let (_, air, mut species, _) = setup();
        let before = species.as_slice().to_vec();
        let mut units = TracerMassUnits;
        units.to_mixing_ratio(&mut species, &air).unwrap();
        assert_relative_eq!(species.profile(0, 0)[0], 2.0, epsilon = 1e-12);
        units.from_mixing_ratio(&mut species, &air).unwrap();
        for (a, b) in before.iter().zip(species.as_slice()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_step_conserves_tracer_mass() {
        let (geometry, air, mut species, context) = setup();
        let before: f64 = species.as_slice().iter().sum();

        let mut mixer = PblMixer::new(context, TracerMassUnits, LevelBudget::new());
        let summary = mixer
            .step(&geometry, &[2000.0, 4000.0], &mut species, &air, &[SpeciesId(1)])
            .unwrap();

        assert_eq!(summary.columns, 2);
        assert_eq!(summary.max_top_level, 2);
        assert_eq!(summary.mixed_species, 1);
        let after: f64 = species.as_slice().iter().sum();
        assert_relative_eq!(before, after, epsilon = 1e-9);
        assert_eq!(mixer.diagnostics().steps(), 1);
        assert!(mixer.diagnostics().max_net_change() < 1e-9);
    }

    #[test]
    fn test_step_without_mixing_leaves_species() {
        let (geometry, air, mut species, context) = setup();
        let before = species.as_slice().to_vec();

        let mut mixer = PblMixer::new(context, IdentityUnits, NoDiagnostics).with_mixing(false);
        let summary = mixer
            .step(&geometry, &[2000.0, 2000.0], &mut species, &air, &[SpeciesId(1)])
            .unwrap();

        assert_eq!(summary.mixed_species, 0);
        assert_eq!(species.as_slice(), before.as_slice());
        assert!(mixer.context().has_state());
    }

    #[test]
    fn test_step_propagates_unknown_species() {
        let (geometry, air, mut species, context) = setup();
        let mut mixer = PblMixer::new(context, IdentityUnits, NoDiagnostics);
        let err = mixer
            .step(&geometry, &[2000.0, 2000.0], &mut species, &air, &[SpeciesId(5)])
            .unwrap_err();
        assert_eq!(err, PblError::UnknownSpecies(SpeciesId(5)));
    }

    #[test]
    fn test_rejected_mix_keeps_host_units() {
        let (geometry, air, mut species, context) = setup();
        let before = species.as_slice().to_vec();
        let mut mixer = PblMixer::new(context, TracerMassUnits, LevelBudget::new());

        let err = mixer
            .step(&geometry, &[2000.0, 2000.0], &mut species, &air, &[SpeciesId(9)])
            .unwrap_err();

        assert_eq!(err, PblError::UnknownSpecies(SpeciesId(9)));
        assert_eq!(species.as_slice(), before.as_slice());
        assert_eq!(mixer.diagnostics().steps(), 0);
    }

    #[test]
    fn test_repeated_species_keeps_host_units() {
        let (geometry, air, mut species, context) = setup();
        let before = species.as_slice().to_vec();
        let mut mixer = PblMixer::new(context, TracerMassUnits, NoDiagnostics);

        let err = mixer
            .step(
                &geometry,
                &[2000.0, 2000.0],
                &mut species,
                &air,
                &[SpeciesId(1), SpeciesId(1)],
            )
            .unwrap_err();

        assert!(matches!(err, PblError::InvalidDimensions(_)));
        assert_eq!(species.as_slice(), before.as_slice());
    }
}
