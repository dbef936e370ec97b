use std::collections::HashSet;

use log::{debug, warn};
use thiserror::Error;

use crate::cuts::{selection_mask, CutVersion, MC_NEUTRINO, MC_WEIGHT_DICT};
use crate::flavour::{Flavour, Interaction, PidConvention};
use crate::source::{EventSource, SourceError, EVENT_HEADER};

/// Conversion factor from cm² to m²
pub const CMSQ_TO_MSQ: f64 = 1.0e-4;

/// True and reconstructed event properties with effective-area weights
///
/// All arrays have the same length, one entry per event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventArrays {
    true_energy: Vec<f64>,
    true_coszen: Vec<f64>,
    reco_energy: Vec<f64>,
    reco_coszen: Vec<f64>,
    weighted_aeff: Vec<f64>,
}

impl EventArrays {
    pub fn new(
        true_energy: Vec<f64>,
        true_coszen: Vec<f64>,
        reco_energy: Vec<f64>,
        reco_coszen: Vec<f64>,
        weighted_aeff: Vec<f64>,
    ) -> Result<Self, AeffError> {
        let len = true_energy.len();
        let lengths = [
            ("true_coszen", true_coszen.len()),
            ("reco_energy", reco_energy.len()),
            ("reco_coszen", reco_coszen.len()),
            ("weighted_aeff", weighted_aeff.len()),
        ];
        for (name, found) in lengths {
            if found != len {
                return Err(AeffError::ArrayLength {
                    name,
                    expected: len,
                    found,
                });
            }
        }
        if let Some(pos) = weighted_aeff.iter().position(|w| !(*w >= 0.)) {
            return Err(AeffError::InvalidWeight(pos, weighted_aeff[pos]));
        }
        Ok(Self {
            true_energy,
            true_coszen,
            reco_energy,
            reco_coszen,
            weighted_aeff,
        })
    }

    pub fn len(&self) -> usize {
        self.true_energy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.true_energy.is_empty()
    }

    pub fn true_energy(&self) -> &[f64] {
        &self.true_energy
    }

    pub fn true_coszen(&self) -> &[f64] {
        &self.true_coszen
    }

    pub fn reco_energy(&self) -> &[f64] {
        &self.reco_energy
    }

    pub fn reco_coszen(&self) -> &[f64] {
        &self.reco_coszen
    }

    pub fn weighted_aeff(&self) -> &[f64] {
        &self.weighted_aeff
    }

    /// Named arrays in storage order
    pub fn named_arrays(&self) -> [(&'static str, &[f64]); 5] {
        [
            ("true_energy", self.true_energy.as_slice()),
            ("true_coszen", self.true_coszen.as_slice()),
            ("reco_energy", self.reco_energy.as_slice()),
            ("reco_coszen", self.reco_coszen.as_slice()),
            ("weighted_aeff", self.weighted_aeff.as_slice()),
        ]
    }

    /// Iterate over events as
    /// `(true_energy, true_coszen, reco_energy, reco_coszen, weight)`
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, f64, f64, f64)> + '_ {
        (0..self.len()).map(move |n| {
            (
                self.true_energy[n],
                self.true_coszen[n],
                self.reco_energy[n],
                self.reco_coszen[n],
                self.weighted_aeff[n],
            )
        })
    }
}

/// Effective-area weight of a single event
///
/// `one_weight` is in cm², the result in m². `n_events` is the
/// number of generated events per file and `n_files` the total
/// number of simulation files. The factor of two accounts for
/// neutrinos and antineutrinos being generated together.
pub fn sim_weight(one_weight: f64, n_events: f64, n_files: f64) -> f64 {
    2.0 * one_weight * CMSQ_TO_MSQ / (n_events * n_files)
}

/// Extract event arrays for the events selected by `mask`
///
/// `reco_field` is the name of the table holding the reconstructed
/// energy and zenith angle.
pub fn build_event_arrays<S: EventSource + ?Sized>(
    source: &S,
    mask: &[bool],
    files_per_run: f64,
    reco_field: &str,
) -> Result<EventArrays, AeffError> {
    warn!("Getting reconstructions from: {reco_field}");

    if !(files_per_run > 0.) {
        return Err(AeffError::InvalidFileCount(files_per_run));
    }
    source.require_table(reco_field)?;
    let nrows = source.nrows()?;
    if mask.len() != nrows {
        return Err(AeffError::MaskLength {
            expected: nrows,
            found: mask.len(),
        });
    }

    let runs = source.column(EVENT_HEADER, "Run")?;
    let nruns = runs
        .iter()
        .map(|r| r.to_bits())
        .collect::<HashSet<_>>()
        .len();
    let nfiles = nruns as f64 * files_per_run;
    debug!("{nruns} runs with {files_per_run} files each");

    let select = |table: &str, field: &str| -> Result<Vec<f64>, AeffError> {
        let column = source.column(table, field)?;
        if column.len() != nrows {
            return Err(SourceError::Length {
                column: format!("{table}.{field}"),
                expected: nrows,
                found: column.len(),
            }
            .into());
        }
        Ok(column
            .into_iter()
            .zip(mask)
            .filter_map(|(x, &keep)| keep.then_some(x))
            .collect())
    };

    let one_weight = select(MC_WEIGHT_DICT, "OneWeight")?;
    let n_events = select(MC_WEIGHT_DICT, "NEvents")?;
    let weighted_aeff = one_weight
        .into_iter()
        .zip(n_events)
        .map(|(w, n)| sim_weight(w, n, nfiles))
        .collect();

    let true_energy = select(MC_NEUTRINO, "energy")?;
    let true_coszen = select(MC_NEUTRINO, "zenith")?
        .into_iter()
        .map(f64::cos)
        .collect();
    let reco_energy = select(reco_field, "energy")?;
    let reco_coszen = select(reco_field, "zenith")?
        .into_iter()
        .map(f64::cos)
        .collect();

    EventArrays::new(
        true_energy,
        true_coszen,
        reco_energy,
        reco_coszen,
        weighted_aeff,
    )
}

/// Event selection for building effective areas
#[derive(Clone, Debug, PartialEq)]
pub struct AeffSelection {
    pub cuts: CutVersion,
    pub pid: PidConvention,
    /// Table with the reconstructed energy and zenith angle
    pub reco_field: String,
}

impl AeffSelection {
    /// Weighted events of one flavour and interaction type
    pub fn event_arrays<S: EventSource + ?Sized>(
        &self,
        source: &S,
        flavour: Flavour,
        interaction: Interaction,
        files_per_run: f64,
    ) -> Result<EventArrays, AeffError> {
        let cuts = self.cuts.cuts_for(interaction);
        let mask = selection_mask(source, &cuts, &[flavour.pid(self.pid)])?;
        let arrays = build_event_arrays(source, &mask, files_per_run, &self.reco_field)?;
        warn!(
            "flavour {flavour} number of {} events: {}",
            interaction.to_string().to_uppercase(),
            arrays.len()
        );
        Ok(arrays)
    }
}

#[derive(Debug, Error)]
pub enum AeffError {
    #[error("Event source error: {0}")]
    Source(#[from] SourceError),
    #[error("Selection mask has length {found}, expected {expected}")]
    MaskLength { expected: usize, found: usize },
    #[error("Number of files per run must be positive, got {0}")]
    InvalidFileCount(f64),
    #[error("Array `{name}` has length {found}, expected {expected}")]
    ArrayLength {
        name: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Event {0} has invalid weight {1}")]
    InvalidWeight(usize, f64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ColumnTable;
    use std::f64::consts::PI;

    const RECO: &str = "MultiNest_8D_Neutrino";

    fn source() -> ColumnTable {
        ColumnTable::new()
            .with_column(EVENT_HEADER, "Run", vec![1., 1., 2., 2.])
            .with_column(MC_WEIGHT_DICT, "OneWeight", vec![1e4, 2e4, 3e4, 4e4])
            .with_column(MC_WEIGHT_DICT, "NEvents", vec![100.; 4])
            .with_column(MC_NEUTRINO, "energy", vec![1., 2., 3., 4.])
            .with_column(MC_NEUTRINO, "zenith", vec![0., PI, 0.5 * PI, 0.])
            .with_column(RECO, "energy", vec![1.5, 2.5, 3.5, 4.5])
            .with_column(RECO, "zenith", vec![PI, 0., 0., 0.])
    }

    #[test]
    fn weight() {
        let w = sim_weight(1e4, 100., 2. * 50.);
        assert!((w - 2e-4).abs() < 1e-15);
    }

    #[test]
    fn build() {
        let mask = [true, false, true, false];
        let arrays = build_event_arrays(&source(), &mask, 50., RECO).unwrap();
        assert_eq!(arrays.len(), 2);
        assert_eq!(arrays.true_energy(), [1., 3.]);
        assert_eq!(arrays.reco_energy(), [1.5, 3.5]);
        assert!((arrays.true_coszen()[0] - 1.).abs() < 1e-12);
        assert!(arrays.true_coszen()[1].abs() < 1e-12);
        assert!((arrays.reco_coszen()[0] + 1.).abs() < 1e-12);
        let expected = [sim_weight(1e4, 100., 100.), sim_weight(3e4, 100., 100.)];
        for (w, e) in arrays.weighted_aeff().iter().zip(expected) {
            assert!((w - e).abs() < 1e-15);
        }
        assert!((arrays.weighted_aeff()[0] - 2e-4).abs() < 1e-15);
    }

    #[test]
    fn missing_reco_field() {
        let mask = [true; 4];
        let err = build_event_arrays(&source(), &mask, 50., "NoSuchReco").unwrap_err();
        assert!(matches!(
            err,
            AeffError::Source(SourceError::FieldNotFound(name)) if name == "NoSuchReco"
        ));
    }

    #[test]
    fn selection() {
        let source = source()
            .with_column(MC_NEUTRINO, "type", vec![68., 69., 68., 68.])
            .with_column(MC_WEIGHT_DICT, "InteractionType", vec![1., 1., 2., 1.])
            .with_column("Cuts_V4_Step1", "value", vec![1.; 4])
            .with_column("Cuts_V4_Step2", "value", vec![1., 1., 1., 0.]);
        let selection = AeffSelection {
            cuts: CutVersion::V4,
            pid: PidConvention::Legacy,
            reco_field: RECO.to_owned(),
        };
        let cc = selection
            .event_arrays(&source, Flavour::Numu, Interaction::Cc, 50.)
            .unwrap();
        assert_eq!(cc.true_energy(), [1.]);
        let nc = selection
            .event_arrays(&source, Flavour::Numu, Interaction::Nc, 50.)
            .unwrap();
        assert_eq!(nc.true_energy(), [3.]);
        let bar = selection
            .event_arrays(&source, Flavour::NumuBar, Interaction::Cc, 50.)
            .unwrap();
        assert_eq!(bar.reco_energy(), [2.5]);
        let none = selection
            .event_arrays(&source, Flavour::Nue, Interaction::Cc, 50.)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn invalid_input() {
        assert!(matches!(
            build_event_arrays(&source(), &[true], 50., RECO),
            Err(AeffError::MaskLength { expected: 4, found: 1 })
        ));
        assert!(matches!(
            build_event_arrays(&source(), &[true; 4], 0., RECO),
            Err(AeffError::InvalidFileCount(_))
        ));
    }

    #[test]
    fn array_invariants() {
        assert!(matches!(
            EventArrays::new(vec![1.], vec![1.], vec![1.], vec![], vec![1.]),
            Err(AeffError::ArrayLength { name: "reco_coszen", .. })
        ));
        assert!(matches!(
            EventArrays::new(vec![1.], vec![1.], vec![1.], vec![1.], vec![-1.]),
            Err(AeffError::InvalidWeight(0, _))
        ));
    }
}
