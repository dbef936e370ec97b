use log::debug;
use strum::{Display, EnumString};

use crate::flavour::Interaction;
use crate::source::{EventSource, SourceError};

/// Table with the true neutrino properties
pub const MC_NEUTRINO: &str = "MCNeutrino";
/// Table with simulation weights
pub const MC_WEIGHT_DICT: &str = "I3MCWeightDict";

/// Requirement that a column takes a fixed value
#[derive(Clone, Debug, PartialEq)]
pub struct Cut {
    pub table: String,
    pub field: String,
    pub value: f64,
}

impl Cut {
    pub fn new(table: &str, field: &str, value: f64) -> Self {
        Self {
            table: table.to_owned(),
            field: field.to_owned(),
            value,
        }
    }

    /// Require a boolean flag to be set
    pub fn passed(table: &str) -> Self {
        Self::new(table, "value", 1.)
    }
}

/// Versions of the event selection
#[derive(Copy, Clone, Debug, Display, EnumString, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum CutVersion {
    V3,
    V4,
    V5,
}

impl CutVersion {
    /// Background rejection cuts for this selection version
    pub fn cuts(self) -> Vec<Cut> {
        let steps = match self {
            CutVersion::V3 => ["NewestBgRejCutsStep1", "NewestBgRejCutsStep2"],
            CutVersion::V4 => ["Cuts_V4_Step1", "Cuts_V4_Step2"],
            CutVersion::V5 => ["Cuts_V5_Step1", "Cuts_V5_Step2"],
        };
        steps.into_iter().map(Cut::passed).collect()
    }

    /// Background rejection cuts restricted to one interaction type
    pub fn cuts_for(self, interaction: Interaction) -> Vec<Cut> {
        let mut cuts = self.cuts();
        cuts.push(Cut::new(
            MC_WEIGHT_DICT,
            "InteractionType",
            interaction.code().into(),
        ));
        cuts
    }
}

/// Select events passing all `cuts` with a particle ID in `pids`
///
/// The particle ID is taken from the `type` column of the true
/// neutrino table.
pub fn selection_mask<S: EventSource + ?Sized>(
    source: &S,
    cuts: &[Cut],
    pids: &[i32],
) -> Result<Vec<bool>, SourceError> {
    let mut mask: Vec<bool> = source
        .column(MC_NEUTRINO, "type")?
        .into_iter()
        .map(|pid| pids.iter().any(|&p| f64::from(p) == pid))
        .collect();
    for cut in cuts {
        let column = source.column(&cut.table, &cut.field)?;
        if column.len() != mask.len() {
            return Err(SourceError::Length {
                column: format!("{}.{}", cut.table, cut.field),
                expected: mask.len(),
                found: column.len(),
            });
        }
        for (selected, value) in mask.iter_mut().zip(column) {
            *selected &= value == cut.value;
        }
    }
    debug!(
        "{} of {} events pass selection",
        mask.iter().filter(|&&s| s).count(),
        mask.len()
    );
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ColumnTable;

    fn source() -> ColumnTable {
        ColumnTable::new()
            .with_column(MC_NEUTRINO, "type", vec![14., -14., 14., 12., 14.])
            .with_column(MC_WEIGHT_DICT, "InteractionType", vec![1., 1., 2., 1., 1.])
            .with_column("Cuts_V5_Step1", "value", vec![1., 1., 1., 1., 0.])
            .with_column("Cuts_V5_Step2", "value", vec![1., 1., 1., 1., 1.])
    }

    #[test]
    fn cut_lists() {
        let cuts = CutVersion::V3.cuts_for(Interaction::Nc);
        assert_eq!(cuts.len(), 3);
        assert_eq!(cuts[0], Cut::passed("NewestBgRejCutsStep1"));
        assert_eq!(cuts[2], Cut::new(MC_WEIGHT_DICT, "InteractionType", 2.));
    }

    #[test]
    fn mask() {
        let source = source();
        let cc = CutVersion::V5.cuts_for(Interaction::Cc);
        let mask = selection_mask(&source, &cc, &[14]).unwrap();
        assert_eq!(mask, [true, false, false, false, false]);

        let mask = selection_mask(&source, &cc, &[14, -14, 12]).unwrap();
        assert_eq!(mask, [true, true, false, true, false]);

        let nc = CutVersion::V5.cuts_for(Interaction::Nc);
        let mask = selection_mask(&source, &nc, &[14]).unwrap();
        assert_eq!(mask, [false, false, true, false, false]);
    }

    #[test]
    fn missing_cut_table() {
        let cuts = CutVersion::V4.cuts();
        assert!(matches!(
            selection_mask(&source(), &cuts, &[14]),
            Err(SourceError::FieldNotFound(_))
        ));
    }
}
