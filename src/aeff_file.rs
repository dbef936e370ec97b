use std::path::Path;

use log::{debug, info};
use thiserror::Error;

use crate::aeff::{AeffError, EventArrays};
use crate::flavour::{Flavour, Interaction, InvalidInteractionType};

/// Create an empty weighted effective-area file, truncating any existing one
pub fn create<P: AsRef<Path>>(path: P) -> Result<hdf5::File, AeffFileError> {
    info!("Writing to file: {:?}", path.as_ref());
    Ok(hdf5::File::create(path)?)
}

/// Open an existing weighted effective-area file for appending
pub fn open_rw<P: AsRef<Path>>(path: P) -> Result<hdf5::File, AeffFileError> {
    Ok(hdf5::File::open_rw(path)?)
}

/// Write the arrays for one flavour
///
/// Creates a group named after the flavour with subgroups `cc` and
/// `nc`, each holding the event arrays as single-precision datasets.
pub fn write_flavour(
    file: &hdf5::File,
    flavour: Flavour,
    cc: &EventArrays,
    nc: &EventArrays,
) -> Result<(), AeffFileError> {
    info!("Saving {flavour}...");
    let group = file.create_group(&flavour.to_string())?;
    write_group(&group, "cc", cc)?;
    write_group(&group, "nc", nc)?;
    file.flush()?;
    Ok(())
}

/// Write the arrays for one interaction type into a new subgroup
pub fn write_group(
    parent: &hdf5::Group,
    interaction: &str,
    arrays: &EventArrays,
) -> Result<(), AeffFileError> {
    let interaction: Interaction = interaction.parse()?;
    let group = parent.create_group(&interaction.to_string())?;
    for (name, data) in arrays.named_arrays() {
        let data: Vec<f32> = data.iter().map(|&x| x as f32).collect();
        group
            .new_dataset::<f32>()
            .shape([data.len()])
            .create(name)?
            .write(data.as_slice())?;
    }
    debug!("Wrote {} {interaction} events to {}", arrays.len(), parent.name());
    Ok(())
}

/// Read the arrays for one flavour and interaction type
pub fn read_flavour(
    file: &hdf5::File,
    flavour: Flavour,
    interaction: Interaction,
) -> Result<EventArrays, AeffFileError> {
    let path = format!("{flavour}/{interaction}");
    if !file.link_exists(&flavour.to_string())
        || !file.group(&flavour.to_string())?.link_exists(&interaction.to_string())
    {
        return Err(AeffFileError::MissingGroup(path));
    }
    let group = file.group(&path)?;
    let read = |name: &str| -> Result<Vec<f64>, AeffFileError> {
        let data = group.dataset(name)?.read_raw::<f32>()?;
        Ok(data.into_iter().map(f64::from).collect())
    };
    let arrays = EventArrays::new(
        read("true_energy")?,
        read("true_coszen")?,
        read("reco_energy")?,
        read("reco_coszen")?,
        read("weighted_aeff")?,
    )?;
    debug!("Read {} events from {path}", arrays.len());
    Ok(arrays)
}

#[derive(Debug, Error)]
pub enum AeffFileError {
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
    #[error(transparent)]
    InvalidInteractionType(#[from] InvalidInteractionType),
    #[error("No group `{0}` in weighted effective area file")]
    MissingGroup(String),
    #[error("Invalid event arrays: {0}")]
    Arrays(#[from] AeffError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrays(offset: f64) -> EventArrays {
        EventArrays::new(
            vec![1. + offset, 2. + offset],
            vec![-0.5, 0.5],
            vec![1.25 + offset, 1.75 + offset],
            vec![-0.25, 0.75],
            vec![2e-4, 4e-4],
        )
        .unwrap()
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aeff.hdf5");
        create(&path).unwrap();
        {
            let file = open_rw(&path).unwrap();
            write_flavour(&file, Flavour::Numu, &arrays(0.), &arrays(10.)).unwrap();
            write_flavour(&file, Flavour::NumuBar, &arrays(20.), &arrays(30.)).unwrap();
        }

        let file = hdf5::File::open(&path).unwrap();
        let nc = read_flavour(&file, Flavour::Numu, Interaction::Nc).unwrap();
        assert_eq!(nc.true_energy(), [11., 12.]);
        assert_eq!(nc.reco_coszen(), [-0.25, 0.75]);
        for (w, e) in nc.weighted_aeff().iter().zip([2e-4, 4e-4]) {
            assert!((w - e).abs() < 1e-10);
        }
        let cc = read_flavour(&file, Flavour::NumuBar, Interaction::Cc).unwrap();
        assert_eq!(cc.reco_energy(), [21.25, 21.75]);

        let dataset = file.dataset("numu/cc/weighted_aeff").unwrap();
        assert_eq!(dataset.dtype().unwrap().size(), 4);

        assert!(matches!(
            read_flavour(&file, Flavour::Nue, Interaction::Cc),
            Err(AeffFileError::MissingGroup(_))
        ));
    }

    #[test]
    fn invalid_interaction() {
        let dir = tempfile::tempdir().unwrap();
        let file = create(dir.path().join("aeff.hdf5")).unwrap();
        let group = file.create_group("nue").unwrap();
        let err = write_group(&group, "both", &arrays(0.)).unwrap_err();
        assert!(matches!(err, AeffFileError::InvalidInteractionType(_)));
    }
}
