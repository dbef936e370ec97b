use std::path::PathBuf;

use log::info;

use crate::binning::Binning;
use crate::kernel::{KernelError, KernelSet};
use crate::reco::BuildKernels;

/// Reconstruction kernels read from a JSON file
///
/// The file is written by [`RecoService::store_kernels`](crate::reco::RecoService::store_kernels).
/// The stored binning is checked against the requested one when the
/// service validates the kernels.
#[derive(Clone, Debug)]
pub struct StoredKernels {
    kernelfile: PathBuf,
}

impl StoredKernels {
    pub fn new<P: Into<PathBuf>>(kernelfile: P) -> Self {
        Self {
            kernelfile: kernelfile.into(),
        }
    }
}

impl BuildKernels for StoredKernels {
    fn name(&self) -> &str {
        "stored kernels"
    }

    fn build_kernels(
        &mut self,
        _ebins: &Binning,
        _czbins: &Binning,
    ) -> Result<KernelSet, KernelError> {
        info!("Loading reconstruction kernels from {:?}", self.kernelfile);
        KernelSet::from_path(&self.kernelfile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flavour::{Flavour, Interaction};
    use crate::reco::RecoService;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn binning(edges: &[f64]) -> Binning {
        Binning::new(edges.to_vec()).unwrap()
    }

    fn kernels() -> KernelSet {
        let mut set = KernelSet::new(binning(&[1., 10., 100.]), binning(&[-1., 1.]));
        let mut kernel = set.zero_kernel();
        kernel[[0, 0, 0, 0]] = 0.25;
        kernel[[0, 0, 1, 0]] = 0.75;
        kernel[[1, 0, 1, 0]] = 1.;
        set.insert(Flavour::NutauBar, Interaction::Nc, kernel);
        set
    }

    #[test]
    fn reload() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernels.json");
        let orig = kernels();
        orig.to_path(&path).unwrap();

        let service =
            RecoService::new(orig.ebins().clone(), orig.czbins().clone(), StoredKernels::new(&path))
                .unwrap();
        assert_eq!(service.kernels(), Some(&orig));
    }

    #[test]
    fn binning_mismatch() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernels.json");
        kernels().to_path(&path).unwrap();

        let err = RecoService::new(
            binning(&[1., 10., 50.]),
            binning(&[-1., 1.]),
            StoredKernels::new(&path),
        )
        .unwrap_err();
        assert!(matches!(err, KernelError::BinningMismatch(_)));
    }

    #[test]
    fn missing_file() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let err = RecoService::new(
            binning(&[1., 10.]),
            binning(&[-1., 1.]),
            StoredKernels::new(dir.path().join("missing.json")),
        )
        .unwrap_err();
        assert!(matches!(err, KernelError::Io(_)));
    }
}
