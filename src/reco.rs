use std::path::Path;

use log::{debug, info};
use ndarray::ArrayD;

use crate::binning::{Axis, Binning};
use crate::kernel::{KernelError, KernelSet};
use crate::rate_map::EventRateMaps;

/// Strategy for constructing reconstruction kernels
pub trait BuildKernels {
    /// Human-readable name of the strategy
    fn name(&self) -> &str;

    /// Build (not necessarily normalised) kernels for the given binning
    ///
    /// The returned set must use exactly the bin edges passed in.
    fn build_kernels(
        &mut self,
        _ebins: &Binning,
        _czbins: &Binning,
    ) -> Result<KernelSet, KernelError> {
        Err(KernelError::StrategyNotImplemented(self.name().to_owned()))
    }
}

impl<B: BuildKernels + ?Sized> BuildKernels for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn build_kernels(
        &mut self,
        ebins: &Binning,
        czbins: &Binning,
    ) -> Result<KernelSet, KernelError> {
        (**self).build_kernels(ebins, czbins)
    }
}

/// Applies reconstruction kernels to event rate maps
///
/// The service owns the analysis binning and a kernel construction
/// strategy. Once the kernels are computed, they are checked against
/// the binning and normalised, and the service is ready to smear
/// maps from true into reconstructed quantities.
#[derive(Debug)]
pub struct RecoService<B> {
    ebins: Binning,
    czbins: Binning,
    builder: B,
    kernels: Option<KernelSet>,
}

impl<B: BuildKernels> RecoService<B> {
    /// Construct a service and compute its kernels
    pub fn new(ebins: Binning, czbins: Binning, builder: B) -> Result<Self, KernelError> {
        let mut service = Self::uninitialised(ebins, czbins, builder);
        service.compute_kernels()?;
        Ok(service)
    }

    /// Construct a service from arrays of bin edges
    pub fn from_edges(
        ebins: ArrayD<f64>,
        czbins: ArrayD<f64>,
        builder: B,
    ) -> Result<Self, KernelError> {
        let ebins = Binning::from_array(ebins)?;
        let czbins = Binning::from_array(czbins)?;
        Self::new(ebins, czbins, builder)
    }

    /// Construct a service without computing any kernels yet
    pub fn uninitialised(ebins: Binning, czbins: Binning, builder: B) -> Self {
        Self {
            ebins,
            czbins,
            builder,
            kernels: None,
        }
    }

    pub fn ebins(&self) -> &Binning {
        &self.ebins
    }

    pub fn czbins(&self) -> &Binning {
        &self.czbins
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// The current kernels, if they have been computed
    pub fn kernels(&self) -> Option<&KernelSet> {
        self.kernels.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.kernels.is_some()
    }

    /// Build, check and normalise a fresh set of kernels
    ///
    /// This does not replace the kernels used by the service.
    pub fn get_norm_reco_kernels(&mut self) -> Result<KernelSet, KernelError> {
        info!(
            "Building reconstruction kernels using {}",
            self.builder.name()
        );
        let mut kernels = self.builder.build_kernels(&self.ebins, &self.czbins)?;
        kernels.check(&self.ebins, &self.czbins)?;
        kernels.normalize();
        debug!("Built {} reconstruction kernels", kernels.len());
        Ok(kernels)
    }

    /// (Re)compute the kernels used by the service
    pub fn compute_kernels(&mut self) -> Result<&KernelSet, KernelError> {
        let kernels = self.get_norm_reco_kernels()?;
        Ok(self.kernels.insert(kernels))
    }

    /// Write the current kernels to a JSON file
    pub fn store_kernels<P: AsRef<Path>>(&self, path: P) -> Result<(), KernelError> {
        let kernels = self.kernels.as_ref().ok_or(KernelError::NotReady)?;
        info!("Storing reconstruction kernels in {:?}", path.as_ref());
        kernels.to_path(path)
    }

    /// Smear event rate maps from true to reconstructed quantities
    ///
    /// All maps must share the binning of the service. The output has
    /// the same flavours, interaction types, binning and additional
    /// entries as the input.
    pub fn get_reco_maps(&self, maps: &EventRateMaps) -> Result<EventRateMaps, KernelError> {
        let kernels = self.kernels.as_ref().ok_or(KernelError::NotReady)?;
        let (ebins, czbins) = maps.check_binning()?;
        self.ebins.check_equal(&ebins, Axis::Energy)?;
        self.czbins.check_equal(&czbins, Axis::Coszen)?;
        maps.try_map_rates(|flavour, interaction, map| {
            debug!("Applying {flavour} {interaction} reconstruction kernel");
            kernels.apply(flavour, interaction, map.map.view())
        })
    }
}
