use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use itertools::Itertools;
use log::{debug, info};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;
use typed_builder::TypedBuilder;

use crate::binning::{Axis, Binning};
use crate::flavour::{Flavour, Interaction};
use crate::kernel::{kernel_shape, KernelError, KernelSet};
use crate::reco::BuildKernels;

/// Polynomial `c[0] + c[1] x + c[2] x² + …`
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Polynomial(pub Vec<f64>);

impl Polynomial {
    pub fn eval(&self, x: f64) -> f64 {
        self.0.iter().rev().fold(0., |acc, c| acc * x + c)
    }
}

/// Gaussian resolution with energy-dependent bias and width
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Resolution {
    /// Mean offset of the reconstructed from the true value
    #[serde(default)]
    pub bias: Polynomial,
    /// Standard deviation of the reconstructed value
    pub width: Polynomial,
}

/// Energy and cos(zenith) resolution for one flavour and interaction
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct ResolutionSet {
    pub energy: Resolution,
    pub coszen: Resolution,
}

/// Resolutions for all flavours and interaction types
pub type Parametrisation = BTreeMap<Flavour, BTreeMap<Interaction, ResolutionSet>>;

/// Read a parametrisation from a JSON or YAML file
///
/// Files ending in `.yaml` or `.yml` are read as YAML, all others as JSON.
pub fn read_parametrisation<P: AsRef<Path>>(path: P) -> Result<Parametrisation, ParamError> {
    let path = path.as_ref();
    debug!("Reading resolution parametrisation from {path:?}");
    let reader = BufReader::new(File::open(path)?);
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    let params = if is_yaml {
        serde_yaml::from_reader(reader)?
    } else {
        serde_json::from_reader(reader)?
    };
    Ok(params)
}

/// Reconstruction kernels from a parametrised detector resolution
///
/// For each true bin, the reconstructed energy and cos(zenith) are
/// assumed to be independent and Gaussian around the bin centre,
/// shifted by the bias. The widths are multiplied by the respective
/// scale factors.
#[derive(Clone, Debug, TypedBuilder)]
pub struct ParamKernels {
    #[builder(setter(into))]
    params: Parametrisation,
    #[builder(default = 1.)]
    e_reco_scale: f64,
    #[builder(default = 1.)]
    cz_reco_scale: f64,
}

impl ParamKernels {
    /// Kernels from the parametrisation stored in `paramfile`
    pub fn from_path<P: AsRef<Path>>(
        paramfile: P,
        e_reco_scale: f64,
        cz_reco_scale: f64,
    ) -> Result<Self, ParamError> {
        let params = read_parametrisation(paramfile)?;
        Ok(Self {
            params,
            e_reco_scale,
            cz_reco_scale,
        })
    }

    fn kernel(
        &self,
        res: &ResolutionSet,
        ebins: &Binning,
        czbins: &Binning,
    ) -> Result<Array4<f64>, ParamError> {
        let mut kernel = Array4::zeros(kernel_shape(ebins, czbins));
        for (i, energy) in ebins.centres().into_iter().enumerate() {
            for (j, coszen) in czbins.centres().into_iter().enumerate() {
                let e_prob = bin_probabilities(
                    ebins,
                    energy + res.energy.bias.eval(energy),
                    self.e_reco_scale * res.energy.width.eval(energy),
                    Axis::Energy,
                    energy,
                )?;
                let cz_prob = bin_probabilities(
                    czbins,
                    coszen + res.coszen.bias.eval(energy),
                    self.cz_reco_scale * res.coszen.width.eval(energy),
                    Axis::Coszen,
                    energy,
                )?;
                for (k, pe) in e_prob.iter().enumerate() {
                    for (l, pc) in cz_prob.iter().enumerate() {
                        kernel[[i, j, k, l]] = pe * pc;
                    }
                }
            }
        }
        Ok(kernel)
    }
}

/// Probability for a Gaussian-distributed value to fall into each bin
fn bin_probabilities(
    bins: &Binning,
    mean: f64,
    width: f64,
    axis: Axis,
    energy: f64,
) -> Result<Vec<f64>, ParamError> {
    if !(width > 0.) {
        return Err(ParamError::InvalidWidth { axis, energy, width });
    }
    let normal = Normal::new(mean, width)
        .map_err(|err| ParamError::Distribution(err.to_string()))?;
    Ok(bins
        .edges()
        .iter()
        .map(|&x| normal.cdf(x))
        .tuple_windows()
        .map(|(lo, hi)| hi - lo)
        .collect())
}

impl BuildKernels for ParamKernels {
    fn name(&self) -> &str {
        "parametrised resolution"
    }

    fn build_kernels(
        &mut self,
        ebins: &Binning,
        czbins: &Binning,
    ) -> Result<KernelSet, KernelError> {
        if self.params.is_empty() {
            return Err(ParamError::Empty.into());
        }
        let mut kernels = KernelSet::new(ebins.clone(), czbins.clone());
        for (&flavour, resolutions) in &self.params {
            for (&interaction, res) in resolutions {
                info!("Building {flavour} {interaction} kernel from parametrisation");
                let kernel = self
                    .kernel(res, ebins, czbins)
                    .map_err(|err| err.context(flavour, interaction))?;
                kernels.insert(flavour, interaction, kernel);
            }
        }
        Ok(kernels)
    }
}

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("Empty resolution parametrisation")]
    Empty,
    #[error("Non-positive {axis} resolution {width} at energy {energy}")]
    InvalidWidth { axis: Axis, energy: f64, width: f64 },
    #[error("Failed to construct resolution function: {0}")]
    Distribution(String),
    #[error("{flavour}/{interaction}: {source}")]
    Context {
        flavour: Flavour,
        interaction: Interaction,
        source: Box<ParamError>,
    },
    #[error("Failed to read parametrisation: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse JSON parametrisation: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to parse YAML parametrisation: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ParamError {
    fn context(self, flavour: Flavour, interaction: Interaction) -> Self {
        Self::Context {
            flavour,
            interaction,
            source: Box::new(self),
        }
    }
}
