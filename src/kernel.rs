use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;
use ndarray::{s, Array2, Array4, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aeff_file::AeffFileError;
use crate::binning::{Axis, Binning, BinningError, BinningMismatch};
use crate::flavour::{Flavour, Interaction};
use crate::param::ParamError;
use crate::rate_map::RateMapError;

/// Reconstruction kernels for all flavours and interaction types
///
/// Each kernel is a 4D histogram with axes true energy, true
/// cos(zenith), reconstructed energy, reconstructed cos(zenith). After
/// normalisation the reconstructed part `kernel[[i, j, .., ..]]` is the
/// probability distribution of the reconstructed bin for events in
/// the true bin `(i, j)`.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelSet {
    ebins: Binning,
    czbins: Binning,
    kernels: BTreeMap<Flavour, BTreeMap<Interaction, Array4<f64>>>,
}

impl KernelSet {
    /// An empty set of kernels with the given binning
    pub fn new(ebins: Binning, czbins: Binning) -> Self {
        Self {
            ebins,
            czbins,
            kernels: BTreeMap::new(),
        }
    }

    pub fn ebins(&self) -> &Binning {
        &self.ebins
    }

    pub fn czbins(&self) -> &Binning {
        &self.czbins
    }

    /// Shape every kernel must have for this binning
    pub fn expected_shape(&self) -> [usize; 4] {
        kernel_shape(&self.ebins, &self.czbins)
    }

    /// A kernel of the correct shape with all entries zero
    pub fn zero_kernel(&self) -> Array4<f64> {
        Array4::zeros(self.expected_shape())
    }

    /// Add a kernel, returning the previous one, if any
    pub fn insert(
        &mut self,
        flavour: Flavour,
        interaction: Interaction,
        kernel: Array4<f64>,
    ) -> Option<Array4<f64>> {
        self.kernels
            .entry(flavour)
            .or_default()
            .insert(interaction, kernel)
    }

    pub fn get(&self, flavour: Flavour, interaction: Interaction) -> Option<&Array4<f64>> {
        self.kernels.get(&flavour).and_then(|k| k.get(&interaction))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Flavour, Interaction, &Array4<f64>)> {
        self.kernels.iter().flat_map(|(&flavour, kernels)| {
            kernels
                .iter()
                .map(move |(&interaction, kernel)| (flavour, interaction, kernel))
        })
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Array4<f64>> {
        self.kernels.values_mut().flat_map(|k| k.values_mut())
    }

    /// Number of kernels
    pub fn len(&self) -> usize {
        self.kernels.values().map(|k| k.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that the kernels match the given binning
    ///
    /// The stored bin edges have to agree with `ebins` and `czbins`
    /// and every kernel must have the shape `(nE, nC, nE, nC)`.
    pub fn check(&self, ebins: &Binning, czbins: &Binning) -> Result<(), KernelError> {
        debug!("Checking binning of reconstruction kernels");
        ebins.check_equal(&self.ebins, Axis::Energy)?;
        czbins.check_equal(&self.czbins, Axis::Coszen)?;

        debug!("Checking shape of reconstruction kernels");
        let expected = kernel_shape(ebins, czbins);
        for (flavour, interaction, kernel) in self.iter() {
            if kernel.shape() != expected {
                return Err(KernelError::KernelShape {
                    flavour,
                    interaction,
                    expected,
                    found: kernel.shape().to_vec(),
                });
            }
        }
        debug!("Reconstruction kernels are sane");
        Ok(())
    }

    /// Normalise the reconstructed distribution in each true bin
    ///
    /// True bins without any entries are left at zero.
    pub fn normalize(&mut self) {
        debug!("Normalizing reconstruction kernels");
        for kernel in self.iter_mut() {
            normalize_kernel(kernel);
        }
    }

    /// Smear a histogram in true energy and cos(zenith)
    ///
    /// Returns the histogram in reconstructed energy and
    /// cos(zenith), i.e. `reco[[k, l]] = Σ_ij rate[[i, j]] * kernel[[i, j, k, l]]`.
    pub fn apply(
        &self,
        flavour: Flavour,
        interaction: Interaction,
        rate: ArrayView2<f64>,
    ) -> Result<Array2<f64>, KernelError> {
        let kernel = self
            .get(flavour, interaction)
            .ok_or(KernelError::MissingKernel { flavour, interaction })?;
        let [ne, nc, _, _] = self.expected_shape();
        if rate.shape() != [ne, nc] {
            return Err(KernelError::MapShape {
                flavour,
                interaction,
                expected: [ne, nc],
                found: rate.shape().to_vec(),
            });
        }
        let mut reco = Array2::zeros((ne, nc));
        for ((i, j), &r) in rate.indexed_iter() {
            if r != 0. {
                reco.scaled_add(r, &kernel.slice(s![i, j, .., ..]));
            }
        }
        Ok(reco)
    }

    /// Write kernels in JSON format
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), KernelError> {
        let kernels = self
            .kernels
            .iter()
            .map(|(&flavour, kernels)| {
                let kernels: BTreeMap<_, _> = kernels
                    .iter()
                    .map(|(&interaction, kernel)| (interaction, to_nested(kernel)))
                    .collect();
                (flavour, kernels)
            })
            .collect();
        let file = KernelFile {
            ebins: self.ebins.clone(),
            czbins: self.czbins.clone(),
            kernels,
        };
        serde_json::to_writer(writer, &file)?;
        Ok(())
    }

    /// Read kernels in JSON format
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, KernelError> {
        let file: KernelFile = serde_json::from_reader(reader)?;
        let mut set = Self::new(file.ebins, file.czbins);
        for (flavour, kernels) in file.kernels {
            for (interaction, nested) in kernels {
                let kernel = from_nested(nested)
                    .ok_or(KernelError::Ragged { flavour, interaction })?;
                set.insert(flavour, interaction, kernel);
            }
        }
        Ok(set)
    }

    pub fn to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), KernelError> {
        let mut out = BufWriter::new(File::create(path)?);
        self.to_writer(&mut out)?;
        out.flush()?;
        Ok(())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, KernelError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }
}

/// Shape `(nE, nC, nE, nC)` of a kernel for the given binning
pub fn kernel_shape(ebins: &Binning, czbins: &Binning) -> [usize; 4] {
    let ne = ebins.nbins();
    let nc = czbins.nbins();
    [ne, nc, ne, nc]
}

/// Normalise each true bin of a single kernel
pub fn normalize_kernel(kernel: &mut Array4<f64>) {
    kernel
        .axis_iter_mut(ndarray::Axis(0))
        .into_par_iter()
        .for_each(|mut row| {
            for mut reco in row.outer_iter_mut() {
                let sum = reco.sum();
                if sum > 0. {
                    reco.mapv_inplace(|k| k / sum);
                }
            }
        });
}

type Nested4 = Vec<Vec<Vec<Vec<f64>>>>;

#[derive(Deserialize, Serialize)]
struct KernelFile {
    ebins: Binning,
    czbins: Binning,
    #[serde(flatten)]
    kernels: BTreeMap<Flavour, BTreeMap<Interaction, Nested4>>,
}

fn to_nested(kernel: &Array4<f64>) -> Nested4 {
    kernel
        .outer_iter()
        .map(|a| {
            a.outer_iter()
                .map(|b| b.outer_iter().map(|c| c.to_vec()).collect())
                .collect()
        })
        .collect()
}

fn from_nested(nested: Nested4) -> Option<Array4<f64>> {
    let n0 = nested.len();
    let n1 = nested.first().map_or(0, |a| a.len());
    let n2 = nested.first().and_then(|a| a.first()).map_or(0, |b| b.len());
    let n3 = nested
        .first()
        .and_then(|a| a.first())
        .and_then(|b| b.first())
        .map_or(0, |c| c.len());
    let mut data = Vec::with_capacity(n0 * n1 * n2 * n3);
    for a in nested {
        if a.len() != n1 {
            return None;
        }
        for b in a {
            if b.len() != n2 {
                return None;
            }
            for c in b {
                if c.len() != n3 {
                    return None;
                }
                data.extend(c);
            }
        }
    }
    Array4::from_shape_vec((n0, n1, n2, n3), data).ok()
}

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("Invalid bin edges: {0}")]
    Shape(#[from] BinningError),
    #[error("Binning of reconstruction kernel doesn't match the event maps: {0}")]
    BinningMismatch(#[from] BinningMismatch),
    #[error("Reconstruction kernel for {flavour}/{interaction} has wrong shape: expected {expected:?}, found {found:?}")]
    KernelShape {
        flavour: Flavour,
        interaction: Interaction,
        expected: [usize; 4],
        found: Vec<usize>,
    },
    #[error("Reconstruction kernel for {flavour}/{interaction} is not a rectangular 4D array")]
    Ragged {
        flavour: Flavour,
        interaction: Interaction,
    },
    #[error("No reconstruction kernel for {flavour}/{interaction}")]
    MissingKernel {
        flavour: Flavour,
        interaction: Interaction,
    },
    #[error("Event rate map for {flavour}/{interaction} has wrong shape: expected {expected:?}, found {found:?}")]
    MapShape {
        flavour: Flavour,
        interaction: Interaction,
        expected: [usize; 2],
        found: Vec<usize>,
    },
    #[error("Kernel construction not implemented for {0}")]
    StrategyNotImplemented(String),
    #[error("Reconstruction kernels have not been computed")]
    NotReady,
    #[error("Invalid event rate maps: {0}")]
    RateMap(#[from] RateMapError),
    #[error("Failed to read simulated events: {0}")]
    AeffFile(#[from] AeffFileError),
    #[error("Invalid resolution parametrisation: {0}")]
    Param(#[from] ParamError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
