//! `nureco` applies detector reconstruction kernels to neutrino event
//! rate maps.
//!
//! A reconstruction kernel maps a histogram in true energy and
//! cos(zenith) to the corresponding histogram in reconstructed
//! quantities. Kernels can be obtained from simulated events, from a
//! parametrised detector resolution, or from a previously stored file.
//!
//! # How to use
//!
//! The two command-line programs cover the usual workflow:
//! `nureco-make-aeff` turns raw simulation files into a weighted
//! effective-area file and `nureco` smears event rate maps with
//! kernels built by one of the strategies.
//!
//! ## Most relevant modules
//!
//! - [reco] contains the [reco::RecoService] and the [reco::BuildKernels] strategy trait
//! - [mc], [param] and [stored] implement the kernel construction strategies
//! - [kernel] for kernel validation, normalisation and application
//! - [rate_map] for event rate maps
//! - [cuts] and [aeff] select simulated events and compute their weights
//!

/// Effective-area weights of simulated events
pub mod aeff;
/// HDF5 storage of weighted effective areas
pub mod aeff_file;
/// Histogram bin edges
pub mod binning;
/// Event selection cuts
pub mod cuts;
/// Neutrino flavours and interaction types
pub mod flavour;
pub mod kernel;
/// Kernels from simulated events
pub mod mc;
/// Kernels from a parametrised resolution
pub mod param;
/// Progress bar
pub mod progress_bar;
pub mod rate_map;
pub mod reco;
/// Columnar simulation input
pub mod source;
/// Kernels from a file
pub mod stored;
/// Common traits
pub mod traits;

use lazy_static::lazy_static;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
lazy_static! {
    pub static ref VERSION_MAJOR: u32 =
        env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap();
    pub static ref VERSION_MINOR: u32 =
        env!("CARGO_PKG_VERSION_MINOR").parse().unwrap();
    pub static ref VERSION_PATCH: u32 =
        env!("CARGO_PKG_VERSION_PATCH").parse().unwrap();
}
pub const GIT_REV: Option<&str> = option_env!("VERGEN_GIT_SHA");
pub const GIT_BRANCH: Option<&str> = option_env!("VERGEN_GIT_BRANCH");
