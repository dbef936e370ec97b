use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use strum::Display;
use thiserror::Error;

#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Ord, PartialOrd, Hash, ValueEnum)]
pub(crate) enum Mode {
    /// Histogram simulated events
    #[value(name = "MC", alias = "mc")]
    #[strum(serialize = "MC")]
    Mc,
    /// Use a parametrised resolution
    #[value(name = "param")]
    #[strum(serialize = "param")]
    Param,
    /// Read kernels from a file
    #[value(name = "stored")]
    #[strum(serialize = "stored")]
    Stored,
}

/// Smear event rate maps with detector reconstruction kernels
///
/// Takes event rate maps in true energy and cos(zenith) and converts
/// them into maps in the reconstructed quantities.
#[derive(Debug, Parser)]
#[clap(about, author, version)]
pub(crate) struct Opt {
    /// JSON file with the event rate maps in true energy and cos(zenith).
    #[clap(value_parser)]
    pub(crate) event_rate_maps: PathBuf,

    /// How to obtain the reconstruction kernels.
    #[clap(value_enum, short, long, default_value = "MC")]
    pub(crate) mode: Mode,

    /// Weighted effective-area file with simulated events.
    ///
    /// Required for mode 'MC'.
    #[clap(long, alias = "mc_file", value_parser)]
    pub(crate) mc_file: Option<PathBuf>,

    /// Histogram simulated events without their effective-area weights.
    #[clap(long)]
    pub(crate) unweighted: bool,

    /// JSON or YAML file with the resolution parametrisation.
    ///
    /// Required for mode 'param'.
    #[clap(long, alias = "param_file", value_parser)]
    pub(crate) param_file: Option<PathBuf>,

    /// JSON file with precomputed reconstruction kernels.
    ///
    /// Required for mode 'stored'.
    #[clap(long, alias = "kernel_file", value_parser)]
    pub(crate) kernel_file: Option<PathBuf>,

    /// Reconstructed energy scaling.
    #[clap(long, alias = "e_reco_scale", default_value = "1.")]
    pub(crate) e_reco_scale: f64,

    /// Reconstructed cos(zenith) scaling.
    #[clap(long, alias = "cz_reco_scale", default_value = "1.")]
    pub(crate) cz_reco_scale: f64,

    /// Also write the normalised kernels to this file.
    #[clap(long, value_parser)]
    pub(crate) store_kernels: Option<PathBuf>,

    /// Output file.
    #[clap(short, long, default_value = "reco.json", value_parser)]
    pub(crate) outfile: PathBuf,

    /// Verbosity level
    #[clap(
        short,
        long,
        default_value = "Info",
        help = "Verbosity level.
Possible values with increasing amount of output are
'off', 'error', 'warn', 'info', 'debug', 'trace'.\n"
    )]
    pub(crate) loglevel: String,

    #[clap(
        short,
        long,
        default_value_t,
        help = "Number of threads.

If set to 0, a default number of threads is chosen.
The default can be set with the `RAYON_NUM_THREADS` environment
variable."
    )]
    pub(crate) threads: usize,
}

impl Opt {
    pub(crate) fn validate(self) -> Result<Self, ValidationError> {
        let missing = match self.mode {
            Mode::Mc if self.mc_file.is_none() => Some("--mc-file"),
            Mode::Param if self.param_file.is_none() => Some("--param-file"),
            Mode::Stored if self.kernel_file.is_none() => Some("--kernel-file"),
            _ => None,
        };
        if let Some(option) = missing {
            return Err(ValidationError::MissingFile(self.mode, option));
        }
        if !(self.e_reco_scale >= 0.) || !(self.cz_reco_scale >= 0.) {
            return Err(ValidationError::NegativeScale);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Error)]
pub(crate) enum ValidationError {
    #[error("Mode '{0}' requires option {1}")]
    MissingFile(Mode, &'static str),
    #[error("Reconstruction scaling factors must not be negative")]
    NegativeScale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underscore_options() {
        let opt = Opt::try_parse_from([
            "nureco",
            "maps.json",
            "--mode",
            "param",
            "--param_file",
            "params.yaml",
            "--e_reco_scale",
            "0.5",
            "--cz_reco_scale",
            "2",
        ])
        .unwrap()
        .validate()
        .unwrap();
        assert_eq!(opt.mode, Mode::Param);
        assert_eq!(opt.param_file, Some(PathBuf::from("params.yaml")));
        assert_eq!(opt.e_reco_scale, 0.5);
        assert_eq!(opt.cz_reco_scale, 2.);

        let opt = Opt::try_parse_from(["nureco", "maps.json", "--mc_file", "aeff.h5"]).unwrap();
        assert_eq!(opt.mode, Mode::Mc);
        assert_eq!(opt.mc_file, Some(PathBuf::from("aeff.h5")));

        let opt =
            Opt::try_parse_from(["nureco", "maps.json", "-m", "stored", "--kernel_file", "k.json"])
                .unwrap();
        assert_eq!(opt.kernel_file, Some(PathBuf::from("k.json")));
    }

    #[test]
    fn validation() {
        let opt = Opt::try_parse_from(["nureco", "maps.json", "--mode", "stored"]).unwrap();
        assert!(matches!(
            opt.validate(),
            Err(ValidationError::MissingFile(Mode::Stored, "--kernel-file"))
        ));
        let opt = Opt::try_parse_from([
            "nureco",
            "maps.json",
            "--mc-file",
            "aeff.h5",
            "--e-reco-scale=-1",
        ])
        .unwrap();
        assert!(matches!(opt.validate(), Err(ValidationError::NegativeScale)));
    }
}
