use std::path::PathBuf;

use clap::{Args, Parser};
use nureco::cuts::CutVersion;

#[derive(Debug, Copy, Clone, Args)]
#[group(required = true, multiple = false)]
pub(crate) struct CutSelection {
    /// Use V3 selection cuts.
    #[clap(long, alias = "cutsV3")]
    pub(crate) cuts_v3: bool,
    /// Use V4 selection cuts.
    #[clap(long, alias = "cutsV4")]
    pub(crate) cuts_v4: bool,
    /// Use V5 selection cuts.
    #[clap(long, alias = "cutsV5")]
    pub(crate) cuts_v5: bool,
}

impl CutSelection {
    pub(crate) fn version(&self) -> CutVersion {
        if self.cuts_v3 {
            CutVersion::V3
        } else if self.cuts_v4 {
            CutVersion::V4
        } else {
            CutVersion::V5
        }
    }
}

/// Build a weighted effective-area file from simulated events
///
/// Selects the simulated and reconstructed events of each neutrino
/// flavour and interaction type and writes them together with their
/// effective-area weights. Neutrinos and antineutrinos are kept
/// separate.
#[derive(Debug, Parser)]
#[clap(about, author, version)]
pub(crate) struct Opt {
    /// Electron neutrino simulation file.
    #[clap(value_parser)]
    pub(crate) nue: PathBuf,

    /// Muon neutrino simulation file.
    #[clap(value_parser)]
    pub(crate) numu: PathBuf,

    /// Tau neutrino simulation file.
    #[clap(value_parser)]
    pub(crate) nutau: PathBuf,

    /// Output file.
    #[clap(value_parser)]
    pub(crate) outfile: PathBuf,

    /// Number of electron neutrino simulation files per run.
    #[clap(long, alias = "nfiles_nue", default_value = "200.")]
    pub(crate) nfiles_nue: f64,

    /// Number of muon neutrino simulation files per run.
    #[clap(long, alias = "nfiles_numu", default_value = "200.")]
    pub(crate) nfiles_numu: f64,

    /// Number of tau neutrino simulation files per run.
    #[clap(long, alias = "nfiles_nutau", default_value = "200.")]
    pub(crate) nfiles_nutau: f64,

    /// Table with the reconstructed energy and zenith angle.
    #[clap(long, alias = "mn_reco", default_value = "MultiNest_8D_Neutrino")]
    pub(crate) mn_reco: String,

    /// Use the older convention for particle IDs.
    #[clap(long, alias = "old_pid")]
    pub(crate) old_pid: bool,

    #[clap(flatten)]
    pub(crate) cuts: CutSelection,

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
}
