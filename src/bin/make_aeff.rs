mod opt_aeff;

use crate::opt_aeff::Opt;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use itertools::izip;
use log::{debug, info, warn};
use nureco::aeff::AeffSelection;
use nureco::aeff_file;
use nureco::flavour::{Flavour, Interaction, PidConvention};
use nureco::source::Hdf5Source;
use nureco::{GIT_BRANCH, GIT_REV, VERSION};

fn main() -> Result<()> {
    let args = argfile::expand_args_from(
        std::env::args_os(),
        argfile::parse_fromfile,
        argfile::PREFIX,
    )
    .with_context(|| "Failed to read argument file")?;
    let opt = Opt::parse_from(args);

    let env = Env::default().filter_or("NURECO_LOG", &opt.loglevel);
    env_logger::init_from_env(env);

    if let (Some(rev), Some(branch)) = (GIT_REV, GIT_BRANCH) {
        info!("nureco-make-aeff {VERSION} rev {rev} ({branch})");
    } else {
        info!("nureco-make-aeff {VERSION}");
    }

    debug!("settings: {:#?}", opt);

    let cuts = opt.cuts.version();
    warn!("Using cuts {cuts}...");
    let selection = AeffSelection {
        cuts,
        pid: if opt.old_pid {
            PidConvention::Legacy
        } else {
            PidConvention::Pdg
        },
        reco_field: opt.mn_reco.clone(),
    };

    let infiles = [&opt.nue, &opt.numu, &opt.nutau];
    let nfiles = [opt.nfiles_nue, opt.nfiles_numu, opt.nfiles_nutau];
    let inputs: Vec<_> = izip!(Flavour::PARTICLES, infiles, nfiles).collect();
    info!("input files: {inputs:#?}");

    let outfile = aeff_file::create(&opt.outfile)
        .with_context(|| format!("Failed to create {:?}", opt.outfile))?;

    for (flavour, infile, files_per_run) in inputs {
        let source = Hdf5Source::open(infile)
            .with_context(|| format!("Failed to open {infile:?}"))?;
        for flavour in [flavour, flavour.bar()] {
            let select = |interaction: Interaction| {
                selection
                    .event_arrays(&source, flavour, interaction, files_per_run)
                    .with_context(|| {
                        format!("Failed to select {flavour} {interaction} events from {infile:?}")
                    })
            };
            let cc = select(Interaction::Cc)?;
            let nc = select(Interaction::Nc)?;
            aeff_file::write_flavour(&outfile, flavour, &cc, &nc)
                .with_context(|| format!("Failed to write {flavour} to {:?}", opt.outfile))?;
        }
    }
    info!("done");
    Ok(())
}
