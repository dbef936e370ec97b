mod opt_reco;

use crate::opt_reco::{Mode, Opt};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{debug, info};
use nureco::binning::Binning;
use nureco::mc::McKernels;
use nureco::param::ParamKernels;
use nureco::rate_map::EventRateMaps;
use nureco::reco::{BuildKernels, RecoService};
use nureco::stored::StoredKernels;
use nureco::{GIT_BRANCH, GIT_REV, VERSION};

fn main() -> Result<()> {
    let args = argfile::expand_args_from(
        std::env::args_os(),
        argfile::parse_fromfile,
        argfile::PREFIX,
    )
    .with_context(|| "Failed to read argument file")?;
    let opt = Opt::parse_from(args).validate()?;

    let env = Env::default().filter_or("NURECO_LOG", &opt.loglevel);
    env_logger::init_from_env(env);

    rayon::ThreadPoolBuilder::new()
        .num_threads(opt.threads)
        .build_global()?;

    if let (Some(rev), Some(branch)) = (GIT_REV, GIT_BRANCH) {
        info!("nureco {VERSION} rev {rev} ({branch})");
    } else {
        info!("nureco {VERSION}");
    }

    debug!("settings: {:#?}", opt);

    let maps = EventRateMaps::from_path(&opt.event_rate_maps).with_context(|| {
        format!("Failed to read event rate maps from {:?}", opt.event_rate_maps)
    })?;
    let (ebins, czbins) = maps
        .check_binning()
        .with_context(|| format!("Invalid event rate maps in {:?}", opt.event_rate_maps))?;

    info!("Defining reconstruction service in mode {}", opt.mode);
    match opt.mode {
        Mode::Mc => {
            let simfile = opt.mc_file.as_ref().context("No simulation file")?;
            let builder = McKernels::builder()
                .simfile(simfile)
                .e_reco_scale(opt.e_reco_scale)
                .cz_reco_scale(opt.cz_reco_scale)
                .weighted(!opt.unweighted)
                .build();
            run_main(builder, ebins, czbins, &maps, &opt)
        }
        Mode::Param => {
            let paramfile = opt.param_file.as_ref().context("No parametrisation file")?;
            let builder =
                ParamKernels::from_path(paramfile, opt.e_reco_scale, opt.cz_reco_scale)
                    .with_context(|| format!("Failed to read {paramfile:?}"))?;
            run_main(builder, ebins, czbins, &maps, &opt)
        }
        Mode::Stored => {
            let kernelfile = opt.kernel_file.as_ref().context("No kernel file")?;
            run_main(StoredKernels::new(kernelfile), ebins, czbins, &maps, &opt)
        }
    }?;
    info!("done");
    Ok(())
}

fn run_main<B: BuildKernels>(
    builder: B,
    ebins: Binning,
    czbins: Binning,
    maps: &EventRateMaps,
    opt: &Opt,
) -> Result<()> {
    let service = RecoService::new(ebins, czbins, builder)
        .context("Failed to compute reconstruction kernels")?;

    if let Some(path) = &opt.store_kernels {
        service
            .store_kernels(path)
            .with_context(|| format!("Failed to write kernels to {path:?}"))?;
    }

    let reco_maps = service
        .get_reco_maps(maps)
        .context("Failed to apply reconstruction kernels")?;

    info!("Saving output to: {:?}", opt.outfile);
    reco_maps
        .to_path(&opt.outfile)
        .with_context(|| format!("Failed to write {:?}", opt.outfile))?;
    Ok(())
}
