use std::path::PathBuf;

use log::{debug, info, warn};
use ndarray::Array4;
use strum::IntoEnumIterator;
use typed_builder::TypedBuilder;

use crate::aeff::EventArrays;
use crate::aeff_file::{self, AeffFileError};
use crate::binning::Binning;
use crate::flavour::{Flavour, Interaction};
use crate::kernel::{kernel_shape, KernelError, KernelSet};
use crate::progress_bar::{Progress, ProgressBar};
use crate::reco::BuildKernels;

/// Reconstruction kernels histogrammed from simulated events
///
/// Events are read from a weighted effective-area file. The
/// deviation of the reconstructed from the true energy and
/// cos(zenith) can be scaled to emulate a better or worse
/// resolution.
#[derive(Clone, Debug, TypedBuilder)]
pub struct McKernels {
    /// Weighted effective-area file
    #[builder(setter(into))]
    simfile: PathBuf,
    #[builder(default = 1.)]
    e_reco_scale: f64,
    #[builder(default = 1.)]
    cz_reco_scale: f64,
    /// Whether to weight events by their effective area
    #[builder(default = true)]
    weighted: bool,
}

impl McKernels {
    /// Histogram events in true and reconstructed energy and cos(zenith)
    ///
    /// Events outside the binning in any of the four dimensions are
    /// ignored. Returns the kernel and the number of ignored events.
    pub fn histogram(
        &self,
        events: &EventArrays,
        ebins: &Binning,
        czbins: &Binning,
    ) -> (Array4<f64>, usize) {
        let mut kernel = Array4::zeros(kernel_shape(ebins, czbins));
        let mut dropped = 0;
        for (true_e, true_cz, reco_e, reco_cz, weight) in events.iter() {
            let reco_e = true_e + self.e_reco_scale * (reco_e - true_e);
            let reco_cz = true_cz + self.cz_reco_scale * (reco_cz - true_cz);
            let bins = (
                ebins.find_bin(true_e),
                czbins.find_bin(true_cz),
                ebins.find_bin(reco_e),
                czbins.find_bin(reco_cz),
            );
            let (Some(i), Some(j), Some(k), Some(l)) = bins else {
                dropped += 1;
                continue;
            };
            kernel[[i, j, k, l]] += if self.weighted { weight } else { 1. };
        }
        (kernel, dropped)
    }
}

impl BuildKernels for McKernels {
    fn name(&self) -> &str {
        "Monte Carlo"
    }

    fn build_kernels(
        &mut self,
        ebins: &Binning,
        czbins: &Binning,
    ) -> Result<KernelSet, KernelError> {
        info!("Opening file: {:?}", self.simfile);
        let file = hdf5::File::open(&self.simfile).map_err(AeffFileError::from)?;
        if self.e_reco_scale != 1. || self.cz_reco_scale != 1. {
            info!(
                "Scaling reconstruction deviations by {} (energy) and {} (cos(zenith))",
                self.e_reco_scale, self.cz_reco_scale
            );
        }

        let mut kernels = KernelSet::new(ebins.clone(), czbins.clone());
        let nkernels = Flavour::iter().count() * Interaction::iter().count();
        let mut outside = Vec::new();
        let progress = ProgressBar::new(nkernels as u64, "kernels built:");
        for flavour in Flavour::iter() {
            for interaction in Interaction::iter() {
                let events = aeff_file::read_flavour(&file, flavour, interaction)?;
                let (kernel, dropped) = self.histogram(&events, ebins, czbins);
                if dropped > 0 {
                    outside.push((flavour, interaction, dropped, events.len()));
                }
                kernels.insert(flavour, interaction, kernel);
                progress.inc(1);
            }
        }
        progress.finish();
        // logging is suspended while the bar is shown
        for (flavour, interaction, dropped, total) in outside {
            warn!("{dropped} of {total} {flavour} {interaction} events outside binning");
        }
        debug!("Filled {} kernels", kernels.len());
        Ok(kernels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress_bar::tests::lock_log_level;
    use ndarray::s;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256Plus;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn binning(edges: &[f64]) -> Binning {
        Binning::new(edges.to_vec()).unwrap()
    }

    fn events(data: &[(f64, f64, f64, f64, f64)]) -> EventArrays {
        EventArrays::new(
            data.iter().map(|e| e.0).collect(),
            data.iter().map(|e| e.1).collect(),
            data.iter().map(|e| e.2).collect(),
            data.iter().map(|e| e.3).collect(),
            data.iter().map(|e| e.4).collect(),
        )
        .unwrap()
    }

    fn toy_events(rng: &mut impl Rng, n: usize) -> EventArrays {
        let mut data = Vec::with_capacity(n);
        for _ in 0..n {
            let true_e = rng.gen_range(1.0..100.0);
            let true_cz: f64 = rng.gen_range(-1.0..1.0);
            let reco_e = (true_e * rng.gen_range(0.8..1.2_f64)).clamp(1., 100.);
            let reco_cz = (true_cz + rng.gen_range(-0.1..0.1)).clamp(-1., 1.);
            data.push((true_e, true_cz, reco_e, reco_cz, rng.gen_range(0.0..1e-4)));
        }
        events(&data)
    }

    #[test]
    fn histogram() {
        let ebins = binning(&[1., 10., 100.]);
        let czbins = binning(&[-1., 0., 1.]);
        let events = events(&[
            (5., -0.5, 5., -0.5, 1.),
            (5., -0.5, 50., 0.5, 2.),
            (50., 0.5, 20., 0.5, 3.),
            // reco energy below the lowest edge
            (5., -0.5, 0.5, -0.5, 4.),
            // upper edge belongs to the last bin
            (100., 1., 100., 1., 5.),
        ]);
        let mc = McKernels::builder().simfile("unused.hdf5").build();
        let (kernel, dropped) = mc.histogram(&events, &ebins, &czbins);
        assert_eq!(dropped, 1);
        assert_eq!(kernel[[0, 0, 0, 0]], 1.);
        assert_eq!(kernel[[0, 0, 1, 1]], 2.);
        assert_eq!(kernel[[1, 1, 1, 1]], 8.);
        assert_eq!(kernel.sum(), 11.);

        let unweighted = McKernels::builder()
            .simfile("unused.hdf5")
            .weighted(false)
            .build();
        let (kernel, _) = unweighted.histogram(&events, &ebins, &czbins);
        assert_eq!(kernel[[1, 1, 1, 1]], 2.);
        assert_eq!(kernel.sum(), 4.);
    }

    #[test]
    fn reco_scale() {
        let ebins = binning(&[0., 10., 22., 30.]);
        let czbins = binning(&[-1., 1.]);
        let events = events(&[(15., 0., 25., 0., 1.)]);

        let mc = McKernels::builder().simfile("unused.hdf5").build();
        let (kernel, _) = mc.histogram(&events, &ebins, &czbins);
        assert_eq!(kernel[[1, 0, 2, 0]], 1.);
        assert_eq!(kernel.sum(), 1.);

        // halving the deviation moves the event to reco energy 20
        let mc = McKernels::builder()
            .simfile("unused.hdf5")
            .e_reco_scale(0.5)
            .build();
        let (kernel, _) = mc.histogram(&events, &ebins, &czbins);
        assert_eq!(kernel[[1, 0, 1, 0]], 1.);
        assert_eq!(kernel[[1, 0, 2, 0]], 0.);

        let mc = McKernels::builder()
            .simfile("unused.hdf5")
            .e_reco_scale(0.)
            .build();
        let (kernel, _) = mc.histogram(&events, &ebins, &czbins);
        assert_eq!(kernel[[1, 0, 1, 0]], 1.);
    }

    #[test]
    fn toy_sample() {
        init();
        let _lock = lock_log_level();
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aeff.hdf5");
        let file = aeff_file::create(&path).unwrap();
        for flavour in Flavour::iter() {
            let cc = toy_events(&mut rng, 500);
            let nc = toy_events(&mut rng, 200);
            aeff_file::write_flavour(&file, flavour, &cc, &nc).unwrap();
        }
        drop(file);

        let ebins = binning(&[1., 3., 10., 30., 100.]);
        let czbins = binning(&[-1., -0.5, 0., 0.5, 1.]);
        let mut mc = McKernels::builder().simfile(&path).build();
        let mut kernels = mc.build_kernels(&ebins, &czbins).unwrap();
        assert_eq!(kernels.len(), 12);
        kernels.check(&ebins, &czbins).unwrap();
        kernels.normalize();
        for (_, _, kernel) in kernels.iter() {
            for i in 0..4 {
                for j in 0..4 {
                    let sum = kernel.slice(s![i, j, .., ..]).sum();
                    assert!(sum == 0. || (sum - 1.).abs() < 1e-9);
                }
            }
            assert!(kernel.iter().all(|&k| (0. ..=1.).contains(&k)));
        }
    }

    #[test]
    fn missing_flavour() {
        init();
        let _lock = lock_log_level();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aeff.hdf5");
        let file = aeff_file::create(&path).unwrap();
        let ev = events(&[(5., 0.5, 5., 0.5, 1.)]);
        aeff_file::write_flavour(&file, Flavour::Nue, &ev, &ev).unwrap();
        drop(file);

        let ebins = binning(&[1., 10.]);
        let czbins = binning(&[-1., 1.]);
        let mut mc = McKernels::builder().simfile(&path).build();
        assert!(matches!(
            mc.build_kernels(&ebins, &czbins),
            Err(KernelError::AeffFile(AeffFileError::MissingGroup(_)))
        ));
    }

    #[test]
    fn log_level_after_failure() {
        init();
        let _lock = lock_log_level();
        let level = log::max_level();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aeff.hdf5");
        let file = aeff_file::create(&path).unwrap();
        let ev = events(&[(5., 0.5, 5., 0.5, 1.)]);
        aeff_file::write_flavour(&file, Flavour::Nue, &ev, &ev).unwrap();
        drop(file);

        // the progress bar only suspends logging at level info
        log::set_max_level(log::LevelFilter::Info);
        let ebins = binning(&[1., 10.]);
        let czbins = binning(&[-1., 1.]);
        let mut mc = McKernels::builder().simfile(&path).build();
        assert!(mc.build_kernels(&ebins, &czbins).is_err());
        assert_eq!(log::max_level(), log::LevelFilter::Info);
        log::set_max_level(level);
    }
}
