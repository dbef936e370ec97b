use std::cell::Cell;

use log::LevelFilter;

pub use crate::traits::Progress;

impl Progress for indicatif::ProgressBar {
    fn inc(&self, i: u64) {
        indicatif::ProgressBar::inc(self, i)
    }

    fn finish(&self) {
        indicatif::ProgressBar::finish(self)
    }
}

impl Progress for logbar::ProgressBar {
    fn inc(&self, i: u64) {
        logbar::ProgressBar::inc(self, i as usize)
    }

    fn finish(&self) {
        logbar::ProgressBar::finish(self)
    }
}

/// Progress indicator that shows nothing
pub struct NoProgress {}
impl Progress for NoProgress {
    fn inc(&self, _i: u64) {}

    fn finish(&self) {}
}

pub const NO_PROGRESS: NoProgress = NoProgress {};

/// Progress bar for filling histograms
///
/// An animated bar is shown on interactive terminals and a plain one
/// otherwise. Nothing is shown unless the log level is exactly `info`.
/// While a bar is visible, logging is switched off. The previous level
/// is restored when the bar is finished or dropped, whichever happens
/// first.
pub struct ProgressBar {
    bar: Box<dyn Progress + Send + Sync>,
    suspended_log_level: Cell<Option<LevelFilter>>,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self {
            bar: Box::new(NO_PROGRESS),
            suspended_log_level: Cell::new(None),
        }
    }
}

impl Progress for ProgressBar {
    fn inc(&self, i: u64) {
        self.bar.inc(i);
    }

    fn finish(&self) {
        self.bar.finish();
        self.resume_logging();
    }
}

impl Drop for ProgressBar {
    fn drop(&mut self) {
        self.resume_logging();
    }
}

impl ProgressBar {
    /// A new progress bar with `len` steps
    pub fn new(len: u64, message: &str) -> Self {
        if log::max_level() != LevelFilter::Info {
            ProgressBar::default()
        } else if console::Term::stderr().features().is_attended() {
            ProgressBar::indicatif(len, message)
        } else {
            ProgressBar::logbar(len, message)
        }
    }

    fn indicatif(len: u64, message: &str) -> Self {
        let bar = indicatif::ProgressBar::new(len);
        if let Ok(style) = indicatif::ProgressStyle::default_bar()
            .template("{bar:60.cyan/cyan} {msg} {pos}/{len} [{elapsed}]")
        {
            bar.set_style(style);
        }
        bar.set_message(message.to_owned());
        Self::suspend_logging(Box::new(bar))
    }

    fn logbar(len: u64, message: &str) -> Self {
        let style = logbar::Style::new().indicator('█');
        eprintln!("{message}");
        let bar = logbar::ProgressBar::with_style(len as usize, style);
        Self::suspend_logging(Box::new(bar))
    }

    fn suspend_logging(bar: Box<dyn Progress + Send + Sync>) -> Self {
        let level = log::max_level();
        log::set_max_level(LevelFilter::Off);
        Self {
            bar,
            suspended_log_level: Cell::new(Some(level)),
        }
    }

    fn resume_logging(&self) {
        if let Some(level) = self.suspended_log_level.take() {
            log::set_max_level(level);
        }
    }
}
