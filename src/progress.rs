//! Progress reporting for the endpoint search.
//!
//! With the `progress` feature, [`LinkProgress`] drives an `indicatif` bar that
//! advances once per first endpoint. The bar is shared by the `rayon` workers
//! (`ProgressBar` is internally synchronised). Without the feature the same calls
//! only measure the elapsed time.
//!
//! [`fmt_dur`] renders a [`Duration`] as `"253µs"`, `"42ms"` or `"3.14s"`,
//! depending on the scale.
use std::time::{Duration, Instant};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

pub(crate) struct LinkProgress {
    #[cfg(feature = "progress")]
    bar: ProgressBar,
    started: Instant,
}

impl LinkProgress {
    #[cfg(feature = "progress")]
    pub(crate) fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total.max(1) as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | {per_sec} | ETA {eta_precise}",
        ) {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(200));
        LinkProgress {
            bar,
            started: Instant::now(),
        }
    }

    #[cfg(not(feature = "progress"))]
    pub(crate) fn new(_total: usize) -> Self {
        LinkProgress {
            started: Instant::now(),
        }
    }

    /// One more first endpoint processed.
    #[inline]
    pub(crate) fn inc(&self) {
        #[cfg(feature = "progress")]
        self.bar.inc(1);
    }

    /// Close the bar and return the elapsed time.
    pub(crate) fn finish(self) -> Duration {
        #[cfg(feature = "progress")]
        {
            self.bar.disable_steady_tick();
            self.bar.finish_and_clear();
        }
        self.started.elapsed()
    }
}

#[inline]
pub fn fmt_dur(d: Duration) -> String {
    let us = d.as_micros();
    if us < 1_000 {
        format!("{us}µs")
    } else {
        let ms = d.as_millis();
        if ms < 1_000 {
            format!("{ms}ms")
        } else {
            let s = d.as_secs_f32();
            format!("{s:.2}s")
        }
    }
}
