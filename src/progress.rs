//! A progress bar for batch runs, advanced once per finished region.
//!
//! Only one progress bar can be active at a time. Log messages written while it is shown clear
//! its line first (see the log encoder), so the bar is redrawn below them.
//!
//! ```ignore
//! init_region_progress(regions.len());
//! // ... from any worker thread, once per region:
//! increment_region_progress();
//! // ... after the last region:
//! finish_region_progress();
//! ```

use crate::log::trace;
use progress_bar::{
    finalize_progress_bar, inc_progress_bar, init_progress_bar, set_progress_bar_action, Color,
    Style,
};

/// Initializes the progress bar for `region_count` regions.
pub fn init_region_progress(region_count: usize) {
    trace!(
        "initializing region progress bar for {} regions",
        region_count
    );
    init_progress_bar(region_count);
    set_progress_bar_action("Regions", Color::Blue, Style::Bold);
}

/// Marks one more region as finished, successfully or not.
pub fn increment_region_progress() {
    inc_progress_bar();
}

pub fn finish_region_progress() {
    finalize_progress_bar();
}
