//! CLI-specific progress handling for tile-splitter
//!
//! Shows how many start partitions of a split pass are solved.

use indicatif::{ProgressBar, ProgressStyle};

/// Creates a progress bar counting solved partitions
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} partitions ({percent}%) ETA: {eta}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Progress bar shared with the partitioner callback
pub struct ProgressManager {
    pub pb: ProgressBar,
}

impl ProgressManager {
    pub fn new(message: &str) -> Self {
        let pb = create_progress_bar(0);

        // Print initial message to stderr
        eprintln!("{}", message);

        Self { pb }
    }

    /// Callback for [`tile_splitter::Partitioner::with_progress`]
    pub fn callback(&self) -> impl Fn(usize, usize) + Send + Sync + 'static {
        let pb = self.pb.clone();
        move |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}
