pub mod config;
pub mod load;
pub mod resolve;
pub mod show;
pub mod summary;

use indicatif::{ProgressBar, ProgressStyle};
use ribscope::lens::rib::{LoadProgress, LoadProgressCallback};
use std::sync::Arc;

/// Progress bar following the persistence of each family
pub(crate) fn progress_callback() -> LoadProgressCallback {
    let style = ProgressStyle::with_template(
        "{prefix:>5} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("##-");

    let pb = ProgressBar::new(0);
    pb.set_style(style);

    Arc::new(move |progress: LoadProgress| match progress {
        LoadProgress::FetchStarted { family } => {
            pb.reset();
            pb.set_prefix(family.to_string());
            pb.set_message("listing paths");
        }
        LoadProgress::Fetched { paths, .. } => {
            pb.set_length(paths as u64);
            pb.set_message(format!("{} paths listed", paths));
        }
        LoadProgress::Persisted { done, total, .. } => {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
            pb.set_message("storing");
        }
        LoadProgress::FamilyCompleted { family, accepted } => {
            pb.set_message(format!("{} accepted", accepted));
            pb.println(format!("{}: {} paths accepted", family, accepted));
        }
    })
}
