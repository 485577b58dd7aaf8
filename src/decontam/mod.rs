//! Contaminant detection from negative-control samples.
//!
//! A taxon is a suspected reagent contaminant when it is present in the
//! negative controls and its mean per-sample relative abundance there is
//! disproportionately higher than in the biological samples:
//!
//! ```text
//! disproportion = |mean_control - mean_biological| / max(mean_control, mean_biological)
//! flagged       = disproportion > threshold && mean_control > mean_biological
//! ```
//!
//! Relative abundances are computed per sample over the dataset passed in
//! (count / sample total), so samples of different depth are comparable.
//! Detection only reports; removing the flagged taxa is a separate,
//! operator-confirmed step (`filter::remove_taxa`).

mod detector;

pub use detector::{detect_contaminants, ContaminantRecord, ContaminantReport};
