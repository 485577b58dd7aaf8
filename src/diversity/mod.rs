//! Alpha and beta diversity of the processed samples.
//!
//! Alpha metrics are computed per sample from raw counts: observed richness,
//! Shannon entropy (natural log), Simpson's index (1 - Σp²) and the
//! bias-corrected Chao1 estimator. Beta diversity is Bray-Curtis dissimilarity
//! between every pair of samples. Both are meaningful on rarefied data.

mod alpha;
mod beta;

pub use alpha::{alpha_diversity, chao1, observed, shannon, simpson, AlphaDiversity, AlphaTable};
pub use beta::{bray_curtis, bray_curtis_matrix, DistanceMatrix};
