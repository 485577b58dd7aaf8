//! Data profiling primitives for understanding count matrix characteristics.

mod library_size;
mod sparsity;

pub use library_size::{profile_library_size, LibrarySizeProfile};
pub use sparsity::{profile_sparsity, SparsityProfile};
