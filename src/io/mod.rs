//! Dataset loading and result writers.
//!
//! Everything here is a collaborator of the clustering core: the loader
//! produces the immutable scene tables, the writers render the final cluster
//! collection for downstream MVS tools. Any failure in this layer aborts the
//! run; the core never sees partial input.

pub mod colmap;
pub mod dataset;
pub mod patchmatch;
