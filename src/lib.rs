//! Oligodesign - PCR Primer and Hybridization Probe Design
//!
//! Picks left and right PCR primers, and optionally an internal
//! hybridization oligo, from a template sequence. Candidate windows are
//! scored against thermodynamic and structural constraints, and the best
//! compatible pairs are returned in a deterministic order.
//!
//! ```no_run
//! use oligodesign::{design, DesignInput, PrimerConfig};
//!
//! let input = DesignInput::new(b"ACGTACGTACGTACGTACGTACGTACGTACGTACGTACGT")?;
//! let result = design(&input, &PrimerConfig::default())?;
//! for pair in &result.pairs {
//!     println!("{} {}", result.left_oligo(pair).start, result.right_oligo(pair).start);
//! }
//! # Ok::<(), oligodesign::DesignError>(())
//! ```

pub mod analysis;

pub use analysis::*;
