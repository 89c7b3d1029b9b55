//! # rom-basis
//!
//! Snapshot sampling and static SVD basis generation for reduced-order
//! models.
//!
//! A simulation driver feeds state (and optionally right-hand-side)
//! vectors to a generator; the generator groups them into time intervals
//! and computes one truncated SVD basis per interval, which a writer
//! persists incrementally:
//!
//! - **Sampling** ([`SvdSampler`], [`StaticSvdSampler`]): when to take a sample
//! - **Generation** ([`SvdBasisGenerator`]): interval bookkeeping and lazy bases
//! - **Static SVD** ([`static_svd`]): rank, energy and tolerance truncation
//! - **Persistence** ([`BasisWriter`], [`BasisReader`], [`Database`]): binary
//!   and text stores
//!
//! ## Quick Start
//!
//! ```rust
//! use rom_basis::{BasisWriter, DatabaseFormat, StaticSvdOptions, SvdBasisGenerator};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let base = dir.path().join("basis");
//!
//! let options = StaticSvdOptions {
//!     samples_per_time_interval: Some(10),
//!     max_basis_dimension: 3,
//!     ..StaticSvdOptions::new(4)
//! };
//! let mut generator = SvdBasisGenerator::new(options).unwrap();
//! let mut writer = BasisWriter::new(base.to_str().unwrap(), DatabaseFormat::Binary).unwrap();
//!
//! for step in 0..25 {
//!     let t = step as f64 * 0.1;
//!     if generator.is_next_sample(t) {
//!         let state = [t.sin(), t.cos(), (2.0 * t).sin(), 1.0];
//!         generator.take_sample(&state, None, t).unwrap();
//!     }
//! }
//!
//! // Two full intervals are final; the third is still open.
//! assert_eq!(writer.write_basis(&mut generator, false).unwrap(), 2);
//! generator.end_samples();
//! assert_eq!(writer.write_basis(&mut generator, false).unwrap(), 1);
//! ```

pub mod types;

pub mod database;
pub mod generator;
pub mod interval;
pub mod reader;
pub mod sampler;
pub mod svd;
pub mod utils;
pub mod writer;

pub use database::{Database, DatabaseFormat, FileDatabase};
pub use generator::SvdBasisGenerator;
pub use interval::TimeInterval;
pub use reader::BasisReader;
pub use sampler::{StaticSvdSampler, SvdSampler};
pub use svd::static_svd;
pub use types::{Basis, BasisError, StaticSvdOptions, Truncation};
pub use utils::orthonormality_error;
pub use writer::BasisWriter;
