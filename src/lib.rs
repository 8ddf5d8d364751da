//! # polynest
//!
//! 2D irregular nesting: place as many polygonal parts as possible inside a
//! container polygon without overlap, maximising material utilisation.
//!
//! The engine combines three layers:
//!
//! - **No-Fit Polygons** ([`nfp`], [`sliding`]): the geometric kernel that
//!   turns "where can this part go" into polygon regions. Convex pairs use a
//!   Minkowski edge sweep, concave pairs a triangulate-and-union construction
//!   or orbital sliding.
//! - **Placement** ([`placement`]): a greedy worker that walks an ordered
//!   part list and drops each part at the feasible position minimising the
//!   layout's bounding width.
//! - **Optimisation** ([`ga`]): a seeded genetic algorithm searching over
//!   placement order and rotations, evaluating individuals in parallel
//!   against a shared NFP cache ([`cache`]).
//!
//! ## Quick start
//!
//! ```rust
//! use polynest::{NestConfig, Nester, Point};
//!
//! let mut nester = Nester::new(
//!     NestConfig::new()
//!         .with_rotations(1)
//!         .with_population_size(4)
//!         .with_max_generations(5)
//!         .with_seed(1),
//! );
//!
//! let square = |w: f64| vec![
//!     Point::new(0.0, 0.0),
//!     Point::new(w, 0.0),
//!     Point::new(w, w),
//!     Point::new(0.0, w),
//! ];
//!
//! nester.add_container(&square(100.0))?;
//! nester.add_part(&square(10.0))?;
//!
//! let result = nester.run()?;
//! assert_eq!(result.placed_count(), 1);
//! println!("utilization: {}", result.utilization_percent());
//! # Ok::<(), polynest::Error>(())
//! ```
//!
//! Rotations are degrees everywhere; placements are "rotate around the
//! origin, then translate". The ingest and emit layers (CAD parsing, curve
//! flattening, drawing) are deliberately out of scope: the engine consumes
//! ordered vertex loops and hands back poses.

pub mod cache;
pub mod clipper;
pub mod config;
pub mod error;
pub mod ga;
pub mod geometry;
pub mod nester;
pub mod nfp;
pub mod part;
pub mod placement;
pub mod result;
pub mod sliding;

// Re-exports
pub use cache::{NfpCache, NfpKey};
pub use config::NestConfig;
pub use error::{Error, Result};
pub use ga::{GeneticAlgorithm, Individual};
pub use geometry::{Bounds, Point};
pub use nester::Nester;
pub use nfp::{Nfp, NfpOutcome, Region};
pub use part::{Container, Part, RotatedPart};
pub use placement::PlacementWorker;
pub use result::{FitnessRecord, GenerationStats, NestResult, Placement};
