//! Summary statistics for training progress reports.
//!
//! ```
//! use unotune_stats::descriptive::DescriptiveStats;
//!
//! let stats = DescriptiveStats::new([4.0, 1.0, 3.0, 2.0, 5.0]).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! assert_eq!(stats.median, 3.0);
//! ```

pub mod descriptive;
