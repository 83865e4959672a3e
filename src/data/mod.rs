//! Synthetic input data for demos and tests.

pub mod sample;

pub use sample::{SampleData, SyntheticRegion, SyntheticSpec, demo_spec, generate_sample};
