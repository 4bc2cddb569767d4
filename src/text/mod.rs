//! Text canonicalization, corruption detection and repair.
//!
//! Every extraction strategy passes its raw block text through
//! [`TextRepairer`] and then [`TextNormalizer`]; the orchestrator uses
//! [`CorruptionDetector`] to decide whether digital output is trustworthy.

pub mod garble;
pub mod normalizer;
pub mod repair;
pub mod script;
pub mod shaping;

pub use garble::{looks_garbled, CorruptionDetector, GarbleStats};
pub use normalizer::{normalize, TextNormalizer};
pub use repair::{RepairDictionary, RepairEntry, TextRepairer};
pub use script::Direction;
