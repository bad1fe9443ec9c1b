//! Operator-driven cleanup of people and locations.

pub mod duplicates;
pub mod locations;
pub mod merge;

pub use duplicates::{
    find_blank_last_name_duplicates, find_compound_locations, find_identical_name_duplicates,
    find_similar_locations, IdenticalNameGroup, MergeCandidate, PersonUsage,
};
pub use merge::{merge_locations, merge_person_pairs, merge_persons, BatchOutcome, MergeReport, MoveCounts};
