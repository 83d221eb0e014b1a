//! Library surface for the crossgcc binary and its integration tests.

pub mod builder;
