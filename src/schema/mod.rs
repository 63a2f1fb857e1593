//! Raw monitoring record schema
//!
//! This module defines the loosely-typed input shape of the three monitoring
//! exports and the batch parsers that read them.

mod adapter;
mod raw_record;

pub use adapter::*;
pub use raw_record::*;
