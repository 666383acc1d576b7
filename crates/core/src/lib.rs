//! Domain logic for the customer roster service.
//!
//! Everything here is free of database access: the spreadsheet import
//! pipeline talks to the store only through the [`uniqueness::UniquenessLookup`]
//! and [`ingest::BatchWriter`] seams, and the listing filter is normalised
//! here before the db crate turns it into SQL.

pub mod customer;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod rules;
pub mod spreadsheet;
pub mod types;
pub mod uniqueness;
pub mod validation;
