//! # Bom Digest Core
//!
//! The component resolution engine behind Bom Digest: turns free-form chat
//! text into ranked matches against a bill-of-materials catalog (and,
//! optionally, a supplier catalog), then closes the matched set over its
//! dot-delimited ancestor hierarchy.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Backing data is reached through the async [`store::CatalogStore`] trait.
//!
//! ## Pipeline
//!
//! ```text
//! texts ──▶ keywords ──▶ fuzzy ──▶ aggregate ──▶ hierarchy ──▶ Table
//!            (POS)       (WRatio)   (records)     (parents)
//! ```
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`catalog`] | Catalog schema, entries, searchable text, supplier cache |
//! | [`keywords`] | Tokenizer, part-of-speech tagger, keyword filter |
//! | [`fuzzy`] | Indel ratio family and weighted ratio |
//! | [`aggregate`] | Flattening keyword rankings into match records |
//! | [`hierarchy`] | Ancestor computation and parent/child expansion |
//! | [`matcher`] | [`matcher::ComponentMatcher`], the session entry point |
//! | [`store`] | Store trait and in-memory backend |
//! | [`table`] | Ordered rows and markdown rendering |
//! | [`error`] | Typed errors |

pub mod aggregate;
pub mod catalog;
pub mod error;
pub mod fuzzy;
pub mod hierarchy;
pub mod keywords;
pub mod matcher;
pub mod store;
pub mod table;

pub use error::MatchError;
pub use table::{Row, Table};
