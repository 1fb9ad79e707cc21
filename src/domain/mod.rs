//! Domain types for dealscore
//!
//! - ClassifiedRecord: Merger, Acquisition or Other, as labeled or predicted
//! - Field / FieldValue: the comparable fields of a record in declared order

pub mod record;

pub use record::{Acquisition, ClassifiedRecord, Currency, Field, FieldValue, Merger, Other, RecordKind, load_records};
