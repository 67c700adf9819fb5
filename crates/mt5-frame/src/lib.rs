//! Record and table forms of terminal results.
//!
//! Native structs are turned into [`Record`]s through [`ToRecord`], gathered
//! into a [`Table`], and post-processed by a [`Pipeline`] of table transforms
//! (time-field conversion, key promotion) configured through [`FrameOptions`].

pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod table;

pub use normalize::{convert_time_fields, is_time_field, to_records, ToRecord};
pub use pipeline::{ConvertTimeFields, FrameOptions, Pipeline, PromoteKey, Transform};
pub use record::{Record, Value};
pub use table::Table;
