//! Core data models: queries, records and tool descriptors.

mod paper;
mod query;
mod record;
mod tool;

pub(crate) use query::default_max_results;

pub use paper::{Paper, PaperBuilder, PaperOrigin};
pub use query::Query;
pub use record::{Activity, Answer, Compound, Record, Target, Trial, WebResult};
pub use tool::{ParamSpec, ParamType, Pattern, SchemaViolation, ToolDescriptor};
