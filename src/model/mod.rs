mod parse;
mod path;
mod query;
mod stats;
mod store;

pub use parse::{load_model, model_from_value, parse_model, parse_positions};
pub use path::{AttackPath, PathFootprint, PathStep, parse_trace};
pub use query::{MetricCondition, PathMetric, Query, QueryFilter, QueryId};
pub use stats::{StatisticsRecord, StatisticsSnapshot};
pub use store::{Host, HostId, LinkId, ModelStore};

#[cfg(test)]
pub(crate) use store::tests::triangle;
