pub mod field;
pub mod request;
pub mod result;

pub use field::{EntityFields, FieldValue, TimeCoercion};
pub use request::{BarEventType, DateRange, IntradayBarSpec, RequestSpec};
pub use result::{IntradayBarResult, SnapshotResult, TimeSeriesResult};
