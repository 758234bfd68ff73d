pub mod error;
pub mod record;
pub mod settings;
pub mod sink;
pub mod source;

pub use error::{SinkError, SourceError};
pub use record::{SinkRecord, SourceRecord};
pub use settings::{SinkSettings, SourceSettings};
pub use sink::{HttpSinkConnector, HttpSinkTask};
pub use source::{HttpSourceConnector, HttpSourceTask};
