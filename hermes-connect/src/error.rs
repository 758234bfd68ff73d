use hermes_common::ExchangeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink task has not been started")]
    NotStarted,

    #[error("record {index} from topic '{topic}' is not a valid http request: {source}")]
    InvalidRequest {
        topic: String,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source task has not been started")]
    NotStarted,
}
