use thiserror::Error;

use crate::domain::RecordId;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("record {0} does not own an error list")]
    NotAnAggregateRoot(RecordId),
}
