use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("table sizes exceed 2^31 (offset table {offsets}, primary table {slots}); reduce the number of keys")]
    SizeTooLarge { offsets: u64, slots: u64 },

    #[error("failed to allocate {what}")]
    AllocFailure {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },

    #[error("wide add overflowed the top limb")]
    OverflowOnAdd,

    #[error("bucket {bucket} holds {population} keys, more than a u16 can count; the offset table is far too small")]
    PopulationOverflow { bucket: u32, population: u32 },

    #[error("the all-zero key is reserved as the vacancy sentinel and cannot be inserted")]
    ZeroKey,

    #[error("empty key set provided")]
    EmptyKeySet,

    #[error("table verification failed: {0}")]
    VerifierMismatch(String),
}
