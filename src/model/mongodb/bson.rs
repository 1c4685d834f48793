use mongodb::bson::{doc, Bson, Document};

use crate::error::{Error, Result};

/// BSON has no unsigned integers; sequence numbers are stored as `Int64`.
pub fn u64_bson(value: u64) -> Result<Bson> {
    i64::try_from(value)
        .map(Bson::Int64)
        .map_err(|_| Error::BadRequest(format!("{value} does not fit in a BSON integer")))
}

/// Filter matching a single `u32` id field.
pub fn u32_filter(field: &str, value: u32) -> Document {
    doc! { field: i64::from(value) }
}
