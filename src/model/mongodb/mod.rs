mod bson;
mod collection;
pub(crate) mod errors;

pub use bson::{u32_filter, u64_bson};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
