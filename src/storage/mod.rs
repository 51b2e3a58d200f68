mod feed_checks;
mod schema;
mod types;

pub use schema::Database;
pub use types::{DatabaseError, FeedCheckRecord};
