mod db;
mod models;

pub use db::HashIndex;
pub use models::{system_time_to_unix, ImageRecord, NewRecord};

#[cfg(test)]
mod tests;
