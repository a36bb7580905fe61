pub mod db;
mod schema;
pub mod types;
