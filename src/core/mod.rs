pub mod db;
pub mod errors;
pub mod helpers;
pub mod locks;
pub mod query_params;
pub mod store;
