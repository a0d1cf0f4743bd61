pub mod delete_all;

pub use delete_all::{DeleteAllLogsError, DeleteAllLogsResponse};
