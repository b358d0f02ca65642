mod file;

pub use file::{parse_timestamp, FileRecord, FileStatus, NewFileRecord};
