// Domain vocabulary shared by the storage and API crates

pub mod cursor;
pub mod status;

pub use cursor::Cursor;
pub use status::EventStatus;
