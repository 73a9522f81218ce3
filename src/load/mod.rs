// src/load/mod.rs

pub mod csv;
pub mod sqlite;

pub use self::csv::write_csv;
pub use self::sqlite::Store;
