pub mod db;
mod sqlite_impl;
#[cfg(test)]
mod tests;

pub use sqlite_impl::SqliteDatabase;
