//! Test support: an in-memory [`MemoryDatabase`] backend and small environment helpers.

mod memory_db;

pub use memory_db::MemoryDatabase;

/// Loads `.env` (if present) and initialises logging. Safe to call from every test.
pub fn prepare_env() {
    let _ = dotenvy::dotenv();
    let _ = env_logger::try_init();
}
