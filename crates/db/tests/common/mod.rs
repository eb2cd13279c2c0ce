//! Common test utilities

use medibot_db::{init_memory, VectorStore};

/// Create a test store with in-memory database
pub async fn create_test_store() -> VectorStore {
    let db = init_memory().await.expect("Failed to create test database");
    VectorStore::new(db)
}

/// A `dim`-dimensional vector with a single 1.0 at `hot`
pub fn unit_vector(dim: usize, hot: usize) -> Vec<f32> {
    (0..dim).map(|i| if i == hot { 1.0 } else { 0.0 }).collect()
}
