// Profile store adapters behind the `ProfileStore` port.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryProfileStore;
pub use postgres::PostgresProfileStore;
