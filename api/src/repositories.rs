pub mod memory;
pub mod sql;

use uuid::Uuid;

use crate::{
    domains::{NewPerson, Person},
    error::StoreError,
};

/// Maximum number of people returned by a single search.
pub const SEARCH_LIMIT: usize = 50;

#[async_trait::async_trait]
pub trait PeopleRepository {
    /// Persists a new person under a freshly generated id.
    /// A taken nickname yields [`StoreError::Conflict`].
    async fn create(&self, person: NewPerson) -> Result<Uuid, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Person, StoreError>;
    /// Case-insensitive substring match over name, nickname and stack,
    /// ordered by id and capped at [`SEARCH_LIMIT`]. `term` must not be blank.
    async fn search(&self, term: &str) -> Result<Vec<Person>, StoreError>;
    async fn count(&self) -> Result<i64, StoreError>;
}
