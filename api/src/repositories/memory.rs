use std::collections::BTreeMap;

use time::Date;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    domains::{decode_stack, encode_stack, NewPerson, Person, STACK_DELIMITER},
    error::StoreError,
};

use super::{PeopleRepository, SEARCH_LIMIT};

/// Row as the Postgres table holds it, stack already flattened.
struct StoredPerson {
    name: String,
    nickname: String,
    birth_date: Date,
    stack: Option<String>,
}

impl StoredPerson {
    fn to_person(&self, id: Uuid) -> Person {
        Person {
            id,
            name: self.name.clone(),
            nickname: self.nickname.clone(),
            birth_date: self.birth_date,
            stack: decode_stack(self.stack.as_deref()),
        }
    }

    /// `term` must already be lowercase. Each field is checked on its own,
    /// so a term spanning two fields or two stack entries never matches.
    fn matches(&self, term: &str) -> bool {
        let contains = |field: &str| field.to_lowercase().contains(term);

        contains(self.name.as_str())
            || contains(self.nickname.as_str())
            || self
                .stack
                .as_deref()
                .is_some_and(|stack| stack.split(STACK_DELIMITER).any(contains))
    }
}

/// In-process repository with the same observable behavior as the
/// Postgres one. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryPeopleRepository {
    people: RwLock<BTreeMap<Uuid, StoredPerson>>,
}

impl InMemoryPeopleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PeopleRepository for InMemoryPeopleRepository {
    async fn create(&self, person: NewPerson) -> Result<Uuid, StoreError> {
        let mut people = self.people.write().await;
        if people.values().any(|p| p.nickname == person.nickname) {
            return Err(StoreError::Conflict);
        }

        let id = Uuid::now_v7();
        let stack = encode_stack(person.stack.as_deref());

        people.insert(
            id,
            StoredPerson {
                name: person.name,
                nickname: person.nickname,
                birth_date: person.birth_date,
                stack,
            },
        );

        Ok(id)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Person, StoreError> {
        let people = self.people.read().await;
        people
            .get(&id)
            .map(|p| p.to_person(id))
            .ok_or(StoreError::NotFound)
    }

    async fn search(&self, term: &str) -> Result<Vec<Person>, StoreError> {
        let term = term.to_lowercase();
        let people = self.people.read().await;

        Ok(people
            .iter()
            .filter(|(_, p)| p.matches(&term))
            .take(SEARCH_LIMIT)
            .map(|(id, p)| p.to_person(*id))
            .collect())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.people.read().await.len() as i64)
    }
}
