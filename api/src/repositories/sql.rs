use sqlx::Executor;
use time::Date;
use uuid::Uuid;

use crate::{
    config::DatabaseSettings,
    connection::{ConnectionProvider, PgConnectionSource},
    domains::{decode_stack, encode_stack, NewPerson, Person},
    error::{ConfigError, StoreError},
};

use super::{PeopleRepository, SEARCH_LIMIT};

/// Reference DDL: table, nickname constraint and trigram search index.
pub const SCHEMA: &str = include_str!("../../sql/init.sql");

#[derive(sqlx::FromRow)]
struct PersonRow {
    id: Uuid,
    name: String,
    nickname: String,
    birth_date: Date,
    stack: Option<String>,
}

impl From<PersonRow> for Person {
    fn from(row: PersonRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            nickname: row.nickname,
            birth_date: row.birth_date,
            stack: decode_stack(row.stack.as_deref()),
        }
    }
}

pub struct SqlPeopleRepository {
    provider: ConnectionProvider<PgConnectionSource>,
}

impl SqlPeopleRepository {
    pub fn new(provider: ConnectionProvider<PgConnectionSource>) -> Self {
        Self { provider }
    }

    pub fn connect(settings: &DatabaseSettings) -> Result<Self, ConfigError> {
        let source = PgConnectionSource::new(settings)?;
        Ok(Self::new(ConnectionProvider::new(source, settings.retry_policy())))
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        self.provider.source().pool()
    }

    /// Runs [`SCHEMA`]. Every statement in it is idempotent.
    pub async fn apply_schema(&self) -> Result<(), StoreError> {
        let mut conn = self.provider.acquire().await?;
        (&mut *conn).execute(SCHEMA).await?;
        Ok(())
    }
}

/// Turns a search term into an `ILIKE` pattern that matches it literally.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait::async_trait]
impl PeopleRepository for SqlPeopleRepository {
    #[tracing::instrument(skip_all, fields(nickname = %person.nickname))]
    async fn create(&self, person: NewPerson) -> Result<Uuid, StoreError> {
        let id = Uuid::now_v7();
        let stack = encode_stack(person.stack.as_deref());

        let mut conn = self.provider.acquire().await?;
        let result = sqlx::query(
            "\
INSERT INTO people (id, name, nickname, birth_date, stack) \
VALUES ($1, $2, $3, $4, $5)\
",
        )
        .bind(id)
        .bind(&person.name)
        .bind(&person.nickname)
        .bind(person.birth_date)
        .bind(stack)
        .execute(&mut *conn)
        .await
        .map_err(StoreError::from_insert)?;

        match result.rows_affected() {
            1 => Ok(id),
            n => Err(StoreError::UnexpectedRowCount(n)),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Person, StoreError> {
        let mut conn = self.provider.acquire().await?;
        let row: Option<PersonRow> = sqlx::query_as(
            "\
SELECT \
    id, \
    name, \
    nickname, \
    birth_date, \
    stack \
 FROM people \
WHERE id = $1\
",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(Person::from).ok_or(StoreError::NotFound)
    }

    #[tracing::instrument(skip(self))]
    async fn search(&self, term: &str) -> Result<Vec<Person>, StoreError> {
        let pattern = contains_pattern(term);

        let mut conn = self.provider.acquire().await?;
        let rows: Vec<PersonRow> = sqlx::query_as(
            "\
SELECT \
    id, \
    name, \
    nickname, \
    birth_date, \
    stack \
 FROM people \
WHERE search ILIKE $1 \
  AND (name ILIKE $1 \
    OR nickname ILIKE $1 \
    OR EXISTS (SELECT 1 FROM unnest(string_to_array(stack, ';')) entry WHERE entry ILIKE $1)) \
ORDER BY id \
LIMIT $2\
",
        )
        .bind(pattern)
        .bind(SEARCH_LIMIT as i64)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(Person::from).collect())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let mut conn = self.provider.acquire().await?;
        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(1) FROM people")
            .fetch_one(&mut *conn)
            .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_pattern_wraps_term() {
        assert_eq!(contains_pattern("fgd"), "%fgd%");
    }

    #[test]
    fn search_pattern_escapes_like_wildcards() {
        assert_eq!(contains_pattern("50%_a\\b"), r"%50\%\_a\\b%");
    }
}
