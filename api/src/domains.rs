use std::hash::Hash;

use time::Date;
use uuid::Uuid;

/// Separator used when a stack is flattened into a single text column.
/// Entries are not escaped, so an entry holding `;` comes back split.
pub const STACK_DELIMITER: &str = ";";

time::serde::format_description!(birth_date_format, Date, "[year]-[month]-[day]");

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct Person {
    pub id: Uuid,
    #[serde(alias = "name", rename = "nome")]
    pub name: String,
    #[serde(alias = "nickname", rename = "apelido")]
    pub nickname: String,
    #[serde(alias = "birth_date", rename = "nascimento", with = "birth_date_format")]
    pub birth_date: Date,
    pub stack: Option<Vec<String>>,
}

/// A person that passed validation but has not been assigned an id yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPerson {
    pub name: String,
    pub nickname: String,
    pub birth_date: Date,
    pub stack: Option<Vec<String>>,
}

impl NewPerson {
    pub fn into_person(self, id: Uuid) -> Person {
        Person {
            id,
            name: self.name,
            nickname: self.nickname,
            birth_date: self.birth_date,
            stack: self.stack,
        }
    }
}

/// Flattens a stack for storage. Absent and empty stacks both collapse to
/// `None`, which is persisted as `NULL`.
pub fn encode_stack(stack: Option<&[String]>) -> Option<String> {
    let joined = stack?.join(STACK_DELIMITER);
    (!joined.is_empty()).then_some(joined)
}

/// Inverse of [`encode_stack`]. `NULL` and the empty string both read back as
/// an absent stack, never as an empty list.
pub fn decode_stack(stored: Option<&str>) -> Option<Vec<String>> {
    match stored {
        None | Some("") => None,
        Some(stored) => Some(stored.split(STACK_DELIMITER).map(str::to_owned).collect()),
    }
}

impl Hash for Person {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Eq for Person {}

impl PartialEq for Person {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    fn stack(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn stack_is_joined_with_semicolons() {
        let encoded = encode_stack(Some(stack(&["C#", "Npgsql", "Rust"]).as_slice()));
        assert_eq!(encoded.as_deref(), Some("C#;Npgsql;Rust"));
        assert_eq!(
            decode_stack(encoded.as_deref()),
            Some(stack(&["C#", "Npgsql", "Rust"]))
        );
    }

    #[test]
    fn absent_and_empty_stacks_collapse_to_none() {
        assert_eq!(encode_stack(None), None);
        assert_eq!(encode_stack(Some(&[][..])), None);
        assert_eq!(decode_stack(None), None);
        assert_eq!(decode_stack(Some("")), None);
    }

    #[test]
    fn delimiter_inside_an_entry_is_not_escaped() {
        let encoded = encode_stack(Some(stack(&["a;b"]).as_slice()));
        assert_eq!(decode_stack(encoded.as_deref()), Some(stack(&["a", "b"])));
    }

    #[test]
    fn person_serializes_with_wire_names() {
        let person = Person {
            id: Uuid::nil(),
            name: "Pedro".into(),
            nickname: "pedrofgd".into(),
            birth_date: date!(2001 - 02 - 05),
            stack: None,
        };

        let json = serde_json::to_value(&person).unwrap();
        assert_eq!(json["nome"], "Pedro");
        assert_eq!(json["apelido"], "pedrofgd");
        assert_eq!(json["nascimento"], "2001-02-05");
        assert!(json["stack"].is_null());
    }
}
