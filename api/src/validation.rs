use time::{macros::format_description, Date};

use crate::domains::NewPerson;

pub const NAME_MAX_CHARS: usize = 100;
pub const NICKNAME_MAX_CHARS: usize = 32;
pub const STACK_ENTRY_MAX_CHARS: usize = 32;

/// Inbound person as sent by clients. Every field is optional so that a
/// missing value is a rule violation rather than a decoding failure.
#[derive(Debug, Default, serde::Deserialize)]
pub struct PersonPayload {
    #[serde(alias = "name", rename = "nome")]
    pub name: Option<String>,
    #[serde(alias = "nickname", rename = "apelido")]
    pub nickname: Option<String>,
    #[serde(alias = "birth_date", rename = "nascimento")]
    pub birth_date: Option<String>,
    pub stack: Option<Vec<String>>,
}

/// The payload broke at least one rule. Carries no per-field detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("person payload rejected")]
pub struct ValidationError;

impl PersonPayload {
    /// Checks every rule and returns the trimmed, parsed person.
    pub fn validate(self) -> Result<NewPerson, ValidationError> {
        let name = required_text(self.name, NAME_MAX_CHARS)?;
        let nickname = required_text(self.nickname, NICKNAME_MAX_CHARS)?;
        let birth_date = parse_birth_date(self.birth_date.as_deref().ok_or(ValidationError)?)?;

        if let Some(stack) = &self.stack {
            if stack.iter().any(|s| s.chars().count() > STACK_ENTRY_MAX_CHARS) {
                return Err(ValidationError);
            }
        }

        Ok(NewPerson {
            name,
            nickname,
            birth_date,
            stack: self.stack,
        })
    }
}

fn required_text(value: Option<String>, max_chars: usize) -> Result<String, ValidationError> {
    let value = value.ok_or(ValidationError)?;
    let trimmed = value.trim();

    if trimmed.is_empty() || trimmed.chars().count() > max_chars {
        return Err(ValidationError);
    }

    Ok(trimmed.to_owned())
}

/// Accepts only `YYYY-MM-DD` naming a real calendar day.
pub fn parse_birth_date(value: &str) -> Result<Date, ValidationError> {
    let bytes = value.as_bytes();
    let well_shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });

    if !well_shaped {
        return Err(ValidationError);
    }

    Date::parse(value, format_description!("[year]-[month]-[day]")).map_err(|_| ValidationError)
}
