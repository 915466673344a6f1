use super::sanitize;
use crate::attributes::{Attributes, AttributesPatch};
use crate::error::{Error, ErrorKind, Result};
use crate::{BookId, CharacterId, Entity, EntityKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// The narrative role of a character within its book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Protagonist,
    Supporting,
    Antagonist,
    Marginal,
    #[default]
    Unsorted,
}
impl Role {
    /// Roles in the order role-grouped views present them.
    pub const ALL: [Role; 5] = [Self::Protagonist, Self::Supporting, Self::Antagonist, Self::Marginal, Self::Unsorted];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Protagonist => "protagonist",
            Self::Supporting => "supporting",
            Self::Antagonist => "antagonist",
            Self::Marginal => "marginal",
            Self::Unsorted => "unsorted",
        }
    }
}
impl FromStr for Role {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match sanitize(s).as_str() {
            "protagonist" | "main" | "lead" => Self::Protagonist,
            "supporting" | "secondary" => Self::Supporting,
            "antagonist" | "villain" => Self::Antagonist,
            "marginal" | "minor" | "background" => Self::Marginal,
            "unsorted" | "" => Self::Unsorted,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "role",
                value: format!("unknown role: {}", s)
            }),
        })
    }
}
impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    /// Every character belongs to exactly one book.
    pub book_id: BookId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub role: Role,
    pub avatar: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub position: u32,
}
impl Character {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}
impl Entity for Character {
    type Id = CharacterId;
    const KIND: EntityKind = EntityKind::Character;
    fn id(&self) -> CharacterId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCharacter {
    pub book_id: BookId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub role: Role,
    pub avatar: Option<String>,
    pub attributes: Attributes,
}
impl NewCharacter {
    pub fn new(book_id: BookId, first_name: impl Into<String>) -> Self {
        Self {
            book_id,
            first_name: first_name.into(),
            last_name: None,
            role: Role::default(),
            avatar: None,
            attributes: Attributes::default(),
        }
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_name.trim().is_empty() {
            exn::bail!(ErrorKind::MissingField("first_name"));
        }
        Ok(())
    }

    pub fn into_character(self, id: CharacterId, position: u32) -> Character {
        Character {
            id,
            book_id: self.book_id,
            first_name: self.first_name,
            last_name: self.last_name,
            role: self.role,
            avatar: self.avatar,
            attributes: self.attributes,
            position,
        }
    }
}

/// Partial update of a [`Character`].
///
/// Attributes are shallow-merged, see [`Attributes::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CharacterChanges {
    /// Moves the character to another book.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_id: Option<BookId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Option<String>>,
    #[serde(skip_serializing_if = "AttributesPatch::is_empty")]
    pub attributes: AttributesPatch,
}
impl CharacterChanges {
    pub fn validate(&self) -> Result<()> {
        if self.first_name.as_ref().is_some_and(|n| n.trim().is_empty()) {
            exn::bail!(ErrorKind::MissingField("first_name"));
        }
        Ok(())
    }

    pub fn apply_to(self, character: &mut Character) {
        if let Some(book_id) = self.book_id {
            character.book_id = book_id;
        }
        if let Some(first_name) = self.first_name {
            character.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            character.last_name = last_name;
        }
        if let Some(role) = self.role {
            character.role = role;
        }
        if let Some(avatar) = self.avatar {
            character.avatar = avatar;
        }
        character.attributes.merge(self.attributes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AttributeValue;
    use rstest::rstest;

    #[rstest]
    #[case("Protagonist", Role::Protagonist)]
    #[case("villain", Role::Antagonist)]
    #[case("minor", Role::Marginal)]
    #[case("", Role::Unsorted)]
    fn test_role_from_str(#[case] input: &str, #[case] expected: Role) {
        assert_eq!(input.parse::<Role>().unwrap(), expected);
    }

    #[test]
    fn test_full_name() {
        let paul = NewCharacter::new(BookId(1), "Paul").with_last_name("Atreides").into_character(CharacterId(1), 0);
        assert_eq!(paul.full_name(), "Paul Atreides");
        let alia = NewCharacter::new(BookId(1), "Alia").into_character(CharacterId(2), 1);
        assert_eq!(alia.full_name(), "Alia");
    }

    #[test]
    fn test_changes_merge_attributes() {
        let mut new = NewCharacter::new(BookId(1), "Paul");
        new.attributes.insert("eyes", "blue");
        new.attributes.insert("house", "Atreides");
        let mut paul = new.into_character(CharacterId(1), 0);
        CharacterChanges {
            role: Some(Role::Protagonist),
            attributes: AttributesPatch::from([("eyes".to_string(), None)]),
            ..Default::default()
        }
        .apply_to(&mut paul);
        assert_eq!(paul.role, Role::Protagonist);
        assert_eq!(paul.attributes.get("eyes"), None);
        assert_eq!(paul.attributes.get("house"), Some(&AttributeValue::Text("Atreides".to_string())));
    }
}
