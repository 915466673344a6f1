use super::sanitize;
use crate::attributes::{Attributes, AttributesPatch};
use crate::error::{Error, ErrorKind, Result};
use crate::{CharacterId, Entity, EntityKind, RelationshipId};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Kinship and social relationship types between two characters.
///
/// A relationship is stored **once**, from the perspective of its source
/// character. The view from the related character is derived: symmetric kinds
/// read the same from both ends, and directed kinds with a natural
/// counterpart read as their [`inverse`](Self::inverse).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Parent,
    Child,
    Sibling,
    Spouse,
    Engaged,
    Partner,
    Friend,
    Enemy,
    Mentor,
    Student,
    Colleague,
    Rival,
    Other,
}
impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Child => "child",
            Self::Sibling => "sibling",
            Self::Spouse => "spouse",
            Self::Engaged => "engaged",
            Self::Partner => "partner",
            Self::Friend => "friend",
            Self::Enemy => "enemy",
            Self::Mentor => "mentor",
            Self::Student => "student",
            Self::Colleague => "colleague",
            Self::Rival => "rival",
            Self::Other => "other",
        }
    }

    /// Whether the relationship reads identically from both characters.
    pub fn is_symmetric(&self) -> bool {
        matches!(
            self,
            Self::Sibling
                | Self::Spouse
                | Self::Engaged
                | Self::Partner
                | Self::Friend
                | Self::Enemy
                | Self::Colleague
                | Self::Rival
        )
    }

    /// The kind as seen from the related character, if it can be derived.
    pub fn inverse(&self) -> Option<Self> {
        match self {
            Self::Parent => Some(Self::Child),
            Self::Child => Some(Self::Parent),
            Self::Mentor => Some(Self::Student),
            Self::Student => Some(Self::Mentor),
            Self::Other => None,
            symmetric => Some(*symmetric),
        }
    }
}
impl FromStr for RelationshipKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Ok(match sanitize(s).as_str() {
            "parent" | "mother" | "father" => Self::Parent,
            "child" | "son" | "daughter" => Self::Child,
            "sibling" | "brother" | "sister" => Self::Sibling,
            "spouse" | "husband" | "wife" | "married" => Self::Spouse,
            "engaged" | "fiance" | "fiancee" | "fiancé" | "fiancée" => Self::Engaged,
            "partner" | "lover" => Self::Partner,
            "friend" => Self::Friend,
            "enemy" | "nemesis" => Self::Enemy,
            "mentor" | "teacher" => Self::Mentor,
            "student" | "apprentice" | "pupil" => Self::Student,
            "colleague" | "coworker" => Self::Colleague,
            "rival" => Self::Rival,
            "other" => Self::Other,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "relationship_type",
                value: format!("unknown relationship type: {}", s)
            }),
        })
    }
}
impl Display for RelationshipKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub character_id: CharacterId,
    pub related_character_id: CharacterId,
    #[serde(rename = "relationship_type")]
    pub kind: RelationshipKind,
    #[serde(default)]
    pub metadata: Attributes,
}
impl Relationship {
    pub fn involves(&self, character: CharacterId) -> bool {
        self.character_id == character || self.related_character_id == character
    }
}
impl Entity for Relationship {
    type Id = RelationshipId;
    const KIND: EntityKind = EntityKind::Relationship;
    fn id(&self) -> RelationshipId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRelationship {
    pub character_id: CharacterId,
    pub related_character_id: CharacterId,
    #[serde(rename = "relationship_type")]
    pub kind: RelationshipKind,
    pub metadata: Attributes,
}
impl NewRelationship {
    pub fn new(character_id: CharacterId, related_character_id: CharacterId, kind: RelationshipKind) -> Self {
        Self { character_id, related_character_id, kind, metadata: Attributes::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.character_id == self.related_character_id {
            exn::bail!(ErrorKind::ParseError {
                field: "related_character_id",
                value: "a character cannot be related to itself".to_string()
            });
        }
        Ok(())
    }

    pub fn into_relationship(self, id: RelationshipId) -> Relationship {
        Relationship {
            id,
            character_id: self.character_id,
            related_character_id: self.related_character_id,
            kind: self.kind,
            metadata: self.metadata,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelationshipChanges {
    #[serde(rename = "relationship_type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<RelationshipKind>,
    #[serde(skip_serializing_if = "AttributesPatch::is_empty")]
    pub metadata: AttributesPatch,
}
impl RelationshipChanges {
    pub fn apply_to(self, relationship: &mut Relationship) {
        if let Some(kind) = self.kind {
            relationship.kind = kind;
        }
        relationship.metadata.merge(self.metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RelationshipKind::Spouse, Some(RelationshipKind::Spouse))]
    #[case(RelationshipKind::Engaged, Some(RelationshipKind::Engaged))]
    #[case(RelationshipKind::Parent, Some(RelationshipKind::Child))]
    #[case(RelationshipKind::Student, Some(RelationshipKind::Mentor))]
    #[case(RelationshipKind::Other, None)]
    fn test_inverse(#[case] kind: RelationshipKind, #[case] expected: Option<RelationshipKind>) {
        assert_eq!(kind.inverse(), expected);
    }

    #[test]
    fn test_symmetry() {
        assert!(RelationshipKind::Spouse.is_symmetric());
        assert!(RelationshipKind::Engaged.is_symmetric());
        assert!(!RelationshipKind::Parent.is_symmetric());
        assert!(!RelationshipKind::Other.is_symmetric());
    }

    #[rstest]
    #[case("Wife", RelationshipKind::Spouse)]
    #[case("fiancée", RelationshipKind::Engaged)]
    #[case("co-worker", RelationshipKind::Colleague)]
    fn test_kind_from_str(#[case] input: &str, #[case] expected: RelationshipKind) {
        assert_eq!(input.parse::<RelationshipKind>().unwrap(), expected);
    }

    #[test]
    fn test_self_relationship_is_invalid() {
        let new = NewRelationship::new(CharacterId(1), CharacterId(1), RelationshipKind::Friend);
        assert!(new.validate().is_err());
    }

    #[test]
    fn test_wire_name_of_kind() {
        let rel = NewRelationship::new(CharacterId(1), CharacterId(2), RelationshipKind::Spouse)
            .into_relationship(RelationshipId(9));
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["relationship_type"], "spouse");
    }
}
