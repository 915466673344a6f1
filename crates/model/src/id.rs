use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Declares a server-assigned identifier newtype.
///
/// Identifiers are only ever minted by the remote service; the store never
/// fabricates one.
macro_rules! entity_id {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Display, From, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub i64);
            impl $name {
                pub fn get(self) -> i64 {
                    self.0
                }
            }
            impl From<$name> for i64 {
                fn from(id: $name) -> Self {
                    id.0
                }
            }
        )+
    };
}

entity_id! {
    /// Identifies a [`Book`](crate::Book).
    BookId,
    /// Identifies a [`Series`](crate::Series).
    SeriesId,
    /// Identifies a [`Character`](crate::Character).
    CharacterId,
    /// Identifies a [`Relationship`](crate::Relationship) record.
    RelationshipId,
    /// Identifies a [`Chapter`](crate::Chapter).
    ChapterId,
    /// Identifies a [`Scene`](crate::Scene).
    SceneId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_transparent() {
        assert_eq!(serde_json::to_string(&BookId(7)).unwrap(), "7");
        assert_eq!(serde_json::from_str::<SceneId>("42").unwrap(), SceneId(42));
        assert_eq!(BookId(7).to_string(), "7");
        assert_eq!(i64::from(ChapterId(3)), 3);
    }
}
