//! Relation Metadata
//!
//! A [`Relation`] describes one declared association of an entity type:
//! where it points, its multiplicity, whether it shares the owner's primary
//! key, and which operations cascade across it.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::entity::EntityType;
use crate::error::{GraphError, Result};

/// Cardinality of an association, seen from its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Multiplicity {
    /// Whether the owner holds a collection.
    pub fn is_to_many(&self) -> bool {
        matches!(self, Multiplicity::OneToMany | Multiplicity::ManyToMany)
    }
}

/// An operation that may propagate across a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeType {
    Persist,
    Merge,
    Remove,
    Refresh,
    Detach,
}

impl CascadeType {
    pub const ALL: [CascadeType; 5] = [
        CascadeType::Persist,
        CascadeType::Merge,
        CascadeType::Remove,
        CascadeType::Refresh,
        CascadeType::Detach,
    ];
}

/// Set of cascading operations, kept sorted and free of duplicates.
///
/// Serialized as a plain list; any list deserializes, in any order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CascadeType>", into = "Vec<CascadeType>")]
pub struct CascadeSet(SmallVec<[CascadeType; 5]>);

impl CascadeSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        CascadeType::ALL.iter().copied().collect()
    }

    pub fn insert(&mut self, op: CascadeType) {
        if let Err(pos) = self.0.binary_search(&op) {
            self.0.insert(pos, op);
        }
    }

    pub fn contains(&self, op: CascadeType) -> bool {
        self.0.binary_search(&op).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CascadeType> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<CascadeType> for CascadeSet {
    fn from_iter<I: IntoIterator<Item = CascadeType>>(iter: I) -> Self {
        let mut set = CascadeSet::empty();
        for op in iter {
            set.insert(op);
        }
        set
    }
}

impl From<Vec<CascadeType>> for CascadeSet {
    fn from(ops: Vec<CascadeType>) -> Self {
        ops.into_iter().collect()
    }
}

impl From<CascadeSet> for Vec<CascadeType> {
    fn from(set: CascadeSet) -> Self {
        set.0.into_vec()
    }
}

/// Auxiliary table backing a join-table association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTableMetadata {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    /// Columns referencing the owner.
    #[serde(default)]
    pub join_columns: Vec<String>,
    /// Columns referencing the target.
    #[serde(default)]
    pub inverse_join_columns: Vec<String>,
}

impl JoinTableMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            join_columns: Vec::new(),
            inverse_join_columns: Vec::new(),
        }
    }

    pub fn join_column(mut self, column: impl Into<String>) -> Self {
        self.join_columns.push(column.into());
        self
    }

    pub fn inverse_join_column(mut self, column: impl Into<String>) -> Self {
        self.inverse_join_columns.push(column.into());
        self
    }
}

/// A declared association of an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Property on the owner holding the associated value(s).
    pub property: String,
    /// Element type of the association.
    pub target: EntityType,
    pub multiplicity: Multiplicity,
    #[serde(default)]
    pub join_column: Option<String>,
    /// Property on the target pointing back at the owner.
    #[serde(default)]
    pub inverse: Option<String>,
    /// Target shares the owner's primary key.
    #[serde(default)]
    pub joined_by_primary_key: bool,
    #[serde(default)]
    pub via_join_table: bool,
    #[serde(default)]
    pub join_table: Option<JoinTableMetadata>,
    #[serde(default)]
    pub cascades: CascadeSet,
}

impl Relation {
    pub fn new(
        property: impl Into<String>,
        target: impl Into<EntityType>,
        multiplicity: Multiplicity,
    ) -> Self {
        Self {
            property: property.into(),
            target: target.into(),
            multiplicity,
            join_column: None,
            inverse: None,
            joined_by_primary_key: false,
            via_join_table: false,
            join_table: None,
            cascades: CascadeSet::empty(),
        }
    }

    pub fn one_to_one(property: impl Into<String>, target: impl Into<EntityType>) -> Self {
        Self::new(property, target, Multiplicity::OneToOne)
    }

    pub fn one_to_many(property: impl Into<String>, target: impl Into<EntityType>) -> Self {
        Self::new(property, target, Multiplicity::OneToMany)
    }

    pub fn many_to_one(property: impl Into<String>, target: impl Into<EntityType>) -> Self {
        Self::new(property, target, Multiplicity::ManyToOne)
    }

    pub fn many_to_many(property: impl Into<String>, target: impl Into<EntityType>) -> Self {
        Self::new(property, target, Multiplicity::ManyToMany)
    }

    pub fn join_column(mut self, column: impl Into<String>) -> Self {
        self.join_column = Some(column.into());
        self
    }

    pub fn inverse(mut self, property: impl Into<String>) -> Self {
        self.inverse = Some(property.into());
        self
    }

    pub fn shared_primary_key(mut self) -> Self {
        self.joined_by_primary_key = true;
        self
    }

    pub fn join_table(mut self, join_table: JoinTableMetadata) -> Self {
        self.via_join_table = true;
        self.join_table = Some(join_table);
        self
    }

    pub fn cascade(mut self, cascades: CascadeSet) -> Self {
        self.cascades = cascades;
        self
    }

    pub fn is_bidirectional(&self) -> bool {
        self.inverse.is_some()
    }

    /// Logical name of the association in its store.
    pub fn mapped_name(&self) -> &str {
        if let Some(column) = &self.join_column {
            return column;
        }
        match &self.join_table {
            Some(join_table) if self.via_join_table => &join_table.name,
            _ => &self.property,
        }
    }

    /// Reject combinations a link cannot represent.
    pub fn validate(&self, owner: &EntityType) -> Result<()> {
        if self.via_join_table && self.join_table.is_none() {
            return Err(GraphError::unsupported_relation(
                owner.as_str(),
                &self.property,
                "join-table relation has no join table descriptor",
            ));
        }
        if self.joined_by_primary_key && self.multiplicity.is_to_many() {
            return Err(GraphError::unsupported_relation(
                owner.as_str(),
                &self.property,
                "a to-many relation cannot share the owner's primary key",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cascade_set_is_sorted_and_deduplicated() {
        let set: CascadeSet = [CascadeType::Remove, CascadeType::Persist, CascadeType::Remove]
            .into_iter()
            .collect();
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![CascadeType::Persist, CascadeType::Remove]
        );
        assert!(set.contains(CascadeType::Remove));
        assert!(!set.contains(CascadeType::Merge));
    }

    #[test]
    fn cascade_set_normalizes_when_deserialized() {
        let set: CascadeSet = serde_json::from_str(r#"["remove", "merge", "persist", "remove"]"#).unwrap();

        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![CascadeType::Persist, CascadeType::Merge, CascadeType::Remove]
        );
        assert!(set.contains(CascadeType::Remove));
        assert!(set.contains(CascadeType::Merge));
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["persist","merge","remove"]"#);
    }

    #[test]
    fn mapped_name_prefers_join_column_then_join_table() {
        let by_column = Relation::one_to_one("album", "Album").join_column("ALBUM_ID");
        assert_eq!(by_column.mapped_name(), "ALBUM_ID");

        let by_table = Relation::many_to_many("tags", "Tag").join_table(JoinTableMetadata::new("PHOTO_TAG"));
        assert_eq!(by_table.mapped_name(), "PHOTO_TAG");

        let plain = Relation::many_to_one("owner", "Person");
        assert_eq!(plain.mapped_name(), "owner");
    }

    #[test]
    fn join_table_relation_requires_descriptor() {
        let mut relation = Relation::many_to_many("tags", "Tag");
        relation.via_join_table = true;

        let err = relation.validate(&EntityType::from("Photo")).unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedRelation { .. }));
    }

    #[test]
    fn shared_primary_key_is_to_one_only() {
        let relation = Relation::one_to_many("photos", "Photo").shared_primary_key();
        assert!(relation.validate(&EntityType::from("Album")).is_err());

        let relation = Relation::one_to_one("album", "Album").shared_primary_key();
        assert!(relation.validate(&EntityType::from("Photographer")).is_ok());
    }

    #[test]
    fn relation_parses_with_defaults() {
        let json = r#"{
            "property": "address",
            "target": "Address",
            "multiplicity": "one_to_one",
            "cascades": ["persist", "remove"]
        }"#;

        let relation: Relation = serde_json::from_str(json).unwrap();
        assert_eq!(relation.multiplicity, Multiplicity::OneToOne);
        assert!(!relation.is_bidirectional());
        assert!(relation.cascades.contains(CascadeType::Persist));
        assert!(relation.join_table.is_none());
    }
}
