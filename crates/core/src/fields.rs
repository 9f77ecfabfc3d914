//! Export field metadata and requirement clauses.
//!
//! An export's metadata carries five categories of fields. Actions declare
//! requirement clauses against field *tags*; [`check_requirements`] is the
//! single evaluation function shared by the synchronous validation path and
//! the streaming `on_fields` callback.

use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// One field of an export, flattened out of its category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Field {
    /// Field name. Uniqueness across categories is NOT guaranteed.
    pub name: String,
    /// Display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Short display label.
    #[serde(default)]
    pub label_short: Option<String>,
    /// Label of the group this field belongs to.
    #[serde(default)]
    pub field_group_label: Option<String>,
    /// Tags attached to the field, evaluated by requirement clauses.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether the field is hidden in the source tool.
    #[serde(default)]
    pub hidden: bool,
    /// Whether the field holds numeric values.
    #[serde(default)]
    pub is_numeric: bool,
}

impl Field {
    /// Whether this field carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// The five raw field-category arrays of an export's metadata, exactly as
/// they appear in the `fields` object of a `json_detail` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldCategories {
    #[serde(default)]
    pub dimensions: Vec<Field>,
    #[serde(default)]
    pub measures: Vec<Field>,
    #[serde(default)]
    pub filters: Vec<Field>,
    #[serde(default)]
    pub parameters: Vec<Field>,
    #[serde(default)]
    pub table_calculations: Vec<Field>,
}

impl FieldCategories {
    /// Flatten the categories into one ordered list: dimensions, measures,
    /// filters, parameters, table calculations.
    pub fn flatten(&self) -> Vec<Field> {
        let mut all = Vec::with_capacity(
            self.dimensions.len()
                + self.measures.len()
                + self.filters.len()
                + self.parameters.len()
                + self.table_calculations.len(),
        );
        all.extend(self.dimensions.iter().cloned());
        all.extend(self.measures.iter().cloned());
        all.extend(self.filters.iter().cloned());
        all.extend(self.parameters.iter().cloned());
        all.extend(self.table_calculations.iter().cloned());
        all
    }
}

/// A declarative rule an export's fields must satisfy before an action runs.
///
/// Wire representation is externally tagged: `{"tag": t}`,
/// `{"any_tag": [..]}` or `{"all_tags": [..]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementClause {
    /// At least one field must carry this tag.
    Tag(String),
    /// At least one field must carry any of these tags.
    AnyTag(Vec<String>),
    /// For every listed tag, at least one field must carry it.
    AllTags(Vec<String>),
}

/// Evaluate every clause against the flattened field list.
///
/// All clauses must pass. The failure message names the unmet tag(s) in the
/// form the upstream tool shows to users.
pub fn check_requirements(
    clauses: &[RequirementClause],
    fields: &[Field],
) -> Result<(), HubError> {
    for clause in clauses {
        match clause {
            RequirementClause::Tag(tag) => {
                if !fields.iter().any(|f| f.has_tag(tag)) {
                    return Err(HubError::missing_required_field(format!(
                        "Query requires a field tagged {tag}."
                    )));
                }
            }
            RequirementClause::AnyTag(tags) => {
                if !fields.iter().any(|f| tags.iter().any(|t| f.has_tag(t))) {
                    return Err(HubError::missing_required_field(format!(
                        "Query requires a field tagged {}.",
                        tags.join(" or ")
                    )));
                }
            }
            RequirementClause::AllTags(tags) => {
                // Every listed tag must be satisfied by some field; one
                // field may satisfy several of them.
                for tag in tags {
                    if !fields.iter().any(|f| f.has_tag(tag)) {
                        return Err(HubError::missing_required_field(format!(
                            "Query requires a field tagged all_tags: {}.",
                            tags.join(", ")
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn field(name: &str, tags: &[&str]) -> Field {
        Field {
            name: name.into(),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            ..Field::default()
        }
    }

    #[test]
    fn any_tag_unmet_names_both_tags() {
        let clauses = vec![RequirementClause::AnyTag(vec![
            "email".into(),
            "user_id".into(),
        ])];
        let fields = vec![field("a", &[])];

        let err = check_requirements(&clauses, &fields).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Query requires a field tagged email or user_id."
        );
    }

    #[test]
    fn any_tag_met_by_one_field() {
        let clauses = vec![RequirementClause::AnyTag(vec![
            "email".into(),
            "user_id".into(),
        ])];
        let fields = vec![field("a", &["email"])];
        assert!(check_requirements(&clauses, &fields).is_ok());
    }

    #[test]
    fn single_tag_clause() {
        let clauses = vec![RequirementClause::Tag("sfdc_contact_id".into())];
        assert!(check_requirements(&clauses, &[field("x", &["sfdc_contact_id"])]).is_ok());

        let err = check_requirements(&clauses, &[field("x", &["other"])]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Query requires a field tagged sfdc_contact_id."
        );
    }

    #[test]
    fn all_tags_requires_every_tag_somewhere() {
        let clauses = vec![RequirementClause::AllTags(vec![
            "email".into(),
            "name".into(),
        ])];

        // One field carrying both tags satisfies both.
        assert!(check_requirements(&clauses, &[field("a", &["email", "name"])]).is_ok());

        // Tags spread across fields also pass.
        assert!(
            check_requirements(&clauses, &[field("a", &["email"]), field("b", &["name"])]).is_ok()
        );

        // A missing tag fails even when the other is present twice.
        let err = check_requirements(&clauses, &[field("a", &["email"]), field("b", &["email"])])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Query requires a field tagged all_tags: email, name."
        );
    }

    #[test]
    fn clauses_are_anded() {
        let clauses = vec![
            RequirementClause::Tag("email".into()),
            RequirementClause::Tag("user_id".into()),
        ];
        let fields = vec![field("a", &["email"])];
        assert!(check_requirements(&clauses, &fields).is_err());
    }

    #[test]
    fn empty_clause_list_always_passes() {
        assert!(check_requirements(&[], &[]).is_ok());
    }

    #[test]
    fn flatten_preserves_category_order_and_duplicates() {
        let categories = FieldCategories {
            dimensions: vec![field("id", &[])],
            measures: vec![field("count", &[])],
            filters: vec![field("id", &[])],
            ..FieldCategories::default()
        };
        let flat = categories.flatten();
        let names: Vec<&str> = flat.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "count", "id"]);
    }

    #[test]
    fn clause_wire_format() {
        let clause: RequirementClause = serde_json::from_str(r#"{"any_tag":["a","b"]}"#).unwrap();
        assert_eq!(clause, RequirementClause::AnyTag(vec!["a".into(), "b".into()]));

        let json = serde_json::to_string(&RequirementClause::Tag("email".into())).unwrap();
        assert_eq!(json, r#"{"tag":"email"}"#);
    }
}
