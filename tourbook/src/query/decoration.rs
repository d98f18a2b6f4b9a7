//! Query decorations
//!
//! Business rules that apply to every read of a resource, declared
//! explicitly instead of hiding in storage callbacks. The builder applies
//! them after the caller-driven steps; single-document operations use
//! [`scope_filter`] and [`scope_projection`] so that hidden documents stay
//! hidden for get, update and delete too.

use serde_json::Value;

use crate::repository::{FilterCondition, FindQuery, Filter, Populate, Projection};

/// A read-time rule attached to a resource
#[derive(Debug, Clone)]
pub enum QueryDecoration {
    /// Hide documents whose `field` equals `value`
    HideWhere {
        /// Field to test
        field: &'static str,
        /// Value that hides the document
        value: Value,
    },
    /// Never return these fields
    HideFields(Vec<&'static str>),
    /// Populate related documents on every read
    Populate(Populate),
}

impl QueryDecoration {
    /// Hide documents whose `field` equals `value`
    pub fn hide_where(field: &'static str, value: Value) -> Self {
        Self::HideWhere { field, value }
    }

    /// Apply the decoration to a composed query
    pub fn apply(&self, query: &mut FindQuery) {
        match self {
            Self::HideWhere { field, value } => {
                query
                    .filter
                    .conditions
                    .push(FilterCondition::ne(*field, value.clone()));
            }
            Self::HideFields(fields) => {
                query.projection = std::mem::take(&mut query.projection).without(fields);
            }
            Self::Populate(populate) => query.populate.push(populate.clone()),
        }
    }
}

/// Conditions a single addressed document must satisfy to be visible
pub fn scope_filter(decorations: &[QueryDecoration]) -> Filter {
    decorations
        .iter()
        .fold(Filter::new(), |filter, decoration| match decoration {
            QueryDecoration::HideWhere { field, value } => {
                filter.and(FilterCondition::ne(*field, value.clone()))
            }
            _ => filter,
        })
}

/// Projection for single-document reads
pub fn scope_projection(decorations: &[QueryDecoration]) -> Projection {
    decorations
        .iter()
        .fold(Projection::default(), |projection, decoration| match decoration {
            QueryDecoration::HideFields(fields) => projection.without(fields),
            _ => projection,
        })
}

/// Population instructions declared by the decorations
pub fn scope_populate(decorations: &[QueryDecoration]) -> Vec<Populate> {
    decorations
        .iter()
        .filter_map(|decoration| match decoration {
            QueryDecoration::Populate(populate) => Some(populate.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_appends_each_kind() {
        let mut query = FindQuery::default();
        for decoration in [
            QueryDecoration::hide_where("secretTour", json!(true)),
            QueryDecoration::HideFields(vec!["createdAt"]),
            QueryDecoration::Populate(Populate::reference("guides", "users")),
        ] {
            decoration.apply(&mut query);
        }

        assert_eq!(
            query.filter.conditions,
            vec![FilterCondition::ne("secretTour", json!(true))]
        );
        assert_eq!(query.projection, Projection::Exclude(vec!["createdAt".into()]));
        assert_eq!(query.populate.len(), 1);
    }

    #[test]
    fn test_scope_helpers() {
        let decorations = vec![
            QueryDecoration::hide_where("active", json!(false)),
            QueryDecoration::HideFields(vec!["password", "active"]),
        ];
        assert_eq!(
            scope_filter(&decorations).conditions,
            vec![FilterCondition::ne("active", json!(false))]
        );
        assert_eq!(
            scope_projection(&decorations),
            Projection::Exclude(vec!["password".into(), "active".into()])
        );
        assert!(scope_populate(&decorations).is_empty());
    }
}
