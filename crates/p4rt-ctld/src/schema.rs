//! Name-to-id resolution against a loaded P4Info.

use crate::error::{P4rtError, Result, SchemaElement};
use p4rt_proto::p4info::P4Info;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, info};

/// Numeric ids an LPM forwarding rule is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedRuleTemplate {
    pub table_id: u32,
    pub match_field_id: u32,
    pub action_id: u32,
    pub param_id: u32,
}

#[derive(Debug, Clone)]
struct TableSchema {
    id: u32,
    match_fields: HashMap<String, u32>,
}

#[derive(Debug, Clone)]
struct ActionSchema {
    id: u32,
    /// Declaration order matters for the first-param fallback.
    params: Vec<(String, u32)>,
}

/// Immutable index over the tables and actions of a program.
///
/// When a name is declared twice the first declaration wins.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    tables: HashMap<String, TableSchema>,
    actions: HashMap<String, ActionSchema>,
}

impl SchemaIndex {
    pub fn new(p4info: &P4Info) -> Self {
        let mut tables = HashMap::with_capacity(p4info.tables.len());
        for table in &p4info.tables {
            let mut match_fields = HashMap::with_capacity(table.match_fields.len());
            for field in &table.match_fields {
                match_fields.entry(field.name.clone()).or_insert(field.id);
            }

            match tables.entry(table.name().to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(TableSchema {
                        id: table.id(),
                        match_fields,
                    });
                }
                Entry::Occupied(_) => {
                    debug!(table = table.name(), id = table.id(), "Ignoring duplicate table name");
                }
            }
        }

        let mut actions = HashMap::with_capacity(p4info.actions.len());
        for action in &p4info.actions {
            let params = action
                .params
                .iter()
                .map(|param| (param.name.clone(), param.id))
                .collect();

            match actions.entry(action.name().to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(ActionSchema {
                        id: action.id(),
                        params,
                    });
                }
                Entry::Occupied(_) => {
                    debug!(action = action.name(), id = action.id(), "Ignoring duplicate action name");
                }
            }
        }

        Self { tables, actions }
    }

    /// Resolves the ids for a rule template.
    ///
    /// The parameter named `preferred_param` is used when the action declares
    /// one, otherwise its first parameter. Elements are checked in the order
    /// table, match field, action, action parameter; the first missing one
    /// is reported.
    pub fn resolve(
        &self,
        table: &str,
        match_field: &str,
        action: &str,
        preferred_param: &str,
    ) -> Result<ResolvedRuleTemplate> {
        let table_schema = self
            .tables
            .get(table)
            .ok_or_else(|| P4rtError::schema_not_found(SchemaElement::Table, table))?;

        let match_field_id = *table_schema
            .match_fields
            .get(match_field)
            .ok_or_else(|| P4rtError::schema_not_found(SchemaElement::MatchField, match_field))?;

        let action_schema = self
            .actions
            .get(action)
            .ok_or_else(|| P4rtError::schema_not_found(SchemaElement::Action, action))?;

        let param_id = action_schema
            .params
            .iter()
            .find(|(name, _)| name == preferred_param)
            .or_else(|| action_schema.params.first())
            .map(|(_, id)| *id)
            .ok_or_else(|| P4rtError::schema_not_found(SchemaElement::ActionParam, preferred_param))?;

        let template = ResolvedRuleTemplate {
            table_id: table_schema.id,
            match_field_id,
            action_id: action_schema.id,
            param_id,
        };
        info!(
            table,
            table_id = template.table_id,
            match_field_id = template.match_field_id,
            action_id = template.action_id,
            param_id = template.param_id,
            "Resolved rule template"
        );
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p4rt_test::{
        P4InfoBuilder, SAMPLE_ACTION_ID, SAMPLE_MATCH_FIELD_ID, SAMPLE_PARAM_ID, SAMPLE_TABLE_ID,
        sample_p4info,
    };
    use pretty_assertions::assert_eq;

    fn expected() -> ResolvedRuleTemplate {
        ResolvedRuleTemplate {
            table_id: 5,
            match_field_id: 7,
            action_id: 3,
            param_id: 1,
        }
    }

    #[test]
    fn test_resolve_basic() {
        let p4info = P4InfoBuilder::new()
            .table("T", 5, &[("M", 7)])
            .action("A", 3, &[("port", 1)])
            .build();
        let index = SchemaIndex::new(&p4info);
        assert_eq!(index.resolve("T", "M", "A", "port").unwrap(), expected());
    }

    #[test]
    fn test_resolve_ignores_declaration_order() {
        let p4info = P4InfoBuilder::new()
            .action("other", 9, &[("x", 4)])
            .action("A", 3, &[("port", 1)])
            .table("U", 6, &[("N", 8)])
            .table("T", 5, &[("X", 2), ("M", 7)])
            .build();
        let index = SchemaIndex::new(&p4info);
        assert_eq!(index.resolve("T", "M", "A", "port").unwrap(), expected());
    }

    #[test]
    fn test_prefers_named_param() {
        let p4info = P4InfoBuilder::new()
            .table("T", 5, &[("M", 7)])
            .action("A", 3, &[("mac", 2), ("port", 1)])
            .build();
        let template = SchemaIndex::new(&p4info)
            .resolve("T", "M", "A", "port")
            .unwrap();
        assert_eq!(template.param_id, 1);
    }

    #[test]
    fn test_falls_back_to_first_param() {
        let p4info = P4InfoBuilder::new()
            .table("T", 5, &[("M", 7)])
            .action("A", 3, &[("egress_spec", 4), ("mac", 2)])
            .build();
        let template = SchemaIndex::new(&p4info)
            .resolve("T", "M", "A", "port")
            .unwrap();
        assert_eq!(template.param_id, 4);
    }

    #[test]
    fn test_missing_elements_in_order() {
        let p4info = P4InfoBuilder::new()
            .table("T", 5, &[("M", 7)])
            .action("A", 3, &[])
            .build();
        let index = SchemaIndex::new(&p4info);

        let err = index.resolve("missing", "missing", "missing", "port").unwrap_err();
        assert_eq!(err.to_string(), "table not found in P4Info: missing");

        let err = index.resolve("T", "missing", "missing", "port").unwrap_err();
        assert!(matches!(
            err,
            P4rtError::SchemaNotFound {
                element: SchemaElement::MatchField,
                ..
            }
        ));

        let err = index.resolve("T", "M", "missing", "port").unwrap_err();
        assert!(matches!(
            err,
            P4rtError::SchemaNotFound {
                element: SchemaElement::Action,
                ..
            }
        ));

        let err = index.resolve("T", "M", "A", "port").unwrap_err();
        assert_eq!(err.to_string(), "action parameter not found in P4Info: port");
    }

    #[test]
    fn test_first_declaration_wins() {
        let p4info = P4InfoBuilder::new()
            .table("T", 5, &[("M", 7), ("M", 70)])
            .table("T", 50, &[("M", 700)])
            .action("A", 3, &[("port", 1)])
            .action("A", 30, &[("port", 10)])
            .build();
        let index = SchemaIndex::new(&p4info);
        assert_eq!(index.resolve("T", "M", "A", "port").unwrap(), expected());
    }

    #[test]
    fn test_sample_program() {
        let index = SchemaIndex::new(&sample_p4info());
        let template = index
            .resolve(
                "my_ingress.ipv4_match",
                "hdr.ipv4.dst_addr",
                "my_ingress.to_port_action",
                "port",
            )
            .unwrap();
        assert_eq!(
            template,
            ResolvedRuleTemplate {
                table_id: SAMPLE_TABLE_ID,
                match_field_id: SAMPLE_MATCH_FIELD_ID,
                action_id: SAMPLE_ACTION_ID,
                param_id: SAMPLE_PARAM_ID,
            }
        );
    }
}
