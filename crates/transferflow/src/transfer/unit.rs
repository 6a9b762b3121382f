use crate::jobs::model::ColumnMapping;

/// All mappings of one job that share a (source table, target table) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyUnit {
    pub source_table: String,
    pub target_table: String,
    pub mappings: Vec<ColumnMapping>,
}

impl CopyUnit {
    /// Columns to read from the source, first appearance wins, duplicates dropped.
    /// Fixed-value mappings do not read anything.
    pub fn source_columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = Vec::new();
        for m in &self.mappings {
            if m.fixed_value().is_some() {
                continue;
            }
            if let Some(c) = m.source_column() {
                if !cols.contains(&c) {
                    cols.push(c);
                }
            }
        }
        cols
    }

    pub fn key_columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = Vec::new();
        for m in self.mappings.iter().filter(|m| m.is_key) {
            if !cols.contains(&m.target_column.as_str()) {
                cols.push(&m.target_column);
            }
        }
        cols
    }

    /// Units with key mappings are existence-checked; the rest always insert.
    pub fn is_idempotent(&self) -> bool {
        self.mappings.iter().any(|m| m.is_key)
    }

    pub fn label(&self) -> String {
        format!("{} >> {}", self.source_table, self.target_table)
    }
}

/// Group mappings into copy units, in order of first appearance.
pub fn group_units(mappings: Vec<ColumnMapping>) -> Vec<CopyUnit> {
    let mut units: Vec<CopyUnit> = Vec::new();
    for m in mappings {
        match units
            .iter_mut()
            .find(|u| u.source_table == m.source_table && u.target_table == m.target_table)
        {
            Some(unit) => unit.mappings.push(m),
            None => units.push(CopyUnit {
                source_table: m.source_table.clone(),
                target_table: m.target_table.clone(),
                mappings: vec![m],
            }),
        }
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::model::ConvertType;

    fn m(src: &str, dst: &str, col: Option<&str>, target: &str, key: bool) -> ColumnMapping {
        ColumnMapping {
            source_table: src.into(),
            target_table: dst.into(),
            source_column: col.map(str::to_string),
            target_column: target.into(),
            fixed_value: None,
            convert_type: ConvertType::None,
            is_key: key,
        }
    }

    #[test]
    fn groups_by_table_pair_in_load_order() {
        let units = group_units(vec![
            m("b", "y", Some("id"), "id", false),
            m("a", "x", Some("id"), "id", true),
            m("b", "y", Some("name"), "name", false),
            m("a", "z", Some("id"), "id", false),
        ]);

        let labels: Vec<String> = units.iter().map(CopyUnit::label).collect();
        assert_eq!(labels, vec!["b >> y", "a >> x", "a >> z"]);
        assert_eq!(units[0].mappings.len(), 2);
        assert!(!units[0].is_idempotent());
        assert!(units[1].is_idempotent());
        assert_eq!(units[1].key_columns(), vec!["id"]);
    }

    #[test]
    fn fixed_mappings_contribute_no_source_column() {
        let mut fixed = m("a", "x", Some("ignored"), "kind", false);
        fixed.fixed_value = Some("GUID".into());
        let unit = CopyUnit {
            source_table: "a".into(),
            target_table: "x".into(),
            mappings: vec![
                m("a", "x", Some("id"), "id", true),
                fixed,
                m("a", "x", Some("id"), "id_copy", false),
                m("a", "x", None, "empty", false),
            ],
        };
        assert_eq!(unit.source_columns(), vec!["id"]);
    }
}
