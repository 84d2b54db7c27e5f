use crate::reconcile::ReportRow;

use super::Column;

/// Row selection applied before projection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
    /// Allowed states, empty allows all
    pub states: Vec<String>,
    /// Allowed namespaces, empty allows all. Rows without a namespace always pass.
    pub namespaces: Vec<String>,
    pub only_broken: bool,
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl RowFilter {
    /// Build a filter from the comma-separated flag values
    pub fn new(states: &str, namespaces: &str, only_broken: bool) -> Self {
        Self {
            states: split_list(states),
            namespaces: split_list(namespaces),
            only_broken,
        }
    }

    pub fn matches(&self, row: &dyn ReportRow) -> bool {
        if !self.states.is_empty() && !self.states.iter().any(|s| s == row.state()) {
            return false;
        }
        if let Some(namespace) = row.namespace() {
            if !self.namespaces.is_empty() && !self.namespaces.iter().any(|n| n == namespace) {
                return false;
            }
        }
        !self.only_broken || row.is_broken()
    }
}

/// Filter `rows` and project each survivor onto `columns`. Columns that do
/// not apply to the row kind render as the placeholder.
pub fn project<R: ReportRow>(rows: &[R], columns: &[Column], filter: &RowFilter) -> Vec<Vec<String>> {
    rows.iter()
        .filter(|row| filter.matches(*row))
        .map(|row| {
            columns
                .iter()
                .map(|c| {
                    row.value(*c)
                        .unwrap_or_else(|| crate::models::PLACEHOLDER.to_string())
                })
                .collect()
        })
        .collect()
}

/// Header line for `columns`
pub fn header(columns: &[Column]) -> Vec<String> {
    columns.iter().map(|c| c.as_str().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{Anomaly, Notes};

    struct FakeRow {
        id: &'static str,
        state: &'static str,
        namespace: Option<&'static str>,
        notes: Notes,
    }

    impl ReportRow for FakeRow {
        fn value(&self, column: Column) -> Option<String> {
            match column {
                Column::CinderId => Some(self.id.to_string()),
                Column::CinderStatus => Some(self.state.to_string()),
                Column::Note => Some(self.notes.to_string()),
                _ => None,
            }
        }

        fn state(&self) -> &str {
            self.state
        }

        fn namespace(&self) -> Option<&str> {
            self.namespace
        }

        fn notes(&self) -> &Notes {
            &self.notes
        }
    }

    fn row(id: &'static str, state: &'static str, namespace: Option<&'static str>, broken: bool) -> FakeRow {
        let mut notes = Notes::default();
        if broken {
            notes.push(Anomaly::InUseButNotAttached);
        }
        FakeRow {
            id,
            state,
            namespace,
            notes,
        }
    }

    fn rows() -> Vec<FakeRow> {
        vec![
            row("v1", "available", Some("ns1"), false),
            row("v2", "in-use", Some("ns2"), true),
            row("v3", "error", None, true),
            row("v4", "in-use", None, false),
        ]
    }

    fn ids(lines: &[Vec<String>]) -> Vec<&str> {
        lines.iter().map(|l| l[0].as_str()).collect()
    }

    #[test]
    fn test_state_filter_is_allow_list() {
        let filter = RowFilter::new("available,in-use", "", false);
        let lines = project(&rows(), &[Column::CinderId, Column::CinderStatus], &filter);

        assert_eq!(ids(&lines), vec!["v1", "v2", "v4"]);
        assert!(lines.iter().all(|l| l[1] == "available" || l[1] == "in-use"));
    }

    #[test]
    fn test_only_broken_is_subset() {
        let columns = [Column::CinderId];
        for states in ["", "in-use", "error,available"] {
            let all = project(&rows(), &columns, &RowFilter::new(states, "", false));
            let broken = project(&rows(), &columns, &RowFilter::new(states, "", true));
            assert!(broken.iter().all(|line| all.contains(line)), "states {states:?}");
        }
    }

    #[test]
    fn test_namespace_filter_keeps_rows_without_namespace() {
        let filter = RowFilter::new("", "ns2", false);
        let lines = project(&rows(), &[Column::CinderId], &filter);

        assert_eq!(ids(&lines), vec!["v2", "v3", "v4"]);
    }

    #[test]
    fn test_inapplicable_column_is_placeholder() {
        let lines = project(&rows(), &[Column::CinderId, Column::ServerName], &RowFilter::default());
        assert_eq!(lines[0], vec!["v1".to_string(), "-".to_string()]);
    }
}
