use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use tabled::builder::Builder;
use tabled::settings::object::Columns;
use tabled::settings::{Padding, Style};

use crate::error::{Error, Result};

/// Output encodings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Whitespace aligned columns
    Raw,
    #[default]
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(OutputFormat::Raw),
            "markdown" => Ok(OutputFormat::Markdown),
            other => Err(Error::UnknownOutputFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Raw => f.write_str("raw"),
            OutputFormat::Markdown => f.write_str("markdown"),
        }
    }
}

/// Projected rows ready for rendering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Option<Vec<String>>,
    pub lines: Vec<Vec<String>>,
    /// Columns compared in order when sorting, column 0 breaks ties
    pub sort_indices: Vec<usize>,
    pub format: OutputFormat,
}

fn compare_lines(a: &[String], b: &[String], indices: &[usize]) -> Ordering {
    indices
        .iter()
        .chain(std::iter::once(&0))
        .map(|&i| a.get(i).cmp(&b.get(i)))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

impl Table {
    pub fn new(header: Option<Vec<String>>, lines: Vec<Vec<String>>, format: OutputFormat) -> Self {
        Self {
            header,
            lines,
            sort_indices: Vec::new(),
            format,
        }
    }

    pub fn sorted_by(mut self, indices: &[usize]) -> Self {
        self.sort_indices = indices.to_vec();
        self
    }

    /// Sort the lines and render them with the header
    pub fn render(mut self) -> String {
        let indices = std::mem::take(&mut self.sort_indices);
        self.lines.sort_by(|a, b| compare_lines(a, b, &indices));

        match self.format {
            OutputFormat::Raw => self.render_raw(),
            OutputFormat::Markdown => self.render_markdown(),
        }
    }

    fn records(&self) -> impl Iterator<Item = &Vec<String>> {
        self.header.iter().chain(self.lines.iter())
    }

    fn builder(&self) -> Builder {
        let mut builder = Builder::default();
        for record in self.records() {
            builder.push_record(record.iter().cloned());
        }
        builder
    }

    /// Blank style: the vertical separator plus one space of right padding
    /// leave two spaces between columns. Trailing fill of the last column is
    /// trimmed.
    fn render_raw(&self) -> String {
        if self.header.is_none() && self.lines.is_empty() {
            return String::new();
        }

        let mut table = self.builder().build();
        table
            .with(Style::blank())
            .with(Padding::new(0, 1, 0, 0))
            .modify(Columns::last(), Padding::zero());

        table
            .to_string()
            .lines()
            .map(|line| format!("{}\n", line.trim_end()))
            .collect()
    }

    fn render_markdown(&self) -> String {
        if self.header.is_none() && self.lines.is_empty() {
            return String::new();
        }

        let mut table = self.builder().build();
        if self.header.is_some() {
            table.with(Style::markdown());
        } else {
            table.with(Style::markdown().remove_horizontals());
        }
        format!("{table}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn sample(format: OutputFormat) -> Table {
        Table::new(
            Some(strings(&["CLUSTER", "PVC", "NOTE"])),
            vec![
                strings(&["prod-b", "ns/data", "-"]),
                strings(&["prod-a", "ns/logs", "nova != cinder server, multiple attachments"]),
                strings(&["prod-a", "kube-system/etcd", "-"]),
            ],
            format,
        )
        .sorted_by(&[0, 1])
    }

    #[test]
    fn test_raw_round_trip() {
        let table = sample(OutputFormat::Raw);
        let mut expected = vec![table.header.clone().unwrap()];
        let mut lines = table.lines.clone();
        lines.sort();
        expected.extend(lines);

        let rendered = table.render();
        let split: Vec<Vec<String>> = rendered
            .lines()
            .map(|line| {
                line.split("  ")
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .collect();

        assert_eq!(split, expected);
    }

    #[test]
    fn test_raw_columns_are_aligned() {
        let rendered = sample(OutputFormat::Raw).render();
        let offsets: Vec<_> = rendered
            .lines()
            .map(|l| {
                let gap = l.find("  ").unwrap();
                gap + l[gap..].find(|c: char| c != ' ').unwrap()
            })
            .collect();

        assert!(offsets.windows(2).all(|w| w[0] == w[1]), "{rendered}");
        assert!(rendered.lines().next().unwrap().starts_with("CLUSTER  "));
    }

    #[test]
    fn test_sort_skips_out_of_range_indices() {
        let rendered = Table::new(
            None,
            vec![strings(&["b"]), strings(&["a"])],
            OutputFormat::Raw,
        )
        .sorted_by(&[5])
        .render();

        assert_eq!(rendered, "a\nb\n");
    }

    #[test]
    fn test_raw_pads_to_widest_cell() {
        let rendered = Table::new(
            Some(strings(&["CLUSTER", "NODE_NAME", "IP"])),
            vec![strings(&["p1-dev", "node-a", "10.0.0.5"])],
            OutputFormat::Raw,
        )
        .render();

        assert_eq!(rendered, "CLUSTER  NODE_NAME  IP\np1-dev   node-a     10.0.0.5\n");
    }

    #[test]
    fn test_markdown_has_header_separator() {
        let rendered = sample(OutputFormat::Markdown).render();
        let lines: Vec<_> = rendered.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("CLUSTER"));
        assert!(lines[1].starts_with("|-"));
        assert!(lines[2].contains("kube-system/etcd"));
    }

    #[test]
    fn test_markdown_without_header() {
        let mut table = sample(OutputFormat::Markdown);
        table.header = None;
        let rendered = table.render();

        assert_eq!(rendered.lines().count(), 3);
        assert!(!rendered.contains("|-"));
    }

    #[test]
    fn test_unknown_output_format() {
        assert!(matches!(
            "json".parse::<OutputFormat>(),
            Err(Error::UnknownOutputFormat(f)) if f == "json"
        ));
        assert_eq!("raw".parse::<OutputFormat>().unwrap(), OutputFormat::Raw);
    }
}
