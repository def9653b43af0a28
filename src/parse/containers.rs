// Container listing and stats rows.

use super::{ParseError, Parsed, parse_lines, require_fields};
use crate::models::{ContainerRow, ResourceStats, StatsRow};
use crate::probe::FIELD_SEP;

const LIST_FIELDS: usize = 6;
const STATS_FIELDS: usize = 3;

/// `id|name|status|image|ports|networks`. Extra separators end up in the last field.
pub fn parse_container_rows(raw: &str) -> Parsed<ContainerRow> {
    parse_lines(raw, |line_no, line| {
        let f = require_fields(
            line_no,
            line.splitn(LIST_FIELDS, FIELD_SEP).collect(),
            LIST_FIELDS,
        )?;
        let id = f[0].trim();
        let name = f[1].trim();
        if id.is_empty() {
            return Err(ParseError::InvalidField {
                line: line_no,
                field: "id",
                value: f[0].to_string(),
            });
        }
        if name.is_empty() {
            return Err(ParseError::InvalidField {
                line: line_no,
                field: "name",
                value: f[1].to_string(),
            });
        }
        Ok(ContainerRow {
            id: id.to_string(),
            name: name.to_string(),
            status_text: f[2].trim().to_string(),
            image: f[3].trim().to_string(),
            ports_text: f[4].trim().to_string(),
            networks_text: f[5].trim().to_string(),
        })
    })
}

/// `id|cpu%|mem%`. Unparseable percentages become `None` rather than rejecting the line.
pub fn parse_stats_rows(raw: &str) -> Parsed<StatsRow> {
    parse_lines(raw, |line_no, line| {
        let f = require_fields(
            line_no,
            line.splitn(STATS_FIELDS, FIELD_SEP).collect(),
            STATS_FIELDS,
        )?;
        let id = f[0].trim();
        if id.is_empty() {
            return Err(ParseError::InvalidField {
                line: line_no,
                field: "id",
                value: f[0].to_string(),
            });
        }
        Ok(StatsRow {
            id_prefix: id.to_string(),
            stats: ResourceStats {
                cpu_percent: parse_percent(f[1]),
                memory_percent: parse_percent(f[2]),
            },
        })
    })
}

/// "12.5%" -> 12.5. Anything non-numeric ("--", "", "N/A") is absent.
pub fn parse_percent(s: &str) -> Option<f64> {
    let s = s.trim();
    let s = s.strip_suffix('%').unwrap_or(s).trim();
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Host port of the first mapping in "0.0.0.0:8080->8080/tcp, :::8080->8080/tcp".
pub fn extract_host_port(ports_text: &str) -> Option<u16> {
    let first = ports_text.split(',').next()?.trim();
    let (host_side, _) = first.split_once("->")?;
    let port = host_side.trim().rsplit(':').next()?;
    port.parse::<u16>().ok().filter(|p| *p > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceState;

    const LISTING: &str = "\
a1b2c3d4e5f6|ollama|Up 2 hours|ollama/ollama:latest|0.0.0.0:11434->11434/tcp|ai-network
deadbeef0000|broken-line|Up 3 hours
0f0f0f0f0f0f|chromadb|Exited (0) 3 days ago|chromadb/chroma||ai-network,bridge
";

    #[test]
    fn malformed_line_does_not_affect_neighbours() {
        let parsed = parse_container_rows(LISTING);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(
            parsed.rejected[0],
            ParseError::FieldCount {
                line: 2,
                expected: 6,
                found: 3
            }
        );
        assert_eq!(parsed.records[0].name, "ollama");
        assert_eq!(parsed.records[0].state(), ServiceState::Running);
        assert_eq!(parsed.records[1].name, "chromadb");
        assert_eq!(parsed.records[1].state(), ServiceState::Stopped);
        assert!(parsed.records[1].on_network("bridge"));
    }

    #[test]
    fn empty_port_and_network_fields_are_kept() {
        let parsed = parse_container_rows("abc|n8n|Created|n8nio/n8n||");
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].ports_text, "");
        assert!(!parsed.records[0].on_network("ai-network"));
    }

    #[test]
    fn blank_id_is_rejected() {
        let parsed = parse_container_rows(" |name|Up|img||ai-network");
        assert!(parsed.records.is_empty());
        assert!(matches!(
            parsed.rejected[0],
            ParseError::InvalidField { field: "id", .. }
        ));
    }

    #[test]
    fn stats_rows_strip_percent_and_mark_missing_values_absent() {
        let parsed = parse_stats_rows("a1b2c3d4e5f6|12.50%|3.1%\nbbbb|--|0.00%\nshort");
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.records[0].stats.cpu_percent, Some(12.5));
        assert_eq!(parsed.records[0].stats.memory_percent, Some(3.1));
        assert_eq!(parsed.records[1].stats.cpu_percent, None);
        assert_eq!(parsed.records[1].stats.memory_percent, Some(0.0));
    }

    #[test]
    fn parse_percent_cases() {
        assert_eq!(parse_percent("145.02%"), Some(145.02));
        assert_eq!(parse_percent(" 7 "), Some(7.0));
        assert_eq!(parse_percent(""), None);
        assert_eq!(parse_percent("%"), None);
        assert_eq!(parse_percent("NaN%"), None);
    }

    #[test]
    fn extract_host_port_takes_host_side_of_first_mapping() {
        assert_eq!(extract_host_port("0.0.0.0:8080->8080/tcp"), Some(8080));
        assert_eq!(
            extract_host_port("0.0.0.0:7860->7860/tcp, :::7861->7860/tcp"),
            Some(7860)
        );
        assert_eq!(extract_host_port(":::9000->9000/tcp"), Some(9000));
    }

    #[test]
    fn extract_host_port_without_mapping_is_absent() {
        assert_eq!(extract_host_port(""), None);
        assert_eq!(extract_host_port("8080/tcp"), None);
        assert_eq!(extract_host_port("0.0.0.0:abc->80/tcp"), None);
    }
}
