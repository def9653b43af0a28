// nvidia-smi / nvcc output.

use super::{ParseError, Parsed, parse_lines, require_fields};
use crate::models::GpuRecord;

const GPU_FIELDS: usize = 9;
const DRIVER_FIELDS: usize = 2;

/// `index, name, temperature, gpu_util, mem_util, mem_used, mem_total, power_draw, power_limit`.
/// Readings such as "[N/A]" become `None`; a bad index rejects the row.
pub fn parse_gpu_rows(raw: &str) -> Parsed<GpuRecord> {
    parse_lines(raw, |line_no, line| {
        let f = require_fields(
            line_no,
            line.split(',').map(str::trim).collect(),
            GPU_FIELDS,
        )?;
        let index = f[0].parse::<u32>().map_err(|_| ParseError::InvalidField {
            line: line_no,
            field: "index",
            value: f[0].to_string(),
        })?;
        let mem_used_mib = reading(f[5]);
        let mem_total_mib = reading(f[6]);
        let mem_util = reading(f[4]).or_else(|| match (mem_used_mib, mem_total_mib) {
            (Some(used), Some(total)) if total > 0.0 => {
                Some((used / total * 1000.0).round() / 10.0)
            }
            _ => None,
        });
        Ok(GpuRecord {
            index,
            name: f[1].to_string(),
            temperature: reading(f[2]),
            gpu_util: reading(f[3]),
            mem_util,
            mem_used_mib,
            mem_total_mib,
            power_draw: reading(f[7]),
            power_limit: reading(f[8]),
        })
    })
}

/// `driver_version, name` per device.
pub fn parse_driver_rows(raw: &str) -> Parsed<(String, String)> {
    parse_lines(raw, |line_no, line| {
        let f = require_fields(
            line_no,
            line.splitn(DRIVER_FIELDS, ',').map(str::trim).collect(),
            DRIVER_FIELDS,
        )?;
        if f[0].is_empty() {
            return Err(ParseError::InvalidField {
                line: line_no,
                field: "driver_version",
                value: f[0].to_string(),
            });
        }
        Ok((f[0].to_string(), f[1].to_string()))
    })
}

/// "CUDA Version: 12.2" from the nvidia-smi banner.
pub fn parse_cuda_driver(banner: &str) -> Option<String> {
    token_after(banner, "CUDA Version:")
}

/// "release 12.2" from `nvcc --version`.
pub fn parse_cuda_toolkit(banner: &str) -> Option<String> {
    token_after(banner, "release ")
}

fn token_after(text: &str, marker: &str) -> Option<String> {
    let (_, rest) = text.split_once(marker)?;
    let token = rest
        .split_whitespace()
        .next()?
        .trim_end_matches([',', '|']);
    (!token.is_empty()).then(|| token.to_string())
}

/// First token as a float; "[N/A]", "[Not Supported]" and friends are absent.
fn reading(s: &str) -> Option<f64> {
    let token = s.split_whitespace().next()?;
    if token.starts_with('[') {
        return None;
    }
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}
