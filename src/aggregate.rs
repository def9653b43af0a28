// Turn raw container rows into the ordered service list shown on the dashboard.

use std::collections::{HashMap, HashSet};

use crate::models::{ContainerRow, ServiceRecord, StatsRow};
use crate::parse::extract_host_port;

pub const DEFAULT_CATEGORY: &str = "Other";

/// Static per-name metadata. Keys are lowercased; lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    pub network: String,
    pub exclude: HashSet<String>,
    pub categories: HashMap<String, String>,
    pub default_ports: HashMap<String, u16>,
}

impl ServiceCatalog {
    pub fn category_for(&self, name: &str) -> &str {
        self.categories
            .get(&name.to_lowercase())
            .map(String::as_str)
            .unwrap_or(DEFAULT_CATEGORY)
    }

    pub fn default_port(&self, name: &str) -> Option<u16> {
        self.default_ports.get(&name.to_lowercase()).copied()
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude.contains(&name.to_lowercase())
    }

    /// On the dashboard network and not one of the dashboard's own components.
    pub fn is_visible(&self, row: &ContainerRow) -> bool {
        row.on_network(&self.network) && !self.is_excluded(&row.name)
    }
}

pub fn select_services<'a>(
    rows: &'a [ContainerRow],
    catalog: &ServiceCatalog,
) -> impl Iterator<Item = &'a ContainerRow> {
    rows.iter().filter(|r| catalog.is_visible(r))
}

/// Published host port while running, otherwise the well-known default for the name.
pub fn resolve_port(row: &ContainerRow, catalog: &ServiceCatalog) -> Option<u16> {
    if row.state().is_running()
        && let Some(port) = extract_host_port(&row.ports_text)
    {
        return Some(port);
    }
    catalog.default_port(&row.name)
}

/// Ids of the visible containers that are running, i.e. the ones worth a stats query.
pub fn running_ids(rows: &[ContainerRow], catalog: &ServiceCatalog) -> Vec<String> {
    select_services(rows, catalog)
        .filter(|r| r.state().is_running())
        .map(|r| r.id.clone())
        .collect()
}

pub fn build_service_records(
    rows: &[ContainerRow],
    stats: &[StatsRow],
    catalog: &ServiceCatalog,
) -> Vec<ServiceRecord> {
    let mut records: Vec<ServiceRecord> = select_services(rows, catalog)
        .map(|row| {
            let status = row.state();
            let stats = status
                .is_running()
                .then(|| stats.iter().find(|s| s.matches(&row.id)))
                .flatten()
                .map(|s| s.stats);
            ServiceRecord {
                id: row.id.clone(),
                name: row.name.clone(),
                status,
                image: row.image.clone(),
                category: catalog.category_for(&row.name).to_string(),
                port: resolve_port(row, catalog),
                stats,
            }
        })
        .collect();
    records.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
    records
}
