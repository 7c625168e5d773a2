//! GICS sector / industry taxonomy loaded from `gics.json`.

use crate::constants::GICS_FILE_NAME;
use crate::error::{Error, Result};
use crate::models::{
    GicsEntry, GicsFilter, GicsRecord, IndustryGroupNode, IndustryNode, SectorNode, SubIndustryNode,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub type SharedTaxonomyStore = Arc<TaxonomyStore>;

pub struct TaxonomyStore {
    path: PathBuf,
    records: RwLock<Option<Arc<Vec<GicsRecord>>>>,
}

impl TaxonomyStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            path: data_dir.join(GICS_FILE_NAME),
            records: RwLock::new(None),
        }
    }

    async fn records(&self) -> Result<Arc<Vec<GicsRecord>>> {
        if let Some(records) = self.records.read().await.as_ref() {
            return Ok(records.clone());
        }

        let mut slot = self.records.write().await;
        if let Some(records) = slot.as_ref() {
            return Ok(records.clone());
        }

        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!(
                    "GICS data not available ({} missing)",
                    self.path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let records: Vec<GicsRecord> = serde_json::from_str(&raw)
            .map_err(|e| Error::Parse(format!("{}: {}", self.path.display(), e)))?;
        info!(records = records.len(), "Loaded GICS taxonomy");

        let records = Arc::new(records);
        *slot = Some(records.clone());
        Ok(records)
    }

    /// Sorted unique sector names
    pub async fn sectors(&self) -> Result<Vec<String>> {
        let records = self.records().await?;
        let sectors: BTreeSet<&str> = records.iter().map(|r| r.sector_name.as_str()).collect();
        Ok(sectors.into_iter().map(str::to_string).collect())
    }

    /// Sector → industry group → industry → sub-industry, sorted by name at
    /// every level
    pub async fn hierarchy(&self) -> Result<Vec<SectorNode>> {
        let records = self.records().await?;
        Ok(build_hierarchy(&records))
    }

    pub async fn industry_groups(&self, filter: &GicsFilter) -> Result<Vec<GicsEntry>> {
        let records = self.records().await?;
        Ok(flat_view(&records, filter, |r| GicsEntry {
            name: r.industry_group_name.clone(),
            code: r.industry_group_code.clone(),
            sector: r.sector_name.clone(),
            industry_group: None,
            industry: None,
        }))
    }

    pub async fn industries(&self, filter: &GicsFilter) -> Result<Vec<GicsEntry>> {
        let records = self.records().await?;
        Ok(flat_view(&records, filter, |r| GicsEntry {
            name: r.industry_name.clone(),
            code: r.industry_code.clone(),
            sector: r.sector_name.clone(),
            industry_group: Some(r.industry_group_name.clone()),
            industry: None,
        }))
    }

    pub async fn sub_industries(&self, filter: &GicsFilter) -> Result<Vec<GicsEntry>> {
        let records = self.records().await?;
        Ok(flat_view(&records, filter, |r| GicsEntry {
            name: r.sub_industry_name.clone(),
            code: r.sub_industry_code.clone(),
            sector: r.sector_name.clone(),
            industry_group: Some(r.industry_group_name.clone()),
            industry: Some(r.industry_name.clone()),
        }))
    }
}

/// Matching records projected through `project`, deduplicated and sorted
fn flat_view<F>(records: &[GicsRecord], filter: &GicsFilter, project: F) -> Vec<GicsEntry>
where
    F: Fn(&GicsRecord) -> GicsEntry,
{
    let entries: BTreeSet<GicsEntry> = records.iter().filter(|r| filter.matches(r)).map(project).collect();
    entries.into_iter().collect()
}

fn build_hierarchy(records: &[GicsRecord]) -> Vec<SectorNode> {
    type Industries<'a> = BTreeMap<&'a str, (Option<String>, Vec<SubIndustryNode>)>;
    type Groups<'a> = BTreeMap<&'a str, (Option<String>, Industries<'a>)>;

    let mut sectors: BTreeMap<&str, (Option<String>, Groups<'_>)> = BTreeMap::new();

    for r in records {
        let sector = sectors.entry(r.sector_name.as_str()).or_insert_with(|| (r.sector_code.clone(), BTreeMap::new()));
        let group = sector
            .1
            .entry(r.industry_group_name.as_str())
            .or_insert_with(|| (r.industry_group_code.clone(), BTreeMap::new()));
        let industry = group
            .1
            .entry(r.industry_name.as_str())
            .or_insert_with(|| (r.industry_code.clone(), Vec::new()));

        if !industry.1.iter().any(|s| s.name == r.sub_industry_name) {
            industry.1.push(SubIndustryNode {
                name: r.sub_industry_name.clone(),
                code: r.sub_industry_code.clone(),
                description: r.sub_industry_description.clone(),
            });
        }
    }

    sectors
        .into_iter()
        .map(|(name, (code, groups))| SectorNode {
            name: name.to_string(),
            code,
            industry_groups: groups
                .into_iter()
                .map(|(name, (code, industries))| IndustryGroupNode {
                    name: name.to_string(),
                    code,
                    industries: industries
                        .into_iter()
                        .map(|(name, (code, mut subs))| {
                            subs.sort_by(|a, b| a.name.cmp(&b.name));
                            IndustryNode {
                                name: name.to_string(),
                                code,
                                sub_industries: subs,
                            }
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}
