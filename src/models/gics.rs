use serde::{Deserialize, Serialize};

/// One row of the flat GICS file: a sub-industry with its ancestors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GicsRecord {
    #[serde(default)]
    pub sector_code: Option<String>,
    pub sector_name: String,
    #[serde(default)]
    pub industry_group_code: Option<String>,
    pub industry_group_name: String,
    #[serde(default)]
    pub industry_code: Option<String>,
    pub industry_name: String,
    #[serde(default)]
    pub sub_industry_code: Option<String>,
    pub sub_industry_name: String,
    #[serde(default)]
    pub sub_industry_description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectorNode {
    pub name: String,
    pub code: Option<String>,
    pub industry_groups: Vec<IndustryGroupNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndustryGroupNode {
    pub name: String,
    pub code: Option<String>,
    pub industries: Vec<IndustryNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndustryNode {
    pub name: String,
    pub code: Option<String>,
    pub sub_industries: Vec<SubIndustryNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubIndustryNode {
    pub name: String,
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Flat view entry: a taxonomy level with its parent names
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct GicsEntry {
    pub name: String,
    pub code: Option<String>,
    pub sector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

/// Optional ancestor filters for flat views
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GicsFilter {
    pub sector: Option<String>,
    pub industry_group: Option<String>,
    pub industry: Option<String>,
}

impl GicsFilter {
    pub fn matches(&self, record: &GicsRecord) -> bool {
        name_matches(&self.sector, &record.sector_name)
            && name_matches(&self.industry_group, &record.industry_group_name)
            && name_matches(&self.industry, &record.industry_name)
    }
}

fn name_matches(wanted: &Option<String>, actual: &str) -> bool {
    wanted
        .as_deref()
        .map_or(true, |w| w.trim().eq_ignore_ascii_case(actual.trim()))
}
