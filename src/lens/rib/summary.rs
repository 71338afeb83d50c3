//! Origin AS summary report

use super::aggregate::Aggregator;
use super::path::AddressFamily;
use super::resolve::AsnResolver;
use crate::lens::utils::{to_psv, truncate_name, OutputFormat, DEFAULT_NAME_MAX_LEN};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::BTreeSet;

/// One origin AS of a family
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub asn: u32,
    pub name: String,
    pub prefixes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilySummary {
    pub family: AddressFamily,
    /// Rows by descending prefix count, then ascending ASN
    pub rows: Vec<SummaryRow>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryReport {
    pub families: Vec<FamilySummary>,
    /// Paths counted across all families
    pub total_prefixes: u64,
    /// Distinct origin ASNs across all families
    pub total_asns: usize,
}

#[cfg_attr(feature = "display", derive(tabled::Tabled))]
struct DisplayRow {
    #[cfg_attr(feature = "display", tabled(rename = "ASN"))]
    asn: String,
    #[cfg_attr(feature = "display", tabled(rename = "AS name"))]
    name: String,
    #[cfg_attr(feature = "display", tabled(rename = "prefixes"))]
    prefixes: u64,
}

/// Builds and renders [`SummaryReport`]s
#[derive(Debug, Clone)]
pub struct SummaryReporter {
    name_width: usize,
}

impl Default for SummaryReporter {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_MAX_LEN)
    }
}

impl SummaryReporter {
    /// Reporter truncating AS names to `name_width` characters in text output
    pub fn new(name_width: usize) -> Self {
        Self { name_width }
    }

    /// Resolve names and order the tallies of `aggregator`
    pub fn build(&self, aggregator: &Aggregator, resolver: &mut AsnResolver) -> SummaryReport {
        let mut families = Vec::new();
        let mut all_asns = BTreeSet::new();

        for family in aggregator.families() {
            let mut rows = Vec::new();
            for (key, count) in aggregator.counts(family).into_iter().flatten() {
                // keys are produced from u32 values, so this never skips in practice
                let Ok(asn) = key.parse::<u32>() else {
                    continue;
                };
                all_asns.insert(asn);
                rows.push(SummaryRow {
                    asn,
                    name: resolver.resolve(asn),
                    prefixes: *count,
                });
            }
            rows.sort_by(|a, b| b.prefixes.cmp(&a.prefixes).then(a.asn.cmp(&b.asn)));

            families.push(FamilySummary {
                family,
                rows,
                total: aggregator.total(family),
            });
        }

        SummaryReport {
            families,
            total_prefixes: aggregator.grand_total(),
            total_asns: all_asns.len(),
        }
    }

    /// Render a report in the requested format
    pub fn render(&self, report: &SummaryReport, format: OutputFormat) -> Result<String> {
        if format.is_json() {
            return format
                .to_json(report)
                .map_err(|e| anyhow!("Failed to serialize summary: {}", e));
        }

        let mut sections = Vec::new();
        for family in &report.families {
            let rows = self.display_rows(family);
            let body = match format {
                OutputFormat::Psv => to_psv(
                    &["asn", "name", "prefixes"],
                    rows.into_iter()
                        .map(|r| vec![r.asn, r.name, r.prefixes.to_string()]),
                ),
                _ => render_table(rows, format),
            };
            sections.push(format!("{}\n{}", family.family, body));
        }

        sections.push(format!(
            "total: {} prefixes from {} origin ASNs",
            report.total_prefixes, report.total_asns
        ));
        Ok(sections.join("\n\n"))
    }

    fn display_rows(&self, family: &FamilySummary) -> Vec<DisplayRow> {
        let mut rows: Vec<DisplayRow> = family
            .rows
            .iter()
            .map(|row| DisplayRow {
                asn: row.asn.to_string(),
                name: truncate_name(&row.name, self.name_width),
                prefixes: row.prefixes,
            })
            .collect();
        rows.push(DisplayRow {
            asn: "total".to_string(),
            name: String::new(),
            prefixes: family.total,
        });
        rows
    }
}

#[cfg(feature = "display")]
fn render_table(rows: Vec<DisplayRow>, format: OutputFormat) -> String {
    use tabled::settings::Style;
    use tabled::Table;

    let mut table = Table::new(rows);
    match format {
        OutputFormat::Markdown => table.with(Style::markdown()),
        _ => table.with(Style::rounded()),
    };
    table.to_string()
}

#[cfg(not(feature = "display"))]
fn render_table(rows: Vec<DisplayRow>, _format: OutputFormat) -> String {
    rows.into_iter()
        .map(|r| format!("{:>10}  {:<30}  {}", r.asn, r.name, r.prefixes))
        .collect::<Vec<_>>()
        .join("\n")
}
