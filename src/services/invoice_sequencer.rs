use chrono::Utc;
use regex::Regex;
use tracing::{instrument, warn};

use crate::{
    config::InvoiceConfig,
    errors::ServiceError,
    models::Sale,
    store::{collections, TenantStore},
};

/// Invoice series: a namespace of identifiers sharing a prefix and a
/// zero-padded numeric suffix. Regular sales and old-battery sales are
/// numbered independently even though both live in the sales collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceSeries {
    Sale,
    OldBattery,
}

/// Produces the next invoice identifier for a series.
///
/// This is a read-then-write scan, not an atomic counter: concurrent callers
/// in the same series can race to the same number. Accepted for a
/// single-active-user deployment.
#[derive(Clone)]
pub struct InvoiceSequencer {
    store: TenantStore,
    config: InvoiceConfig,
    sale_pattern: Regex,
    old_battery_pattern: Regex,
}

impl InvoiceSequencer {
    pub fn new(store: TenantStore, config: InvoiceConfig) -> Self {
        let sale_pattern = series_pattern(&config.sale_prefix);
        let old_battery_pattern = series_pattern(&config.old_battery_prefix);
        Self {
            store,
            config,
            sale_pattern,
            old_battery_pattern,
        }
    }

    /// Next identifier in the series: max numeric suffix + 1, zero-padded.
    ///
    /// An empty series starts at 1. When documents exist but none carries a
    /// parseable numeric suffix, a timestamp-derived suffix guarantees
    /// forward progress even under corrupt data.
    #[instrument(skip(self))]
    pub async fn next(&self, series: InvoiceSeries) -> Result<String, ServiceError> {
        let (prefix, pattern) = match series {
            InvoiceSeries::Sale => (&self.config.sale_prefix, &self.sale_pattern),
            InvoiceSeries::OldBattery => {
                (&self.config.old_battery_prefix, &self.old_battery_pattern)
            }
        };

        let sales: Vec<Sale> = self.store.list_all(collections::SALES).await?;
        let in_series: Vec<&str> = sales
            .iter()
            .map(|s| s.invoice_number.as_str())
            .filter(|n| n.starts_with(prefix.as_str()))
            .collect();

        let max = in_series
            .iter()
            .filter_map(|n| pattern.captures(n))
            .filter_map(|c| c[1].parse::<u64>().ok())
            .max();

        match max {
            Some(current) => Ok(self.format(prefix, current + 1)),
            None if in_series.is_empty() => Ok(self.format(prefix, 1)),
            None => {
                // Identifiers exist but none parses; fall back to a
                // timestamp suffix so numbering keeps moving forward.
                warn!(prefix = %prefix, "no parseable invoice numbers in series, using timestamp suffix");
                Ok(format!("{}{}", prefix, Utc::now().timestamp_millis()))
            }
        }
    }

    fn format(&self, prefix: &str, number: u64) -> String {
        format!("{}{:0width$}", prefix, number, width = self.config.pad_width)
    }
}

fn series_pattern(prefix: &str) -> Regex {
    // Prefixes come from validated config; the pattern is always well formed.
    Regex::new(&format!(r"^{}(\d+)$", regex::escape(prefix)))
        .unwrap_or_else(|_| Regex::new(r"^$").unwrap())
}
