//! Channel to marker mapping reconstruction.

use super::text::Metadata;
use crate::error::{AppResult, CytoError};
use serde::{Deserialize, Serialize};

/// One acquisition channel and the reagent conjugated to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelMapping {
    /// Detector name (`$PnN`), underscores replaced by hyphens.
    pub channel: String,
    /// Marker name (`$PnS`), underscores replaced by hyphens, empty when absent.
    pub marker: String,
}

impl ChannelMapping {
    /// Build a mapping, normalizing separator characters.
    pub fn new(channel: &str, marker: &str) -> Self {
        Self {
            channel: normalize_label(channel),
            marker: normalize_label(marker),
        }
    }

    /// Column name used by the tabular view.
    pub fn column_name(&self) -> String {
        format!("{}_{}", self.channel, self.marker)
    }
}

/// Replace underscores with hyphens so channel names are stable across instruments.
pub fn normalize_label(label: &str) -> String {
    label.replace('_', "-")
}

/// Extract mappings for parameters `1..=parameters`, in parameter order.
///
/// The order is the event matrix column order; every downstream channel index relies on it.
pub fn fluoro_mappings(metadata: &Metadata, parameters: usize) -> AppResult<Vec<ChannelMapping>> {
    (1..=parameters)
        .map(|n| {
            let channel = metadata.get(&format!("p{n}n")).ok_or_else(|| {
                CytoError::Parse(format!("parameter {n} has no $P{n}N name"))
            })?;
            let marker = metadata.get(&format!("p{n}s")).unwrap_or("");
            Ok(ChannelMapping::new(channel, marker))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fcs::text::parse_text;

    #[test]
    fn normalizes_and_orders_mappings() {
        let meta = parse_text(b"|$P2N|FL1_A|$P1N|FSC_A|$P2S|CD3_FITC|").unwrap();
        let mappings = fluoro_mappings(&meta, 2).unwrap();
        assert_eq!(
            mappings,
            vec![
                ChannelMapping::new("FSC-A", ""),
                ChannelMapping::new("FL1-A", "CD3-FITC"),
            ]
        );
        assert_eq!(mappings[1].column_name(), "FL1-A_CD3-FITC");
        assert_eq!(mappings[0].column_name(), "FSC-A_");
    }

    #[test]
    fn missing_name_fails() {
        let meta = parse_text(b"|$P1N|FSC-A|").unwrap();
        assert!(fluoro_mappings(&meta, 2).is_err());
    }
}
