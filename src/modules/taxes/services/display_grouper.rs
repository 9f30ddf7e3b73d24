use std::collections::HashMap;

use crate::modules::taxes::models::{GroupedTaxLine, TaxComputationResult};

/// Collapses rules sharing a group name (e.g. CGST + SGST -> GST) into one
/// display line. The underlying lines stay on the computation result.
pub struct DisplayGrouper;

impl DisplayGrouper {
    pub fn new() -> Self {
        Self
    }

    /// A group takes the position of its first member; every other line keeps
    /// its relative order. Amounts are sums of already-rounded contributions.
    pub fn group(&self, result: &TaxComputationResult) -> Vec<GroupedTaxLine> {
        let mut grouped: Vec<GroupedTaxLine> = Vec::with_capacity(result.lines.len());
        let mut group_index: HashMap<&str, usize> = HashMap::new();

        for line in &result.lines {
            let Some(label) = line.group_name.as_deref().filter(|g| !g.trim().is_empty()) else {
                grouped.push(GroupedTaxLine {
                    label: line.name.clone(),
                    amount: line.amount,
                    member_rule_ids: vec![line.rule_id.clone()],
                });
                continue;
            };

            match group_index.get(label) {
                Some(&index) => {
                    let entry = &mut grouped[index];
                    entry.amount += line.amount;
                    entry.member_rule_ids.push(line.rule_id.clone());
                }
                None => {
                    group_index.insert(label, grouped.len());
                    grouped.push(GroupedTaxLine {
                        label: label.to_string(),
                        amount: line.amount,
                        member_rule_ids: vec![line.rule_id.clone()],
                    });
                }
            }
        }

        grouped
    }
}

impl Default for DisplayGrouper {
    fn default() -> Self {
        Self::new()
    }
}
