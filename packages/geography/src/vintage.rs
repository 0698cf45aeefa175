//! Reconciles Connecticut county identifiers between a source table and
//! the crosswalk.
//!
//! The crosswalk decides the target scheme. Source rows keyed in the
//! other scheme are replaced by rows keyed in the crosswalk's scheme,
//! each copying its primary counterpart's values.

use std::collections::BTreeMap;

use tribal_risk_geography_models::vintage::CountyVintage;

/// Rewrites the Connecticut rows of `rows` into `target`'s numbering.
///
/// Does nothing when the table's scheme cannot be determined or already
/// matches. Returns the number of rows written in the target scheme.
pub fn reconcile<R: Clone>(rows: &mut BTreeMap<String, R>, target: Option<CountyVintage>) -> usize {
    let Some(target) = target else {
        return 0;
    };
    let Some(source) = CountyVintage::detect(rows.keys().map(String::as_str)) else {
        return 0;
    };
    if source == target {
        return 0;
    }

    let mut remapped = 0usize;
    for (code, counterpart) in target.table() {
        if let Some(row) = rows.get(*counterpart).cloned() {
            rows.insert((*code).to_string(), row);
            remapped += 1;
        }
    }
    for (code, _) in source.table() {
        rows.remove(*code);
    }

    log::info!(
        "Reconciled Connecticut county vintage: {source:?} -> {target:?} ({remapped} rows)"
    );
    remapped
}
