//! Comparison search query building.

use crate::error::{Result, SessionError};
use crate::pockets::pocket_residues;
use cryptoshow_abstraction::{Engine, NodeRef, Point3, ResidueInfo};
use cryptoshow_core::api::Pocket;
use cryptoshow_core::{AnalysisResult, ComparisonResult};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// A finished comparison search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// AHoJ job id, needed to fetch the result again.
    pub job_id: String,
    /// The search result.
    pub result: ComparisonResult,
}

/// Returns true if the result can be compared. Uploads cannot.
pub fn comparison_available(result: &AnalysisResult) -> bool {
    !result.is_custom()
}

/// Builds the search query for a pocket.
///
/// The query names the pocket residue nearest to the centroid of all pocket
/// residue positions: `"{structure_id} {chain} {residue_name} {number}"`.
///
/// # Errors
/// `Query` if no pocket residue resolves in the structure.
pub fn pocket_query(
    engine: &dyn Engine,
    structure: &NodeRef,
    pocket: &Pocket,
    structure_id: &str,
) -> Result<String> {
    let residues: Vec<ResidueInfo> = pocket_residues(pocket)
        .iter()
        .filter_map(|key| {
            let info = engine.residue_info(structure, key);
            if info.is_none() {
                warn!(pocket_id = pocket.pocket_id, residue = %key, "Residue not found in structure");
            }
            info
        })
        .collect();

    let nearest = nearest_to_centroid(&residues).ok_or_else(|| {
        SessionError::Query(format!("pocket {} has no resolvable residues", pocket.pocket_id))
    })?;

    let query =
        format!("{} {} {} {}", structure_id, nearest.key.chain, nearest.name, nearest.key.number);
    debug!(pocket_id = pocket.pocket_id, query = %query, "Comparison query built");
    Ok(query)
}

fn nearest_to_centroid(residues: &[ResidueInfo]) -> Option<&ResidueInfo> {
    if residues.is_empty() {
        return None;
    }

    let n = residues.len() as f64;
    let sum = residues.iter().fold(Point3::new(0.0, 0.0, 0.0), |acc, r| {
        Point3::new(acc.x + r.position.x, acc.y + r.position.y, acc.z + r.position.z)
    });
    let centroid = Point3::new(sum.x / n, sum.y / n, sum.z / n);

    residues.iter().min_by(|a, b| {
        a.position.distance(&centroid).total_cmp(&b.position.distance(&centroid))
    })
}

/// The search job document for a query.
pub fn job_configuration(query: &str) -> Value {
    json!({
        "job_name": format!("CryptoShow {}", query),
        "queries": query,
        "options": {},
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptoshow_abstraction::ResidueKey;

    fn residue(chain: &str, number: i32, name: &str, x: f64) -> ResidueInfo {
        ResidueInfo {
            key: ResidueKey::new(chain, number),
            name: name.to_string(),
            position: Point3::new(x, 0.0, 0.0),
        }
    }

    #[test]
    fn test_nearest_to_centroid() {
        let residues = vec![
            residue("A", 1, "GLY", 0.0),
            residue("A", 2, "LEU", 4.0),
            residue("A", 3, "SER", 11.0),
        ];
        // Centroid x = 5.0
        assert_eq!(nearest_to_centroid(&residues).map(|r| r.key.number), Some(2));
        assert!(nearest_to_centroid(&[]).is_none());
    }

    #[test]
    fn test_job_configuration() {
        let config = job_configuration("2rfc A LEU 42");
        assert_eq!(config["job_name"], "CryptoShow 2rfc A LEU 42");
        assert_eq!(config["queries"], "2rfc A LEU 42");
        assert!(config["options"].as_object().is_some_and(|o| o.is_empty()));
    }

    #[test]
    fn test_comparison_unavailable_for_uploads() {
        let upload = AnalysisResult {
            structure_name: AnalysisResult::CUSTOM_STRUCTURE.to_string(),
            ..AnalysisResult::default()
        };
        assert!(!comparison_available(&upload));

        let pdb = AnalysisResult { structure_name: "2rfc".to_string(), ..AnalysisResult::default() };
        assert!(comparison_available(&pdb));
    }
}
