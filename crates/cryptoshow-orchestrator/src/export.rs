//! PyMOL selection export.

use crate::pockets::pocket_residues;
use cryptoshow_core::api::Pocket;

/// Builds a PyMOL `select` command for a pocket.
///
/// Residues are grouped by chain, chains in order of first appearance:
/// `select s, 2rfc and ( (chain A and resi 1+2) or (chain B and resi 7) )`.
pub fn pymol_selection(structure_name: &str, pocket: &Pocket) -> String {
    let mut chains: Vec<(String, Vec<String>)> = Vec::new();
    for residue in pocket_residues(pocket) {
        let number = residue.number.to_string();
        match chains.iter_mut().find(|(chain, _)| *chain == residue.chain) {
            Some((_, numbers)) => numbers.push(number),
            None => chains.push((residue.chain, vec![number])),
        }
    }

    let clauses: Vec<String> = chains
        .iter()
        .map(|(chain, numbers)| format!("(chain {} and resi {})", chain, numbers.join("+")))
        .collect();

    format!("select s, {} and ( {} )", structure_name, clauses.join(" or "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chains_in_first_appearance_order() {
        let pocket = Pocket {
            pocket_id: 1,
            residue_ids: ["B_7", "A_1", "B_9", "A_2"].iter().map(|s| s.to_string()).collect(),
            ..Pocket::default()
        };
        assert_eq!(
            pymol_selection("2rfc", &pocket),
            "select s, 2rfc and ( (chain B and resi 7+9) or (chain A and resi 1+2) )"
        );
    }

    #[test]
    fn test_single_chain() {
        let pocket = Pocket {
            pocket_id: 0,
            residue_ids: vec!["A_1".to_string(), "A_2".to_string()],
            ..Pocket::default()
        };
        assert_eq!(pymol_selection("x", &pocket), "select s, x and ( (chain A and resi 1+2) )");
    }
}
