//! Wire types exchanged with the analysis backend and the AHoJ proxy.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Cluster value marking a residue outside every pocket.
pub const NO_POCKET: i64 = -1;

/// Result of a finished pocket analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Backend status text.
    #[serde(default)]
    pub status: String,
    /// Per-residue pocket probability.
    #[serde(default)]
    pub prediction: Vec<f64>,
    /// Per-residue pocket id, `-1` for no pocket.
    #[serde(default)]
    pub clusters: Vec<i64>,
    /// Predicted pockets.
    #[serde(default)]
    pub pockets: Vec<Pocket>,
    /// One-letter sequence, per residue.
    #[serde(default)]
    pub sequence: Vec<String>,
    /// Residue ids in `"{chain}_{resnum}"` form, aligned with `prediction`.
    #[serde(default)]
    pub residue_ids: Vec<String>,
    /// File name of the analyzed structure under `/file/{file_hash}/`.
    #[serde(default)]
    pub input_structure: String,
    /// The analysis task id.
    #[serde(default)]
    pub task_id: String,
    /// Content hash naming the server-side file directory.
    #[serde(default)]
    pub file_hash: String,
    /// PDB identifier, or `"custom"` for uploads.
    #[serde(default)]
    pub structure_name: String,
}

impl AnalysisResult {
    /// Structure name used for uploaded files.
    pub const CUSTOM_STRUCTURE: &'static str = "custom";

    /// Returns true if the analyzed structure was uploaded by the user.
    pub fn is_custom(&self) -> bool {
        self.structure_name == Self::CUSTOM_STRUCTURE
    }

    /// Finds a pocket by id.
    pub fn pocket(&self, pocket_id: u32) -> Option<&Pocket> {
        self.pockets.iter().find(|p| p.pocket_id == pocket_id)
    }

    /// Looks up the cluster and score of a residue id.
    ///
    /// Returns `None` if the residue is not part of the result or the
    /// arrays are shorter than `residue_ids`.
    pub fn residue_annotation(&self, residue_id: &str) -> Option<(i64, f64)> {
        let index = self.residue_ids.iter().position(|id| id == residue_id)?;
        let cluster = *self.clusters.get(index)?;
        let score = *self.prediction.get(index)?;
        Some((cluster, score))
    }
}

/// A predicted binding pocket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pocket {
    /// Pocket identifier.
    pub pocket_id: u32,
    /// Member residues in `"{chain}_{resnum}"` form.
    #[serde(default)]
    pub residue_ids: Vec<String>,
    /// Per-member pocket probability.
    #[serde(default)]
    pub prediction: Vec<f64>,
    /// Mean probability across members.
    #[serde(default)]
    pub average_prediction: f64,
}

/// How a comparison candidate relates to the query structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateKind {
    /// Ligand-free form.
    #[serde(rename = "APO")]
    Apo,
    /// Ligand-bound form.
    #[serde(rename = "HOLO")]
    Holo,
    /// AlphaFold model.
    #[serde(rename = "AlphaFold")]
    AlphaFold,
}

impl CandidateKind {
    /// Returns the display label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apo => "APO",
            Self::Holo => "HOLO",
            Self::AlphaFold => "AlphaFold",
        }
    }
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structure found by the comparison search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetadata {
    /// PDB identifier (or AlphaFold accession).
    #[serde(default)]
    pub pdb_id: String,
    /// File name on the AHoJ server.
    #[serde(default)]
    pub structure_file: String,
    /// Remote locator relative to the AHoJ proxy.
    #[serde(default)]
    pub structure_file_url: String,
    /// Chains of the candidate.
    #[serde(default)]
    pub chains: Vec<String>,
    /// Chains aligned to the query.
    #[serde(default)]
    pub target_chains: Vec<String>,
    /// RMSD to the query, when computed.
    #[serde(default)]
    pub rmsd: Option<f64>,
    /// Relative solvent-accessible surface, when computed.
    #[serde(default)]
    pub sasa: Option<f64>,
    /// Bound ligands.
    #[serde(default)]
    pub ligands: Vec<String>,
    /// UniProt accessions.
    #[serde(default)]
    pub uniprot_ids: Vec<String>,
    /// Set when flattening a [`ComparisonResult`].
    #[serde(default)]
    pub kind: Option<CandidateKind>,
}

impl CandidateMetadata {
    /// Two candidates are the same when id, file and chain sets match.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.pdb_id == other.pdb_id
            && self.structure_file == other.structure_file
            && self.chains == other.chains
            && self.target_chains == other.target_chains
    }
}

/// One query block of an AHoJ response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonQuery {
    /// Apo candidates.
    #[serde(default)]
    pub found_apo: Vec<CandidateMetadata>,
    /// Holo candidates.
    #[serde(default)]
    pub found_holo: Vec<CandidateMetadata>,
    /// AlphaFold candidates.
    #[serde(default)]
    pub found_alphafold: Vec<CandidateMetadata>,
}

/// AHoJ job status response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// True once the search has finished.
    #[serde(default)]
    pub done: bool,
    /// Per-query results; sessions submit a single query.
    #[serde(default)]
    pub queries: Vec<ComparisonQuery>,
}

impl ComparisonResult {
    /// Flattens the first query's candidates: holo, then apo, then AlphaFold.
    pub fn candidates(&self) -> Vec<CandidateMetadata> {
        let Some(query) = self.queries.first() else {
            return Vec::new();
        };

        let tagged = |list: &[CandidateMetadata], kind: CandidateKind| {
            list.iter()
                .cloned()
                .map(move |mut c| {
                    c.kind = Some(kind);
                    c
                })
                .collect::<Vec<_>>()
        };

        let mut all = tagged(&query.found_holo, CandidateKind::Holo);
        all.extend(tagged(&query.found_apo, CandidateKind::Apo));
        all.extend(tagged(&query.found_alphafold, CandidateKind::AlphaFold));
        all
    }
}

/// Column a candidate table is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSortField {
    /// Identifier, lexicographic.
    PdbId,
    /// Kind label, lexicographic.
    Kind,
    /// RMSD, missing values last.
    Rmsd,
    /// SASA, missing values last.
    Sasa,
    /// Comma-joined chains, lexicographic.
    Chains,
    /// Comma-joined ligands, lexicographic.
    Ligands,
}

impl FromStr for CandidateSortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdb_id" | "pdb" | "id" => Ok(Self::PdbId),
            "kind" | "type" => Ok(Self::Kind),
            "rmsd" => Ok(Self::Rmsd),
            "sasa" => Ok(Self::Sasa),
            "chains" => Ok(Self::Chains),
            "ligands" => Ok(Self::Ligands),
            other => Err(format!("unknown sort field: {}", other)),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// Sorts candidates in place. The sort is stable.
pub fn sort_candidates(
    candidates: &mut [CandidateMetadata],
    field: CandidateSortField,
    direction: SortDirection,
) {
    let number = |value: Option<f64>| value.unwrap_or(f64::MAX);
    let kind = |c: &CandidateMetadata| c.kind.map(|k| k.as_str()).unwrap_or_default();

    candidates.sort_by(|a, b| {
        let ordering = match field {
            CandidateSortField::PdbId => a.pdb_id.cmp(&b.pdb_id),
            CandidateSortField::Kind => kind(a).cmp(kind(b)),
            CandidateSortField::Rmsd => {
                number(a.rmsd).partial_cmp(&number(b.rmsd)).unwrap_or(Ordering::Equal)
            }
            CandidateSortField::Sasa => {
                number(a.sasa).partial_cmp(&number(b.sasa)).unwrap_or(Ordering::Equal)
            }
            CandidateSortField::Chains => a.chains.join(",").cmp(&b.chains.join(",")),
            CandidateSortField::Ligands => a.ligands.join(",").cmp(&b.ligands.join(",")),
        };
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

/// Payload of a finished trajectory (animation) job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationResult {
    /// Candidate structure trimmed to the aligned chains.
    pub trimmed_pdb: String,
    /// Interpolated coordinate trajectory.
    pub trajectory: String,
}

/// Status text carried by PENDING/PROGRESS messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Human-readable progress text.
    #[serde(default)]
    pub status: String,
}

/// A job the session can submit.
#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    /// Analyze a structure by PDB identifier.
    AnalyzePdb {
        /// PDB identifier (e.g. "2RFC").
        pdb_id: String,
    },
    /// Analyze an uploaded structure file.
    AnalyzeUpload {
        /// File name sent with the multipart part.
        file_name: String,
        /// File contents.
        contents: Vec<u8>,
    },
    /// Start an AHoJ comparison search.
    Compare {
        /// Hash of the analyzed structure; needed to poll the job.
        file_hash: String,
        /// AHoJ job configuration document.
        configuration: serde_json::Value,
    },
    /// Build a morphing trajectory toward a candidate.
    Animate {
        /// Hash of the analyzed structure.
        file_hash: String,
        /// Candidate file name on the AHoJ server.
        structure_file: String,
        /// Chains to align.
        target_chains: Vec<String>,
    },
}

impl JobRequest {
    /// The kind of job this request creates.
    pub fn kind(&self) -> crate::job::JobKind {
        use crate::job::JobKind;
        match self {
            Self::AnalyzePdb { .. } | Self::AnalyzeUpload { .. } => JobKind::Analysis,
            Self::Compare { .. } => JobKind::Comparison,
            Self::Animate { .. } => JobKind::Animation,
        }
    }
}
