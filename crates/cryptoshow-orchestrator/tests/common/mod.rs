//! Shared fixtures for orchestrator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cryptoshow_abstraction::{Point3, ResidueInfo, ResidueKey};
use cryptoshow_core::api::Pocket;
use cryptoshow_core::{
    AnalysisResult, Backend, CandidateMetadata, ChannelError, ChannelResult, Job, JobChannel,
    JobKind, JobRequest, ScriptedSource, SubmitError, SubmitResult,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A backend serving scripted status channels per job kind.
#[derive(Default)]
pub struct MockBackend {
    scripts: Mutex<HashMap<JobKind, VecDeque<ScriptedSource>>>,
    submissions: Mutex<Vec<JobRequest>>,
    primes: Mutex<Vec<(String, String)>>,
    rejection: Mutex<Option<String>>,
    counter: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the channel served for the next job of `kind`.
    pub fn script(&self, kind: JobKind, source: ScriptedSource) {
        self.scripts.lock().unwrap().entry(kind).or_default().push_back(source);
    }

    /// Makes every submission fail with `error`.
    pub fn reject_with(&self, error: &str) {
        *self.rejection.lock().unwrap() = Some(error.to_string());
    }

    pub fn submissions(&self) -> Vec<JobRequest> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn primes(&self) -> Vec<(String, String)> {
        self.primes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn submit(&self, request: &JobRequest) -> SubmitResult<Job> {
        self.submissions.lock().unwrap().push(request.clone());
        if let Some(error) = self.rejection.lock().unwrap().clone() {
            return Err(SubmitError::Rejected(error));
        }
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(Job::new(format!("job-{}", id), request.kind()))
    }

    fn open_channel(&self, job: &Job) -> ChannelResult<JobChannel> {
        let source = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&job.kind)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| ChannelError::Transport(format!("no script for {}", job.kind)))?;
        Ok(JobChannel::open(job, Box::new(source)))
    }

    async fn prime_proxy(&self, file_hash: &str, remote_locator: &str) -> cryptoshow_core::Result<()> {
        self.primes.lock().unwrap().push((file_hash.to_string(), remote_locator.to_string()));
        Ok(())
    }

    fn file_url(&self, file_hash: &str, file_name: &str) -> String {
        format!("/file/{}/{}", file_hash, file_name)
    }
}

pub fn pocket(pocket_id: u32, residues: &[&str]) -> Pocket {
    Pocket {
        pocket_id,
        residue_ids: residues.iter().map(|r| r.to_string()).collect(),
        prediction: vec![0.8; residues.len()],
        average_prediction: 0.8,
    }
}

/// The analysis result of 2RFC: pocket 1 spans A_1..A_3, pocket 2 is A_4.
pub fn analysis_2rfc() -> AnalysisResult {
    AnalysisResult {
        status: "success".to_string(),
        residue_ids: ["A_1", "A_2", "A_3", "A_4"].iter().map(|r| r.to_string()).collect(),
        prediction: vec![0.9, 0.8, 0.1, 0.7],
        clusters: vec![1, 1, -1, 2],
        pockets: vec![pocket(1, &["A_1", "A_2", "A_3"]), pocket(2, &["A_4"])],
        input_structure: "2RFC.cif".to_string(),
        task_id: "task-2rfc".to_string(),
        file_hash: "abc123".to_string(),
        structure_name: "2rfc".to_string(),
        ..AnalysisResult::default()
    }
}

/// Residue table matching [`analysis_2rfc`], laid out along the x axis.
pub fn residues_2rfc() -> Vec<ResidueInfo> {
    [("GLY", 1, 0.0), ("LEU", 2, 1.0), ("SER", 3, 5.0), ("ALA", 4, 9.0)]
        .into_iter()
        .map(|(name, number, x)| ResidueInfo {
            key: ResidueKey::new("A", number),
            name: name.to_string(),
            position: Point3::new(x, 0.0, 0.0),
        })
        .collect()
}

pub fn candidate(pdb_id: &str, chains: &[&str]) -> CandidateMetadata {
    let chains: Vec<String> = chains.iter().map(|c| c.to_string()).collect();
    CandidateMetadata {
        pdb_id: pdb_id.to_string(),
        structure_file: format!("{}.cif", pdb_id),
        structure_file_url: format!("https://files.example/{}.cif", pdb_id),
        chains: chains.clone(),
        target_chains: chains,
        ..CandidateMetadata::default()
    }
}

/// Status frame text for a successful job.
pub fn success_frame(result: serde_json::Value) -> String {
    serde_json::json!({ "status": "SUCCESS", "result": result }).to_string()
}
