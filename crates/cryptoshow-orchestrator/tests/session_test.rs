//! Integration tests for the session facade.

mod common;

use common::{MockBackend, analysis_2rfc, residues_2rfc};
use cryptoshow_abstraction::{AtomLocus, ResidueKey, Style};
use cryptoshow_core::{
    AnalysisResult, ComparisonResult, JobKind, JobRequest, JobResult, ScriptedSource,
    SessionConfig, StatusUpdate,
};
use cryptoshow_core::api::ComparisonQuery;
use cryptoshow_engines::HeadlessEngine;
use cryptoshow_orchestrator::{POCKET_LABEL_PROVIDER, PocketSelection, Session, SessionError, SessionEvent};
use std::sync::Arc;

fn new_session(engine: &Arc<HeadlessEngine>, backend: &Arc<MockBackend>) -> Session {
    Session::new(engine.clone(), backend.clone(), &SessionConfig::default())
}

#[tokio::test]
async fn test_rejected_analysis_surfaces_backend_text() {
    let engine = Arc::new(HeadlessEngine::new());
    let backend = Arc::new(MockBackend::new());
    backend.reject_with("Invalid PDB ID");
    let session = new_session(&engine, &backend);
    let mut events = session.subscribe();

    let err = session
        .analyze(&JobRequest::AnalyzePdb { pdb_id: "XXXX".to_string() })
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "Invalid PDB ID");
    assert_eq!(events.recv().await.ok(), Some(SessionEvent::Error { message: "Invalid PDB ID".to_string() }));
    assert!(session.result().is_none());
    assert_eq!(engine.live_nodes(), 0);
}

#[tokio::test]
async fn test_analysis_channel_failure_is_unknown_error() {
    let engine = Arc::new(HeadlessEngine::new());
    let backend = Arc::new(MockBackend::new());
    backend.script(
        JobKind::Analysis,
        ScriptedSource::new(JobKind::Analysis).frame(r#"{"status":"PENDING"}"#).transport_error("reset"),
    );
    let session = new_session(&engine, &backend);

    let err = session
        .analyze(&JobRequest::AnalyzePdb { pdb_id: "2RFC".to_string() })
        .await
        .unwrap_err();

    assert!(err.user_message().starts_with("unknown error"));
    assert!(session.scene().structures().await.is_empty());
}

#[tokio::test]
async fn test_open_result_registers_pocket_labels() {
    let engine = Arc::new(HeadlessEngine::new());
    let backend = Arc::new(MockBackend::new());
    let session = new_session(&engine, &backend);

    session.open_result(analysis_2rfc()).await.unwrap();

    assert_eq!(engine.label_provider_names(), vec![POCKET_LABEL_PROVIDER.to_string()]);
    let locus = AtomLocus { residue: ResidueKey::new("A", 1), atom_name: Some("CA".to_string()) };
    assert_eq!(engine.labels_for(&locus), vec!["Pocket: 1, Score: 0.900".to_string()]);
    let outside = AtomLocus { residue: ResidueKey::new("A", 3), atom_name: None };
    assert_eq!(engine.labels_for(&outside), vec!["Pocket: none, Score: 0.100".to_string()]);
}

#[tokio::test]
async fn test_show_pockets_and_styles() {
    let engine = Arc::new(HeadlessEngine::new());
    let backend = Arc::new(MockBackend::new());
    let session = new_session(&engine, &backend);
    session.open_result(analysis_2rfc()).await.unwrap();

    let reps = session.show_pockets(PocketSelection::All).await.unwrap();
    assert_eq!(reps.len(), 6);

    session.set_pocket_style(Some(Style::Cartoon)).await.unwrap();
    let primary = session.scene().primary().await.unwrap();
    assert!(primary.pockets.iter().all(|r| r.visible == (r.style == Style::Cartoon)));

    session.set_polymer_style(None).await.unwrap();
    let primary = session.scene().primary().await.unwrap();
    assert!(primary.polymer.iter().all(|r| !r.visible));
    assert_eq!(session.view().polymer_style, None);

    let err = session.set_pocket_style(Some(Style::Backbone)).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidStyle(Style::Backbone)));
    assert_eq!(session.view().pocket_style, Some(Style::Cartoon));
}

#[tokio::test]
async fn test_show_unknown_pocket() {
    let engine = Arc::new(HeadlessEngine::new());
    let backend = Arc::new(MockBackend::new());
    let session = new_session(&engine, &backend);

    assert!(matches!(
        session.show_pockets(PocketSelection::All).await,
        Err(SessionError::NoResult)
    ));

    session.open_result(analysis_2rfc()).await.unwrap();
    assert!(matches!(
        session.show_pockets(PocketSelection::Id(9)).await,
        Err(SessionError::UnknownPocket(9))
    ));
}

#[tokio::test]
async fn test_comparison_query_and_search() {
    let engine = Arc::new(HeadlessEngine::new().with_residues(residues_2rfc()));
    let backend = Arc::new(MockBackend::new());
    let comparison = ComparisonResult {
        done: true,
        queries: vec![ComparisonQuery {
            found_holo: vec![common::candidate("1abc", &["A"])],
            found_apo: vec![common::candidate("2def", &["A"])],
            ..ComparisonQuery::default()
        }],
    };
    backend.script(
        JobKind::Comparison,
        ScriptedSource::new(JobKind::Comparison)
            .update(StatusUpdate::progress("Searching for related structures"))
            .update(StatusUpdate::success(JobResult::Comparison(comparison))),
    );
    let session = new_session(&engine, &backend);
    session.open_result(analysis_2rfc()).await.unwrap();

    // Pocket 1 spans x = 0, 1, 5; the centroid at 2 is nearest to A_2
    assert_eq!(session.comparison_query(1).await.unwrap(), "2rfc A LEU 2");

    let found = session.compare(1, None).await.unwrap();
    assert_eq!(found.job_id, "job-0");
    let ids: Vec<_> = found.result.candidates().into_iter().map(|c| c.pdb_id).collect();
    assert_eq!(ids, vec!["1abc", "2def"]);

    match backend.submissions().as_slice() {
        [JobRequest::Compare { file_hash, configuration }] => {
            assert_eq!(file_hash, "abc123");
            assert_eq!(configuration["queries"], "2rfc A LEU 2");
            assert_eq!(configuration["job_name"], "CryptoShow 2rfc A LEU 2");
        }
        other => panic!("Expected one comparison submission, got {:?}", other),
    }
}

#[tokio::test]
async fn test_comparison_unavailable_for_uploads() {
    let engine = Arc::new(HeadlessEngine::new());
    let backend = Arc::new(MockBackend::new());
    let session = new_session(&engine, &backend);
    let upload = AnalysisResult {
        structure_name: AnalysisResult::CUSTOM_STRUCTURE.to_string(),
        input_structure: "upload.pdb".to_string(),
        ..analysis_2rfc()
    };
    session.open_result(upload).await.unwrap();

    assert!(matches!(session.compare(1, None).await, Err(SessionError::ComparisonUnavailable)));
    assert!(backend.submissions().is_empty());
}

#[tokio::test]
async fn test_query_without_resolvable_residues() {
    let engine = Arc::new(HeadlessEngine::new());
    let backend = Arc::new(MockBackend::new());
    let session = new_session(&engine, &backend);
    session.open_result(analysis_2rfc()).await.unwrap();

    assert!(matches!(session.comparison_query(1).await, Err(SessionError::Query(_))));
}

#[tokio::test]
async fn test_pymol_export() {
    let engine = Arc::new(HeadlessEngine::new());
    let backend = Arc::new(MockBackend::new());
    let session = new_session(&engine, &backend);
    session.open_result(analysis_2rfc()).await.unwrap();

    assert_eq!(
        session.pymol_selection(1).unwrap(),
        "select s, 2rfc and ( (chain A and resi 1+2+3) )"
    );
    assert!(matches!(session.pymol_selection(7), Err(SessionError::UnknownPocket(7))));
}
