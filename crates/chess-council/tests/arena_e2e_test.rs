//! End-to-end arbitration with scripted models and a table-driven oracle.

mod common;

use std::sync::Arc;
use std::time::Duration;

use arbiter::{
    AnchorPolicy, Direction, Evaluation, MoveCandidate, OutcomeFailure, Position, PositionReport,
};
use async_trait::async_trait;
use chess_council::protocols::{
    DebateProtocol, ManagerProtocol, MoveProtocol, ProtocolError, StructuredProtocol,
};
use chess_council::{Arena, ArenaSettings};
use common::{text, tool, FakeOracle, ScriptedBackend, START};
use tokio_util::sync::CancellationToken;

const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";

/// Scripts one position's worth of replies: structured → `s`, debate → `d`,
/// manager → `m` (submitted without a legality check).
fn script_position(backend: ScriptedBackend, s: &str, d: &str, m: &str) -> ScriptedBackend {
    let debate = (1..=4).flat_map(|round| {
        let closing = round == 4;
        [
            text(&format!("Alpha round {round}: thinking.")),
            text(&if closing {
                format!("My final proposed move is: {d}")
            } else {
                format!("Beta round {round}: thinking.")
            }),
        ]
    });
    backend
        .script("proposer", [tool("s", "propose_move", &format!(r#"{{"move":"{s}"}}"#))])
        .script("debater", debate.collect::<Vec<_>>())
        .script("analyst", [text("no risks"), text("develop pieces")])
        .script(
            "manager",
            [tool("m", "submit_final", &format!(r#"{{"move":"{m}","justification":"ok"}}"#))],
        )
}

fn protocols(backend: &Arc<ScriptedBackend>) -> Vec<Arc<dyn MoveProtocol>> {
    vec![
        Arc::new(StructuredProtocol::new(backend.clone(), "proposer")),
        Arc::new(DebateProtocol::new(backend.clone(), "debater")),
        Arc::new(ManagerProtocol::new(backend.clone(), "manager", "analyst")),
    ]
}

fn settings(anchor: AnchorPolicy) -> ArenaSettings {
    ArenaSettings {
        anchor,
        protocol_timeout: Duration::from_secs(60),
        record_engine_best: false,
    }
}

fn collect_reports(reports: &mut Vec<PositionReport>) -> impl FnMut(&PositionReport) + '_ {
    move |r| reports.push(r.clone())
}

#[tokio::test]
async fn best_move_for_the_mover_takes_the_point() {
    let backend = Arc::new(script_position(ScriptedBackend::new(), "e2e4", "d2d4", "a2a3"));
    let oracle = Arc::new(
        FakeOracle::new()
            .eval("e2e4", Evaluation::Centipawns(-30))
            .eval("d2d4", Evaluation::Centipawns(-10))
            .eval("a2a3", Evaluation::Centipawns(5)),
    );
    let arena = Arena::new(protocols(&backend), oracle.clone(), settings(AnchorPolicy::SideToMove));

    let mut reports = Vec::new();
    let summary = arena
        .run(&[START.to_string()], &CancellationToken::new(), collect_reports(&mut reports))
        .await;

    let report = &reports[0];
    let scores: Vec<f64> = report.outcomes.iter().map(|o| o.score).collect();
    assert_eq!(scores, vec![30.0, 10.0, -5.0]);
    assert_eq!(report.winners().collect::<Vec<_>>(), vec!["structured"]);
    assert_eq!(report.direction, Some(Direction::Maximize));

    let points: Vec<(String, u32)> = summary
        .tallies
        .iter()
        .map(|t| (t.name.clone(), t.total_points))
        .collect();
    assert_eq!(
        points,
        vec![
            ("structured".to_string(), 1),
            ("debate".to_string(), 0),
            ("manager".to_string(), 0)
        ]
    );
    assert_eq!(summary.positions_scored, 1);
    assert_eq!(oracle.evaluation_calls(), 3);
    assert_eq!(backend.remaining(), 0);
}

#[tokio::test]
async fn fixed_anchor_minimizes_when_the_other_side_moves() {
    let backend = Arc::new(script_position(ScriptedBackend::new(), "e7e5", "c7c5", "a7a6"));
    let oracle = Arc::new(
        FakeOracle::new()
            .eval("e7e5", Evaluation::Centipawns(-30))
            .eval("c7c5", Evaluation::Centipawns(-10))
            .eval("a7a6", Evaluation::Centipawns(5)),
    );
    let arena = Arena::new(protocols(&backend), oracle, settings(AnchorPolicy::White));

    let report = arena.score_position(uuid::Uuid::new_v4(), 0, AFTER_E4).await;
    let scores: Vec<f64> = report.outcomes.iter().map(|o| o.score).collect();
    assert_eq!(scores, vec![-30.0, -10.0, 5.0]);
    assert_eq!(report.direction, Some(Direction::Minimize));
    assert_eq!(report.winners().collect::<Vec<_>>(), vec!["structured"]);
}

#[tokio::test]
async fn equal_scores_share_the_point() {
    let backend = Arc::new(script_position(ScriptedBackend::new(), "e2e4", "e2e4", "a2a3"));
    let oracle = Arc::new(
        FakeOracle::new()
            .eval("e2e4", Evaluation::Centipawns(-25))
            .eval("a2a3", Evaluation::Centipawns(10)),
    );
    let arena = Arena::new(protocols(&backend), oracle, settings(AnchorPolicy::SideToMove));

    let report = arena.score_position(uuid::Uuid::new_v4(), 0, START).await;
    assert_eq!(report.winners().collect::<Vec<_>>(), vec!["structured", "debate"]);
}

#[tokio::test]
async fn all_illegal_moves_award_nothing() {
    let backend = Arc::new(script_position(ScriptedBackend::new(), "e2e5", "a1a8", "h2h5"));
    let oracle = Arc::new(FakeOracle::new());
    let arena = Arena::new(protocols(&backend), oracle, settings(AnchorPolicy::SideToMove));

    let mut reports = Vec::new();
    let summary = arena
        .run(&[START.to_string()], &CancellationToken::new(), collect_reports(&mut reports))
        .await;

    let report = &reports[0];
    assert_eq!(report.winners().count(), 0);
    for outcome in &report.outcomes {
        assert_eq!(outcome.score, f64::NEG_INFINITY);
        assert!(matches!(outcome.failure, Some(OutcomeFailure::Illegal(_))));
        assert!(outcome.proposed_move.is_some());
    }
    for tally in &summary.tallies {
        assert_eq!((tally.total_points, tally.positions_attempted, tally.malformed_count), (0, 1, 1));
    }
}

#[tokio::test]
async fn unparsable_positions_are_skipped_not_attempted() {
    let backend = Arc::new(script_position(ScriptedBackend::new(), "e2e4", "d2d4", "a2a3"));
    let oracle = Arc::new(FakeOracle::new().eval("e2e4", Evaluation::Centipawns(0)));
    let arena = Arena::new(protocols(&backend), oracle.clone(), settings(AnchorPolicy::SideToMove));

    let positions = vec!["not a fen".to_string(), START.to_string()];
    let mut reports = Vec::new();
    let summary = arena
        .run(&positions, &CancellationToken::new(), collect_reports(&mut reports))
        .await;

    assert!(reports[0].skipped.is_some());
    assert!(reports[0].outcomes.is_empty());
    assert_eq!((summary.positions_scored, summary.positions_skipped), (1, 1));
    assert!(summary.tallies.iter().all(|t| t.positions_attempted == 1));
    assert_eq!(oracle.validations.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn oracle_outage_is_errored_not_malformed() {
    let backend = Arc::new(script_position(ScriptedBackend::new(), "e2e4", "d2d4", "a2a3"));
    let arena = Arena::new(
        protocols(&backend),
        Arc::new(FakeOracle::new().unavailable()),
        settings(AnchorPolicy::SideToMove),
    );

    let mut reports = Vec::new();
    let summary = arena
        .run(&[START.to_string()], &CancellationToken::new(), collect_reports(&mut reports))
        .await;
    assert_eq!(reports[0].winners().count(), 0);
    for tally in &summary.tallies {
        assert_eq!((tally.malformed_count, tally.errored_count), (0, 1));
    }
}

#[tokio::test]
async fn exhausted_manager_never_reaches_the_oracle() {
    let mut analyst = vec![text("risk"), text("plan")];
    analyst.extend((0..5).map(|_| text(r#"{"is_legal": false, "reason": "no"}"#)));
    let backend = Arc::new(
        ScriptedBackend::new().script("analyst", analyst).script(
            "manager",
            (0..5).map(|i| tool(&format!("c{i}"), "check_legality", r#"{"move":"e2e4"}"#)),
        ),
    );
    let oracle = Arc::new(FakeOracle::new().eval("e2e4", Evaluation::Centipawns(-30)));
    let manager: Arc<dyn MoveProtocol> =
        Arc::new(ManagerProtocol::new(backend.clone(), "manager", "analyst"));
    let arena = Arena::new(vec![manager], oracle.clone(), settings(AnchorPolicy::SideToMove));

    let report = arena.score_position(uuid::Uuid::new_v4(), 0, START).await;
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.score, f64::NEG_INFINITY);
    assert!(matches!(&outcome.failure, Some(OutcomeFailure::Errored(r)) if r.contains("max iterations (5)")));
    assert_eq!(oracle.evaluation_calls(), 0);
    assert_eq!(backend.calls(), 12);
}

/// Never answers within any reasonable limit.
struct Stalled;

#[async_trait]
impl MoveProtocol for Stalled {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn decide(&self, _position: &Position) -> Result<MoveCandidate, ProtocolError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(MoveCandidate::parse("e2e4")?)
    }
}

#[tokio::test(start_paused = true)]
async fn slow_protocol_times_out_with_sentinel() {
    let oracle = Arc::new(FakeOracle::new().eval("e2e4", Evaluation::Centipawns(-30)));
    let stalled: Arc<dyn MoveProtocol> = Arc::new(Stalled);
    let arena = Arena::new(
        vec![stalled],
        oracle.clone(),
        ArenaSettings {
            protocol_timeout: Duration::from_millis(50),
            ..settings(AnchorPolicy::SideToMove)
        },
    );

    let report = arena.score_position(uuid::Uuid::new_v4(), 0, START).await;
    let outcome = &report.outcomes[0];
    assert!(matches!(&outcome.failure, Some(OutcomeFailure::Errored(r)) if r.contains("timed out")));
    assert!(!outcome.winner);
    assert_eq!(oracle.evaluation_calls(), 0);
}

#[tokio::test]
async fn cancellation_stops_between_positions() {
    let backend = Arc::new(script_position(ScriptedBackend::new(), "e2e4", "d2d4", "a2a3"));
    let oracle = Arc::new(FakeOracle::new().eval("e2e4", Evaluation::Centipawns(-30)));
    let arena = Arena::new(protocols(&backend), oracle, settings(AnchorPolicy::SideToMove));
    let cancel = CancellationToken::new();

    let positions = vec![START.to_string(), START.to_string(), START.to_string()];
    let mut seen = 0;
    let summary = arena
        .run(&positions, &cancel, |_| {
            seen += 1;
            cancel.cancel();
        })
        .await;

    assert_eq!(seen, 1);
    assert!(summary.cancelled);
    assert_eq!(summary.positions_scored, 1);
    assert_eq!(summary.positions_total, 3);
    assert!(summary.render().contains("(cancelled)"));
}

#[tokio::test]
async fn engine_reference_move_is_recorded_when_enabled() {
    let backend = Arc::new(script_position(ScriptedBackend::new(), "e2e4", "d2d4", "a2a3"));
    let oracle = Arc::new(
        FakeOracle::new()
            .eval("e2e4", Evaluation::Centipawns(-30))
            .best("e2e4"),
    );
    let arena = Arena::new(
        protocols(&backend),
        oracle,
        ArenaSettings {
            record_engine_best: true,
            ..settings(AnchorPolicy::SideToMove)
        },
    );

    let report = arena.score_position(uuid::Uuid::new_v4(), 0, START).await;
    assert_eq!(report.engine_best.as_deref(), Some("e2e4"));
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["engine_best"], "e2e4");
    assert_eq!(json["outcomes"][0]["winner"], true);
}

#[tokio::test]
async fn sloppy_castling_and_en_passant_fields_are_still_scored() {
    let sloppy = [
        "r3k2r/8/8/8/8/8/8/4K3 w KQkq - 0 1",
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq e6 0 1",
    ];
    for fen in sloppy {
        let backend = Arc::new(script_position(ScriptedBackend::new(), "e1f1", "e1d1", "e2e4"));
        let oracle = Arc::new(
            FakeOracle::new()
                .eval("e1f1", Evaluation::Centipawns(10))
                .eval("e2e4", Evaluation::Centipawns(-20)),
        );
        let arena = Arena::new(protocols(&backend), oracle, settings(AnchorPolicy::SideToMove));

        let mut reports = Vec::new();
        let summary = arena
            .run(&[fen.to_string()], &CancellationToken::new(), collect_reports(&mut reports))
            .await;

        assert!(reports[0].skipped.is_none(), "{fen}: {:?}", reports[0].skipped);
        assert_eq!(reports[0].fen, fen);
        assert_eq!((summary.positions_scored, summary.positions_skipped), (1, 0));
        assert_eq!(reports[0].winners().count(), 1);
    }
}

#[tokio::test]
async fn run_with_only_invalid_positions_attempts_nothing() {
    let backend = Arc::new(ScriptedBackend::new());
    let arena = Arena::new(
        protocols(&backend),
        Arc::new(FakeOracle::new()),
        settings(AnchorPolicy::SideToMove),
    );

    let positions = vec![
        "not a fen".to_string(),
        "8/8/8/8/8/8/8/8 w - - 0 1".to_string(),
    ];
    let summary = arena
        .run(&positions, &CancellationToken::new(), |_| {})
        .await;

    assert_eq!((summary.positions_scored, summary.positions_skipped), (0, 2));
    assert!(summary.tallies.iter().all(|t| t.positions_attempted == 0));
    assert_eq!(backend.calls(), 0);
    assert!(summary.render().contains("0.00%"));
}
