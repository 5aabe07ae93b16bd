//! Full research runs against scripted collaborators.
//!
//! Each test drives `Orchestrator::run` through planning, execution,
//! reflection and synthesis without touching the network.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use researcher::agents::executor::{NO_RESULTS_ANALYSIS, WebResearchExecutor};
use researcher::core::types::{Phase, Status, Verdict};
use researcher::io::llm::{ChatMessage, ProviderError};
use researcher::io::prompt::PromptEngine;
use researcher::observer::{CancelToken, NullSink};
use researcher::orchestrator::{Orchestrator, ResearchReport, RunOutcome};
use researcher::test_support::{
    RecordingSink, ScriptedExtractor, ScriptedLlm, ScriptedSearch, ScriptedTaskExecutor,
    auth_error, reflection_reply, result, run_settings,
};

const PLAN_3: &str = "1. battery storage cost trends\n\
                      2. sodium ion battery maturity\n\
                      3. grid storage safety incidents";

fn complete(outcome: RunOutcome) -> ResearchReport {
    match outcome {
        RunOutcome::Complete(report) => report,
        RunOutcome::Cancelled => panic!("run was cancelled"),
    }
}

/// Which prompt a request carries, judged from the user turn.
fn prompt_kind(messages: &[ChatMessage]) -> &'static str {
    let user = &messages.last().expect("user turn").content;
    if user.contains("RESEARCH DEPTH:") {
        "plan"
    } else if user.contains("RESEARCH QUERY:") {
        "analysis"
    } else if user.contains("RESEARCH COMPLETED SO FAR:") {
        "reflection"
    } else if user.contains("report title") {
        "title"
    } else if user.contains("ALL RESEARCH FINDINGS:") {
        "report"
    } else if user.contains("fact-checker") {
        "groundedness"
    } else {
        "unknown"
    }
}

#[test]
fn scenario_a_quick_plan_sufficient_after_one_iteration() {
    let llm = Arc::new(ScriptedLlm::new([
        PLAN_3.to_string(),
        reflection_reply(8, 7, "SUFFICIENT", &[]),
        "Storage Outlook".to_string(),
        "## Executive Summary\nAll good.".to_string(),
    ]));
    let executor = ScriptedTaskExecutor::echo();
    let mut orch = Orchestrator::new(run_settings("quick", 3), llm.clone(), Box::new(executor.clone()));
    let sink = RecordingSink::new();

    let report = complete(orch.run("storage outlook", &sink, &CancelToken::new()).expect("run"));

    assert_eq!(report.iterations, 1);
    assert_eq!(report.findings, 3);
    assert_eq!(report.title, "Storage Outlook");
    assert_eq!(report.markdown, "# Storage Outlook\n\n## Executive Summary\nAll good.");
    assert_eq!(report.grounded, None);
    assert_eq!(
        executor.executed(),
        vec![
            "battery storage cost trends",
            "sodium ion battery maturity",
            "grid storage safety incidents",
        ]
    );

    let session = orch.session();
    assert_eq!(session.status(), Status::Complete);
    assert_eq!(session.reflections().len(), 1);
    assert_eq!(session.reflections()[0].verdict, Verdict::Sufficient);
    assert_eq!(session.completed_queries().len(), 3);
    assert!(session.findings().iter().all(|f| f.iteration == 1));

    // Every recorded entry went to the sink, in order.
    let logged: Vec<String> = session.log().iter().map(|e| e.message.clone()).collect();
    assert_eq!(sink.messages(), logged);
    assert_eq!(llm.requests().len(), 4);
}

#[test]
fn snapshots_follow_the_status_lifecycle() {
    let llm = Arc::new(ScriptedLlm::new([
        PLAN_3.to_string(),
        reflection_reply(8, 8, "SUFFICIENT", &[]),
        "T".to_string(),
        "# T\nbody".to_string(),
    ]));
    let mut orch = Orchestrator::new(
        run_settings("quick", 3),
        llm,
        Box::new(ScriptedTaskExecutor::echo()),
    );
    let sink = RecordingSink::new();
    complete(orch.run("goal", &sink, &CancelToken::new()).expect("run"));

    let mut statuses: Vec<Status> = sink.snapshots().iter().map(|s| s.status).collect();
    statuses.dedup();
    assert_eq!(
        statuses,
        vec![
            Status::Initialized,
            Status::Planning,
            Status::Researching,
            Status::Reflecting,
            Status::Synthesizing,
            Status::Complete,
        ]
    );
    let last = sink.snapshots().pop().expect("final snapshot");
    assert_eq!(last.findings_count, 3);
    assert_eq!(last.goal, "goal");
    assert!(last.started_at.is_some());
}

#[test]
fn scenario_b_empty_search_records_placeholder_finding() {
    let llm = Arc::new(ScriptedLlm::responder(|messages| {
        Ok(match prompt_kind(messages) {
            "plan" => "solar panel recycling methods\nobscure query with no hits".to_string(),
            "analysis" => "Recycling recovers silver and silicon.".to_string(),
            "reflection" => reflection_reply(7, 7, "SUFFICIENT", &[]),
            "title" => "Panel Recycling".to_string(),
            "report" => "# Panel Recycling\nbody".to_string(),
            other => panic!("unexpected prompt {other}"),
        })
    }));
    let search = ScriptedSearch::always(vec![result(
        "Recycling guide",
        "https://recycle.example/guide",
        "How panels are recycled",
    )])
    .with_query("obscure query with no hits", Vec::new());
    let extractor = ScriptedExtractor::new([(
        "https://recycle.example/guide",
        "Panels are shredded and separated into glass, aluminium and silicon.",
    )]);
    let settings = run_settings("quick", 2);
    let executor = WebResearchExecutor::new(
        llm.clone(),
        Arc::new(PromptEngine::new()),
        Box::new(search),
        Box::new(extractor),
        settings.max_search_results,
        settings.profile,
    );
    let mut orch = Orchestrator::new(settings, llm.clone(), Box::new(executor));

    complete(orch.run("panel recycling", &NullSink, &CancelToken::new()).expect("run"));

    let findings = orch.session().findings();
    assert_eq!(findings.len(), 2);
    assert_eq!(findings[0].sources, vec!["https://recycle.example/guide"]);
    assert_eq!(findings[1].query, "obscure query with no hits");
    assert_eq!(findings[1].analysis, NO_RESULTS_ANALYSIS);
    assert!(findings[1].sources.is_empty());

    let analysis_calls = llm
        .requests()
        .iter()
        .filter(|r| prompt_kind(&r.messages) == "analysis")
        .count();
    assert_eq!(analysis_calls, 1);
}

#[test]
fn scenario_c_high_scores_stop_despite_more_verdict() {
    let llm = Arc::new(ScriptedLlm::new([
        PLAN_3.to_string(),
        reflection_reply(9, 9, "MORE", &["one more angle on storage"]),
        "T".to_string(),
        "# T".to_string(),
    ]));
    let executor = ScriptedTaskExecutor::echo();
    let mut orch = Orchestrator::new(run_settings("quick", 3), llm, Box::new(executor.clone()));

    let report = complete(orch.run("goal", &NullSink, &CancelToken::new()).expect("run"));

    assert_eq!(report.iterations, 1);
    assert_eq!(orch.session().plan().len(), 3);
    assert_eq!(executor.executed().len(), 3);
    assert_eq!(orch.session().reflections()[0].verdict, Verdict::More);
}

#[test]
fn scenario_d_markerless_reflection_is_flagged_and_defaulted() {
    let llm = Arc::new(ScriptedLlm::new([
        PLAN_3.to_string(),
        "Looks thorough enough, nothing to add.".to_string(),
        "T".to_string(),
        "# T".to_string(),
    ]));
    let mut orch = Orchestrator::new(
        run_settings("quick", 3),
        llm,
        Box::new(ScriptedTaskExecutor::echo()),
    );
    let sink = RecordingSink::new();

    complete(orch.run("goal", &sink, &CancelToken::new()).expect("run"));

    let reflection = &orch.session().reflections()[0];
    assert_eq!((reflection.completeness, reflection.depth), (5, 5));
    assert_eq!(reflection.gaps, "Unable to parse");
    assert_eq!(reflection.verdict, Verdict::Sufficient);

    let guardrail: Vec<_> = sink
        .entries()
        .into_iter()
        .filter(|e| e.phase == Phase::Guardrail)
        .collect();
    assert_eq!(guardrail.len(), 1);
    assert!(guardrail[0].message.contains("COMPLETENESS:"));
    assert_eq!(orch.session().status(), Status::Complete);
}

#[test]
fn follow_up_queries_run_in_the_next_iteration() {
    let llm = Arc::new(ScriptedLlm::new([
        PLAN_3.to_string(),
        reflection_reply(4, 3, "MORE", &["1. long duration storage economics"]),
        reflection_reply(8, 8, "SUFFICIENT", &[]),
        "T".to_string(),
        "# T".to_string(),
    ]));
    let executor = ScriptedTaskExecutor::echo();
    let mut orch = Orchestrator::new(run_settings("quick", 3), llm, Box::new(executor.clone()));

    let report = complete(orch.run("goal", &NullSink, &CancelToken::new()).expect("run"));

    assert_eq!(report.iterations, 2);
    assert_eq!(report.findings, 4);
    let session = orch.session();
    assert_eq!(session.plan().len(), 4);
    let last = session.findings().last().expect("finding");
    assert_eq!(last.query, "long duration storage economics");
    assert_eq!(last.iteration, 2);
    assert_eq!(session.reflections().len(), 2);
}

#[test]
fn completed_duplicates_are_appended_but_not_rerun() {
    let llm = Arc::new(ScriptedLlm::new([
        PLAN_3.to_string(),
        reflection_reply(2, 2, "MORE", &["battery storage cost trends"]),
        "T".to_string(),
        "# T".to_string(),
    ]));
    let executor = ScriptedTaskExecutor::echo();
    let mut orch = Orchestrator::new(run_settings("quick", 3), llm, Box::new(executor.clone()));
    let sink = RecordingSink::new();

    let report = complete(orch.run("goal", &sink, &CancelToken::new()).expect("run"));

    // Appended verbatim, then skipped because it is already completed.
    assert_eq!(orch.session().plan().len(), 4);
    assert_eq!(executor.executed().len(), 3);
    assert_eq!(report.findings, 3);
    assert_eq!(report.iterations, 2);
    assert!(sink.messages().iter().any(|m| m == "All planned queries completed"));
}

#[test]
fn query_proposed_twice_runs_twice_but_completes_once() {
    let repeated = "storage duration economics";
    let llm = Arc::new(ScriptedLlm::new([
        PLAN_3.to_string(),
        reflection_reply(2, 2, "MORE", &[repeated, repeated]),
        reflection_reply(9, 9, "SUFFICIENT", &[]),
        "T".to_string(),
        "# T".to_string(),
    ]));
    let executor = ScriptedTaskExecutor::echo();
    let mut orch = Orchestrator::new(run_settings("quick", 3), llm, Box::new(executor.clone()));

    let report = complete(orch.run("goal", &NullSink, &CancelToken::new()).expect("run"));

    assert_eq!(executor.executed().len(), 5);
    assert_eq!(report.findings, 5);
    let session = orch.session();
    assert_eq!(
        session.completed_queries().iter().filter(|q| *q == repeated).count(),
        1
    );
    assert_eq!(
        session.findings().iter().filter(|f| f.query == repeated).count(),
        2
    );
}

#[test]
fn adversarial_reflector_still_halts_at_the_iteration_bound() {
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = counter.clone();
    let llm = Arc::new(ScriptedLlm::responder(move |messages| {
        Ok(match prompt_kind(messages) {
            "plan" => PLAN_3.to_string(),
            "reflection" => {
                let n = seen.fetch_add(1, Ordering::SeqCst);
                let queries: Vec<String> = ["a", "b", "c"]
                    .iter()
                    .map(|suffix| format!("follow-up query number {n} {suffix}"))
                    .collect();
                let queries: Vec<&str> = queries.iter().map(String::as_str).collect();
                reflection_reply(0, 1, "MORE", &queries)
            }
            "title" => "T".to_string(),
            "report" => "# T".to_string(),
            other => panic!("unexpected prompt {other}"),
        })
    }));
    let executor = ScriptedTaskExecutor::echo();
    let mut orch = Orchestrator::new(run_settings("quick", 4), llm, Box::new(executor.clone()));

    let report = complete(orch.run("goal", &NullSink, &CancelToken::new()).expect("run"));

    assert_eq!(report.iterations, 4);
    assert_eq!(counter.load(Ordering::SeqCst), 4);
    // 3 planned, then at most 2 follow-ups per continued iteration.
    assert_eq!(executor.executed().len(), 3 + 2 * 3);
    assert_eq!(orch.session().reflections().len(), 4);
}

#[test]
fn empty_plan_produces_explanatory_report_without_synthesis_calls() {
    let llm = Arc::new(ScriptedLlm::new(["# no queries here\n\n1.\nshort"]));
    let executor = ScriptedTaskExecutor::echo();
    let mut orch = Orchestrator::new(run_settings("detailed", 3), llm.clone(), Box::new(executor.clone()));

    let report = complete(orch.run("an unplannable goal", &NullSink, &CancelToken::new()).expect("run"));

    assert_eq!(report.findings, 0);
    assert!(report.markdown.starts_with("# Research Report: an unplannable goal"));
    assert!(report.markdown.contains("No research was executed"));
    assert_eq!(llm.requests().len(), 1);
    assert!(executor.executed().is_empty());
    assert!(orch.session().reflections().is_empty());
    assert_eq!(orch.session().status(), Status::Complete);
}

#[test]
fn cancellation_stops_issuing_calls_and_marks_session_cancelled() {
    let llm = Arc::new(ScriptedLlm::new([PLAN_3]));
    let executor = ScriptedTaskExecutor::echo();
    let mut orch = Orchestrator::new(run_settings("quick", 3), llm.clone(), Box::new(executor.clone()));
    let cancel = CancelToken::new();
    let sink = RecordingSink::cancelling_on("Task 2/3", cancel.clone());

    let outcome = orch.run("goal", &sink, &cancel).expect("cancel is not an error");

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(executor.executed(), vec!["battery storage cost trends"]);
    assert_eq!(llm.requests().len(), 1);
    let snapshot = orch.snapshot();
    assert_eq!(snapshot.status, Status::Cancelled);
    assert_eq!(snapshot.findings_count, 1);
    assert_eq!(snapshot.log.last().map(|e| e.phase), Some(Phase::Stopped));
    assert_eq!(sink.snapshots().last().map(|s| s.status), Some(Status::Cancelled));
}

#[test]
fn fatal_executor_error_leaves_failed_session() {
    let llm = Arc::new(ScriptedLlm::new([PLAN_3]));
    let executor = ScriptedTaskExecutor::echo().failing_on("sodium ion battery maturity");
    let mut orch = Orchestrator::new(run_settings("quick", 3), llm, Box::new(executor));

    let err = orch
        .run("goal", &NullSink, &CancelToken::new())
        .expect_err("fatal");

    assert!(err.downcast_ref::<ProviderError>().is_some());
    let snapshot = orch.snapshot();
    assert_eq!(snapshot.status, Status::Failed);
    assert_eq!(snapshot.findings_count, 1);
    assert_eq!(snapshot.log.last().map(|e| e.phase), Some(Phase::Error));
}

#[test]
fn groundedness_verdict_is_reported_but_never_blocks() {
    let llm = Arc::new(ScriptedLlm::new([
        PLAN_3.to_string(),
        reflection_reply(8, 8, "SUFFICIENT", &[]),
        "T".to_string(),
        "# T\nclaims".to_string(),
        "FAIL".to_string(),
    ]));
    let mut settings = run_settings("quick", 3);
    settings.check_groundedness = true;
    let mut orch = Orchestrator::new(settings, llm.clone(), Box::new(ScriptedTaskExecutor::echo()));

    let report = complete(orch.run("goal", &NullSink, &CancelToken::new()).expect("run"));

    assert_eq!(report.grounded, Some(false));
    assert_eq!(report.markdown, "# T\nclaims");
    let check = llm.requests().pop().expect("groundedness request");
    assert_eq!(prompt_kind(&check.messages), "groundedness");
    assert!(check.messages[0].content.contains("### Research Task 1: battery storage cost trends"));
}

#[test]
fn groundedness_provider_error_fails_open() {
    let llm = Arc::new(ScriptedLlm::from_results([
        Ok(PLAN_3.to_string()),
        Ok(reflection_reply(8, 8, "SUFFICIENT", &[])),
        Ok("T".to_string()),
        Ok("# T".to_string()),
        Err(auth_error()),
    ]));
    let mut settings = run_settings("quick", 3);
    settings.check_groundedness = true;
    let mut orch = Orchestrator::new(settings, llm, Box::new(ScriptedTaskExecutor::echo()));

    let report = complete(orch.run("goal", &NullSink, &CancelToken::new()).expect("run"));

    assert_eq!(report.grounded, Some(true));
    assert_eq!(orch.session().status(), Status::Complete);
}

#[test]
fn rerun_discards_previous_session() {
    let llm = Arc::new(ScriptedLlm::new([
        PLAN_3.to_string(),
        reflection_reply(8, 8, "SUFFICIENT", &[]),
        "T".to_string(),
        "# T".to_string(),
        "heat pump efficiency ratings".to_string(),
        reflection_reply(8, 8, "SUFFICIENT", &[]),
        "U".to_string(),
        "# U".to_string(),
    ]));
    let mut orch = Orchestrator::new(
        run_settings("quick", 3),
        llm,
        Box::new(ScriptedTaskExecutor::echo()),
    );

    complete(orch.run("first goal", &NullSink, &CancelToken::new()).expect("first"));
    let report = complete(orch.run("second goal", &NullSink, &CancelToken::new()).expect("second"));

    assert_eq!(report.findings, 1);
    let snapshot = orch.snapshot();
    assert_eq!(snapshot.goal, "second goal");
    assert_eq!(snapshot.plan, vec!["heat pump efficiency ratings"]);
    assert_eq!(snapshot.completed_queries, vec!["heat pump efficiency ratings"]);
    assert_eq!(snapshot.reflections.len(), 1);
}
