//! Helming loop scenarios, driven through the data store and cycle manager with a manual clock.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{
    eqpt::helm::HelmDems,
    tc::{SailingMode, Tc}
};
use helm_lib::{
    cycle::{CycleMgr, StopToken},
    data_store::{DataStore, SensorReading},
    helm_ctrl::{
        HelmCtrl, Params, ProcedureEntry, ProcedureKind, SessionEvent, StatusReport
    },
    tc_processor
};
use util::time::ManualClock;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const PERIOD_S: f64 = 0.1;

const PORT: SailingMode = SailingMode::SwitchToPortTack;

const READING: SensorReading = SensorReading {
    heading_deg: 30.0,
    apparent_wind_angle_deg: 90.0,
    apparent_wind_direction_deg: 70.0
};

// ---------------------------------------------------------------------------
// HARNESS
// ---------------------------------------------------------------------------

/// One helming loop, minus the network.
struct Harness {
    cycle_mgr: CycleMgr<ManualClock>,
    ds: DataStore
}

impl Harness {
    fn new(params: Params, seed: u64) -> Self {
        let mut ds = DataStore::default();
        ds.helm_ctrl = HelmCtrl::from_params(params, Some(seed)).unwrap();

        Self {
            cycle_mgr: CycleMgr::new(ManualClock::new(), PERIOD_S, StopToken::new()).unwrap(),
            ds
        }
    }

    /// Run one cycle, applying the given TCs before processing.
    fn tick(&mut self, tcs: &[Tc]) -> (HelmDems, StatusReport) {
        let cycle = self.cycle_mgr.start_cycle().expect("Loop was stopped");
        self.ds.cycle_start(&cycle);

        self.ds.update_sensors(Some(READING), 10);

        for tc in tcs {
            tc_processor::exec(&mut self.ds, tc);
        }
        if self.ds.stop_requested {
            self.cycle_mgr.stop_token().stop();
        }

        self.ds.proc_helm_ctrl().unwrap();

        self.cycle_mgr.end_cycle();

        (self.ds.helm_ctrl_output, self.ds.helm_ctrl_status_rpt.clone())
    }

    /// Run cycles with no TCs until `n` have passed, returning the reports.
    fn run(&mut self, n: usize) -> Vec<StatusReport> {
        (0..n).map(|_| self.tick(&[]).1).collect()
    }

    fn history_len(&self, kind: ProcedureKind) -> usize {
        self.ds.helm_ctrl
            .scheduler()
            .history_summary()
            .iter()
            .find(|h| h.kind == kind)
            .map(|h| h.durations_s.len())
            .unwrap_or(0)
    }
}

fn params(kinds: &[ProcedureKind], explore_coef: f64) -> Params {
    let mut p = Params::default();
    p.scheduler.explore_coef = explore_coef;
    p.procedures = kinds
        .iter()
        .map(|&kind| ProcedureEntry { kind, timeout_s: None })
        .collect();
    p
}

fn first_started(report: &StatusReport) -> Option<ProcedureKind> {
    report.events.iter().find_map(|e| match e {
        SessionEvent::Started { kind, .. } => Some(*kind),
        _ => None
    })
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[test]
fn test_first_choice_reproducible_with_seed() {
    let p = params(&ProcedureKind::ALL, 0.1);

    let mut firsts = Vec::new();

    for seed in 0..50 {
        let choose = || {
            let mut h = Harness::new(p.clone(), seed);
            h.tick(&[Tc::SetGoalHeading(40.0)]);
            let (_, report) = h.tick(&[Tc::SetSailingMode(PORT)]);
            first_started(&report)
        };

        let a = choose();
        assert!(a.is_some());
        assert_eq!(a, choose(), "seed {} gave different choices", seed);

        firsts.push(a);
    }

    // Without any history the configured first procedure is the usual pick
    assert!(firsts.contains(&Some(ProcedureKind::TackBasic)));
}

#[test]
fn test_failed_procedure_ranked_below_fast_one() {
    let mut h = Harness::new(
        params(&[ProcedureKind::TackBasic, ProcedureKind::TackSheetOut], 0.0),
        1
    );

    // Session 1: TackBasic times out and TackSheetOut completes after 5 s
    let (_, report) = h.tick(&[Tc::SetSailingMode(PORT)]);
    assert_eq!(first_started(&report), Some(ProcedureKind::TackBasic));

    let reports = h.run(305);
    assert!(reports.iter().any(|r| first_started(r) == Some(ProcedureKind::TackSheetOut)));

    h.run(45);
    h.tick(&[Tc::SetSailingMode(SailingMode::Normal)]);

    assert_eq!(h.history_len(ProcedureKind::TackBasic), 1);
    assert_eq!(h.history_len(ProcedureKind::TackSheetOut), 1);

    // Sessions 2 and 3: TackSheetOut is tried first and completes after 6 then 7 s
    for ticks in [60, 70].iter() {
        let (_, report) = h.tick(&[Tc::SetSailingMode(PORT)]);
        assert_eq!(first_started(&report), Some(ProcedureKind::TackSheetOut));

        h.run(*ticks - 1);
        h.tick(&[Tc::SetSailingMode(SailingMode::Normal)]);
    }

    let summary = h.ds.helm_ctrl.scheduler().history_summary();
    let basic = &summary[0];
    let sheet_out = &summary[1];

    assert_eq!(basic.durations_s, vec![45.0]);
    assert_eq!(sheet_out.durations_s.len(), 3);
    let mean = sheet_out.mean_s.unwrap();
    assert!((mean - 6.0).abs() < 0.2, "mean was {}", mean);

    // Session 4 picks the fast procedure first
    let (_, report) = h.tick(&[Tc::SetSailingMode(PORT)]);
    assert_eq!(first_started(&report), Some(ProcedureKind::TackSheetOut));
    assert_eq!(
        h.ds.helm_ctrl.scheduler().records()[1].kind,
        ProcedureKind::TackBasic
    );
}

#[test]
fn test_timeout_starts_next_on_same_cycle() {
    let mut h = Harness::new(
        params(&[ProcedureKind::TackBasic, ProcedureKind::JibeBasic], 0.0),
        2
    );

    let (_, report) = h.tick(&[Tc::SetSailingMode(PORT)]);
    assert_eq!(report.procedure, Some(ProcedureKind::TackBasic));

    let mut failed_on = None;

    for i in 0..400 {
        let (dems, report) = h.tick(&[]);

        // A procedure is always in charge and always commanding the rudder
        assert!(report.procedure.is_some());
        assert!(report.rudder_cmd.is_some());
        assert!(dems.rudder_angle_deg.is_finite());

        if report.events.iter().any(|e| matches!(e, SessionEvent::Failed { .. })) {
            match report.events.as_slice() {
                [
                    SessionEvent::Failed { kind: ProcedureKind::TackBasic, elapsed_s, recorded: true },
                    SessionEvent::Started { kind: ProcedureKind::JibeBasic, mode: PORT }
                ] => assert!(*elapsed_s > 30.0),
                other => panic!("Unexpected events {:?}", other)
            }

            assert_eq!(report.procedure, Some(ProcedureKind::JibeBasic));

            // Jibing onto port puts the rudder hard right
            assert_eq!(dems.rudder_angle_deg, -30.0);

            failed_on = Some(i);
            break
        }
    }

    // 300 cycles after the start is exactly 30 s, which is not yet a timeout
    assert_eq!(failed_on, Some(300));
    assert_eq!(h.history_len(ProcedureKind::TackBasic), 1);
}

#[test]
fn test_return_to_normal_is_success() {
    let mut h = Harness::new(params(&ProcedureKind::ALL, 0.0), 3);

    h.tick(&[Tc::SetGoalHeading(40.0), Tc::SetSailingMode(PORT)]);
    h.run(20);
    assert!(h.ds.helm_ctrl.scheduler().is_in_progress());

    let (dems, report) = h.tick(&[Tc::SetSailingMode(SailingMode::Normal)]);

    match report.events.as_slice() {
        [SessionEvent::Succeeded { kind: ProcedureKind::TackBasic, duration_s, recorded: true }] => {
            assert!((duration_s - 2.1).abs() < 1e-6)
        },
        other => panic!("Unexpected events {:?}", other)
    }

    assert_eq!(report.procedure, None);
    assert!(!h.ds.helm_ctrl.scheduler().is_in_progress());

    // Normal steering takes over on the same cycle, 0.5 * (40 - 30)
    assert_eq!(dems.rudder_angle_deg, 5.0);
    assert_eq!(dems.sheet_setting, 0.5);
    assert_eq!(h.history_len(ProcedureKind::TackBasic), 1);
}

#[test]
fn test_mode_flip_discards_without_recording() {
    let mut h = Harness::new(params(&ProcedureKind::ALL, 0.0), 4);

    h.tick(&[Tc::SetSailingMode(PORT)]);
    h.run(10);

    let (dems, report) = h.tick(&[
        Tc::SetSailingMode(SailingMode::SwitchToStarboardTack)
    ]);

    assert_eq!(report.events, vec![
        SessionEvent::Discarded { kind: ProcedureKind::TackBasic },
        SessionEvent::Started {
            kind: ProcedureKind::TackBasic,
            mode: SailingMode::SwitchToStarboardTack
        }
    ]);

    // Tacking onto starboard puts the rudder hard right
    assert_eq!(dems.rudder_angle_deg, -30.0);
    assert_eq!(h.history_len(ProcedureKind::TackBasic), 0);
}

#[test]
fn test_exhausted_session_keeps_cycling() {
    let mut h = Harness::new(
        params(&[ProcedureKind::TackBasic, ProcedureKind::JibeBasic], 0.0),
        5
    );

    h.tick(&[Tc::SetSailingMode(PORT)]);
    let reports = h.run(610);

    let exhausted_at = reports
        .iter()
        .position(|r| r.events.iter().any(|e| matches!(e, SessionEvent::Exhausted { failures: 2 })))
        .expect("Session never exhausted");

    // Both procedures have now failed, cycling wraps back to the first
    assert!(reports[exhausted_at].exhausted);
    assert_eq!(reports[exhausted_at].procedure, Some(ProcedureKind::TackBasic));
    assert!(reports[exhausted_at..].iter().all(|r| r.procedure.is_some()));

    assert_eq!(h.history_len(ProcedureKind::TackBasic), 1);
    assert_eq!(h.history_len(ProcedureKind::JibeBasic), 1);
}

#[test]
fn test_remote_control_tc_skips_recording() {
    let mut h = Harness::new(params(&ProcedureKind::ALL, 0.0), 6);

    h.tick(&[Tc::SetRemoteControl(true), Tc::SetSailingMode(PORT)]);
    h.run(30);
    let (_, report) = h.tick(&[Tc::SetSailingMode(SailingMode::Normal)]);

    assert!(report.remote_control);
    assert!(matches!(
        report.events.as_slice(),
        [SessionEvent::Succeeded { recorded: false, .. }]
    ));
    assert_eq!(h.history_len(ProcedureKind::TackBasic), 0);
}

#[test]
fn test_stop_tc_ends_loop() {
    let mut h = Harness::new(Params::default(), 7);

    h.tick(&[]);
    h.tick(&[Tc::Stop]);

    assert!(h.cycle_mgr.start_cycle().is_none());
    assert_eq!(h.cycle_mgr.num_cycles(), 2);
}
