//! # Helm Control Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use comms_if::{eqpt::helm::ControlSnapshot, tc::SailingMode};
use helm_lib::helm_ctrl::{HelmCtrl, InputData, Params, PidController, SailTable, SheetCmd};
use util::module::State;

fn helm_tick_benchmark(c: &mut Criterion) {
    // ---- Build controller and inputs ----

    let mut params = Params::default();
    params.sail_table = vec![[0.0, 0.1], [45.0, 0.3], [90.0, 0.6], [180.0, 0.9], [270.0, 0.6]];

    let snapshot = ControlSnapshot {
        heading_deg: 30.0,
        goal_heading_deg: 40.0,
        apparent_wind_angle_deg: 100.0,
        apparent_wind_direction_deg: 70.0,
    };

    let mut input = InputData {
        time_s: 0.0,
        dt_s: 0.1,
        sailing_mode: SailingMode::Normal,
        snapshot,
        remote_control: None,
    };

    // ---- Components ----

    c.bench_function("PidController::update", |b| {
        let mut pid = PidController::new(0.5, 0.1, 0.05, 30.0);
        b.iter(|| black_box(pid.update(black_box(10.0), 0.1)))
    });

    let table = SailTable::new(&params.sail_table).unwrap();
    c.bench_function("SailTable::resolve", |b| {
        b.iter(|| table.resolve(SheetCmd::Wind { offset: 0.2 }, black_box(123.4)))
    });

    // ---- Full cycles ----

    c.bench_function("HelmCtrl::proc::normal", |b| {
        let mut helm = HelmCtrl::from_params(params.clone(), Some(0)).unwrap();
        b.iter(|| {
            input.time_s += 0.1;
            helm.proc(black_box(&input)).unwrap()
        })
    });

    // Maneuver which never returns to normal, so cycles through procedures as they time out
    input.sailing_mode = SailingMode::SwitchToPortTack;
    c.bench_function("HelmCtrl::proc::maneuver", |b| {
        let mut helm = HelmCtrl::from_params(params.clone(), Some(0)).unwrap();
        b.iter(|| {
            input.time_s += 0.1;
            helm.proc(black_box(&input)).unwrap()
        })
    });
}

criterion_group!(benches, helm_tick_benchmark);
criterion_main!(benches);
