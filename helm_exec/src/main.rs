//! Main helm executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - System input acquisition:
//!             - Latest simulator packet
//!         - Telecommand processing and handling
//!         - Helm control processing
//!         - Demands output to the simulator
//!         - Archiving and telemetry
//!
//! # Modules
//!
//! All modules (e.g. `helm_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.
//!

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use comms_if::{
    eqpt::sim::SimStatus,
    net::{zmq, NetParams},
    tc::TcResponse
};
use helm_lib::{
    cycle::{CycleMgr, StopToken},
    data_store::DataStore,
    params::HelmExecParams,
    sim_client::{SimClient, SimClientError},
    tc_client::{TcClient, TcClientError},
    tc_processor,
    tm_server::TmServer,
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::WrapErr};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use structopt::StructOpt;

// Internal
use util::{
    archive::Archived,
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::Session,
    time::MonotonicClock,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Limit of the number of consecutive cycle overruns before an error is reported.
const MAX_CONSEC_CYCLE_OVERRUNS: u64 = 50;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Helm executable command line options
#[derive(Debug, StructOpt)]
#[structopt(name = "helm_exec", about = "Helming executable for the sailing robot")]
struct Opt {
    /// Planner script to run instead of receiving telecommands over the network
    #[structopt(parse(from_os_str))]
    script: Option<PathBuf>,

    /// Seed for the procedure scheduler, overrides the value in helm_exec.toml
    #[structopt(long)]
    seed: Option<u64>,

    /// Run without the simulator link
    #[structopt(long)]
    no_sim: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Various sources for the telecommands incoming to the exec.
enum TcSource {
    Remote(TcClient),
    Script(ScriptInterpreter),
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "helm_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Sailing Robot Helm Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let exec_params: HelmExecParams = util::params::load(
        "helm_exec.toml"
    ).wrap_err("Could not load exec params")?;

    let net_params: NetParams = util::params::load(
        "net.toml"
    ).wrap_err("Could not load net params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE NETWORK CONTEXT ----

    let zmq_ctx = zmq::Context::new();

    // ---- INITIALISE TC SOURCE ----

    // TC source is used to determine whether we're getting TCs from a script
    // or from the planner.
    let mut tc_source = match opt.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);

            // Load the script interpreter
            let si = ScriptInterpreter::new(path)
                .wrap_err("Failed to load script")?;

            // Display some info
            info!(
                "Loaded script lasts {:.02} s and contains {} TCs\n",
                si.get_duration(),
                si.get_num_tcs()
            );

            TcSource::Script(si)
        },
        None => {
            info!("No script provided, commands will be recieved by the TcClient\n");

            TcSource::Remote(
                TcClient::new(&zmq_ctx, &net_params)
                    .wrap_err("Failed to initialise the TcClient")?
            )
        }
    };

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    // ---- INITIALISE MODULES ----

    let seed = opt.seed.or(exec_params.seed);
    if let Some(s) = seed {
        info!("Procedure scheduler seed: {}", s);
    }

    ds.helm_ctrl.init(("helm_ctrl.toml", seed), &session)
        .wrap_err("Failed to initialise HelmCtrl")?;
    info!("HelmCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let sim_client = match opt.no_sim {
        true => {
            info!("Simulator link disabled");
            None
        },
        false => {
            let c = SimClient::new(&net_params)
                .wrap_err("Failed to initialise SimClient")?;
            info!("SimClient initialised");
            Some(c)
        }
    };

    let mut tm_server = {
        let s = TmServer::new(&zmq_ctx, &net_params)
            .wrap_err("Failed to initialise TmServer")?;
        info!("TmServer initialised");
        s
    };

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    let stop = StopToken::new();
    let mut cycle_mgr = CycleMgr::new(
        MonotonicClock::new(),
        exec_params.cycle_period_s,
        stop.clone()
    ).wrap_err("Failed to initialise the cycle manager")?;

    info!("Begining main loop\n");

    let mut planner_connected = false;
    let mut planner_subscribed = false;

    while let Some(cycle) = cycle_mgr.start_cycle() {

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(&cycle);

        // ---- DATA INPUT ----

        let mut sim_status = SimStatus::Continue;

        let reading = match sim_client {
            Some(ref c) => match c.latest() {
                Ok(Some(data)) => {
                    ds.sim_time_s = Some(data.time_s);
                    sim_status = data.status;

                    match c.reading(&data) {
                        Ok(r) => Some(r),
                        Err(e) => {
                            warn!("Could not read sensors from simulator packet: {}", e);
                            None
                        }
                    }
                },
                Ok(None) => None,
                Err(SimClientError::NotConnected) => {
                    error!("SimClient has stopped, stopping");
                    stop.stop();
                    None
                },
                Err(e) => {
                    warn!("SimClient error: {}", e);
                    None
                }
            },
            None => None
        };

        ds.update_sensors(reading, exec_params.max_stale_cycles);

        if sim_status.is_terminate() {
            info!("Simulator requested termination ({:?}), stopping", sim_status);
            stop.stop();
        }

        // ---- TELECOMMAND PROCESSING ----

        // Branch depending on the source
        match tc_source {
            TcSource::Remote(ref client) => {
                if client.is_connected() != planner_connected {
                    planner_connected = client.is_connected();
                    match planner_connected {
                        true => info!("Connected to the planner"),
                        false => warn!("Lost connection to the planner")
                    }
                }

                // Get commands until none remain
                while planner_connected {
                    match client.recieve_tc() {
                        Ok(Some(tc)) => {
                            tc_processor::exec(&mut ds, &tc);

                            if let Err(e) = client.send_response(TcResponse::Ok) {
                                warn!("Could not send TC response: {}", e);
                            }
                        },
                        Ok(None) => break,
                        // Invalid commands have been answered and are ignored, the previous
                        // values are kept
                        Err(TcClientError::TcParseError(e)) => {
                            warn!("Could not parse recieved TC: {}", e);
                        },
                        Err(TcClientError::NonUtf8Message) => {
                            warn!("Recieved a non UTF-8 TC");
                        },
                        Err(TcClientError::NotConnected) => break,
                        Err(e) => {
                            error!("TcClient error: {}", e);
                            break
                        }
                    }
                }
            },

            TcSource::Script(ref mut si) =>
                match si.get_pending_tcs(ds.time_s) {
                    PendingTcs::None => (),
                    PendingTcs::Some(tc_vec) => {
                        for tc in tc_vec.iter() {
                            tc_processor::exec(&mut ds, tc);
                        }
                    }
                    // Exit if end of script reached
                    PendingTcs::EndOfScript => {
                        info!("End of TC script reached, stopping");
                        stop.stop();
                    }
                }
        };

        if ds.stop_requested {
            stop.stop();
        }

        // ---- CONTROL ALGORITHM PROCESSING ----

        // HelmCtrl processing, the previous demands and status are held on error
        if let Err(e) = ds.proc_helm_ctrl() {
            warn!("Error during HelmCtrl processing: {}", e)
        }

        // Send demands to the simulator, passing on any termination request so it shuts down
        // with us
        if let Some(ref c) = sim_client {
            let status = match stop.is_stopped() {
                true => SimStatus::BasinTerminate,
                false => SimStatus::Continue
            };

            if let Err(e) = c.send_demands(status, &ds.helm_ctrl_output) {
                warn!("Could not send demands to the simulator: {}", e);
            }
        }

        // ---- WRITE ARCHIVES ----

        if exec_params.archive_enabled {
            if let Err(e) = ds.helm_ctrl.write() {
                warn!("Could not write HelmCtrl archive: {}", e);
            }
        }

        // ---- TELEMETRY ----

        if tm_server.is_connected() != planner_subscribed {
            planner_subscribed = tm_server.is_connected();
            match planner_subscribed {
                true => info!("Planner subscribed to telemetry"),
                false => info!("Planner telemetry subscription lost")
            }
        }

        match tm_server.send(&ds) {
            Ok(_) => (),
            Err(e) => warn!("TmServer error: {}", e)
        };

        // ---- CYCLE MANAGEMENT ----

        cycle_mgr.end_cycle();

        ds.num_consec_cycle_overruns = cycle_mgr.num_consec_overruns();
        if ds.num_consec_cycle_overruns == MAX_CONSEC_CYCLE_OVERRUNS {
            error!(
                "{} consecutive cycle overruns, the cycle period may be too short",
                MAX_CONSEC_CYCLE_OVERRUNS
            );
        }
    }

    // ---- SHUTDOWN ----

    info!(
        "Main loop ended after {} cycles ({} overruns)",
        cycle_mgr.num_cycles(),
        cycle_mgr.num_overruns()
    );

    // Drop the clients so their background threads are joined before the session ends
    drop(sim_client);
    drop(tc_source);
    drop(tm_server);

    session.exit();

    info!("End of execution");

    Ok(())
}
