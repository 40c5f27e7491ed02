//! Scripted load scenarios.
//!
//! A scenario is a pre-registered program, identified by a small
//! integer, that drives the session with a known order shape and
//! validates the response stream afterwards. The driver interleaves
//! high-throughput sending with response draining so the engine-side
//! buffers never fill beyond tolerance, then proves completeness with
//! a final bounded drain.
//!
//! Catalog:
//!
//! | id    | shape                                   |
//! |-------|-----------------------------------------|
//! | 1     | a handful of simple resting orders      |
//! | 2     | one matching buy/sell pair              |
//! | 3     | order + cancel                          |
//! | 10-12 | unmatched stress, 1K / 10K / 100K       |
//! | 20-25 | matching stress, 1K .. 250M pairs       |
//! | 30-32 | dual-symbol matching, 500K / 1M / 100M  |

use std::time::{Duration, Instant};

use engine_codec::{Request, Side};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::session::Session;
use crate::stats::ScenarioStats;

/// Why a run failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    MissingAcks,
    MissingTrades,
    Rejects,
    SendErrors,
}

/// Verdict of a scenario run. Failures are ordinary values, never
/// panics: callers decide what to do with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioOutcome {
    Passed {
        stats: ScenarioStats,
    },
    Failed {
        stats: ScenarioStats,
        reason: FailureReason,
    },
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, ScenarioOutcome::Passed { .. })
    }

    pub fn stats(&self) -> &ScenarioStats {
        match self {
            ScenarioOutcome::Passed { stats } => stats,
            ScenarioOutcome::Failed { stats, .. } => stats,
        }
    }
}

/// Batch/sleep/drain shape for a run, picked from the iteration count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub pairs_per_batch: u64,
    pub inter_batch_sleep: Duration,
    pub final_drain: Duration,
}

/// Piecewise pacing table. The same table serves matching, unmatched
/// and dual-symbol runs.
pub fn pacing_for(iterations: u64) -> Pacing {
    if iterations < 10_000 {
        Pacing {
            pairs_per_batch: 50,
            inter_batch_sleep: Duration::from_millis(10),
            final_drain: Duration::from_secs(60),
        }
    } else if iterations < 100_000 {
        Pacing {
            pairs_per_batch: 100,
            inter_batch_sleep: Duration::from_millis(25),
            final_drain: Duration::from_secs(120),
        }
    } else if iterations < 1_000_000 {
        Pacing {
            pairs_per_batch: 100,
            inter_batch_sleep: Duration::from_millis(40),
            final_drain: Duration::from_secs(600),
        }
    } else {
        Pacing {
            pairs_per_batch: 100,
            inter_batch_sleep: Duration::from_millis(50),
            final_drain: Duration::from_secs(1800),
        }
    }
}

/// Poll width for the aggressive mid-run drain bursts.
const BURST_POLL: Duration = Duration::from_millis(2);

/// Settle time between the send loop and the final drain, letting
/// in-flight writes reach the wire.
const SETTLE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy)]
enum Shape {
    /// One resting order per iteration, prices never cross.
    Unmatched,
    /// One buy + one sell at the same price per iteration.
    MatchingPair,
    /// Order then cancel, once.
    CancelFlow,
}

struct Plan {
    name: &'static str,
    shape: Shape,
    iterations: u64,
    symbols: &'static [&'static str],
}

fn plan_for(id: u32) -> Option<Plan> {
    let plan = match id {
        1 => Plan {
            name: "simple orders",
            shape: Shape::Unmatched,
            iterations: 5,
            symbols: &["IBM"],
        },
        2 => Plan {
            name: "matching trade",
            shape: Shape::MatchingPair,
            iterations: 1,
            symbols: &["IBM"],
        },
        3 => Plan {
            name: "cancel",
            shape: Shape::CancelFlow,
            iterations: 1,
            symbols: &["IBM"],
        },
        10 => stress("unmatched stress 1K", Shape::Unmatched, 1_000),
        11 => stress("unmatched stress 10K", Shape::Unmatched, 10_000),
        12 => stress("unmatched stress 100K", Shape::Unmatched, 100_000),
        20 => stress("matching stress 1K", Shape::MatchingPair, 1_000),
        21 => stress("matching stress 10K", Shape::MatchingPair, 10_000),
        22 => stress("matching stress 100K", Shape::MatchingPair, 100_000),
        23 => stress("matching stress 250K", Shape::MatchingPair, 250_000),
        24 => stress("matching stress 500K", Shape::MatchingPair, 500_000),
        25 => stress("matching stress 250M", Shape::MatchingPair, 250_000_000),
        30 => dual("dual-symbol 500K", 500_000),
        31 => dual("dual-symbol 1M", 1_000_000),
        32 => dual("dual-symbol 100M", 100_000_000),
        _ => return None,
    };
    Some(plan)
}

fn stress(name: &'static str, shape: Shape, iterations: u64) -> Plan {
    Plan {
        name,
        shape,
        iterations,
        symbols: &["IBM"],
    }
}

fn dual(name: &'static str, iterations: u64) -> Plan {
    Plan {
        name,
        shape: Shape::MatchingPair,
        iterations,
        symbols: &["IBM", "AAPL"],
    }
}

/// Print the scenario catalog (shown for unknown ids and by the REPL
/// `help`).
pub fn print_catalog() {
    println!("available scenarios:");
    println!("   1  simple orders            2  matching trade         3  cancel");
    println!("  10  unmatched 1K            11  unmatched 10K         12  unmatched 100K");
    println!("  20  matching 1K             21  matching 10K          22  matching 100K");
    println!("  23  matching 250K           24  matching 500K         25  matching 250M");
    println!("  30  dual-symbol 500K        31  dual-symbol 1M        32  dual-symbol 100M");
}

/// Run scenario `id` against `session`.
///
/// Unknown ids print the catalog and come back as a failed run with no
/// traffic sent.
pub async fn run_scenario(session: &mut Session, id: u32) -> ScenarioOutcome {
    let Some(plan) = plan_for(id) else {
        error!("unknown scenario id {id}");
        print_catalog();
        return ScenarioOutcome::Failed {
            stats: ScenarioStats::default(),
            reason: FailureReason::SendErrors,
        };
    };

    info!(
        "scenario {id} ({}): {} iterations on {:?}",
        plan.name, plan.iterations, plan.symbols
    );

    if let Err(e) = reset_engine_state(session).await {
        error!("engine state reset failed: {e:#}");
        session.close().await;
        return ScenarioOutcome::Failed {
            stats: ScenarioStats::default(),
            reason: FailureReason::SendErrors,
        };
    }

    match plan.shape {
        Shape::CancelFlow => run_cancel_flow(session, &plan).await,
        _ => run_load(session, &plan).await,
    }
}

/// Scenario prologue: flush the books, give the engine a moment,
/// swallow whatever it emits about the flush, reset order ids.
async fn reset_engine_state(session: &mut Session) -> anyhow::Result<()> {
    session.send_request(&Request::Flush).await?;
    sleep(Duration::from_millis(200)).await;
    let _ = session.drain(Duration::from_millis(500)).await?;
    session.reset_order_ids();
    Ok(())
}

/// The interleaved send/drain loop shared by every load shape.
async fn run_load(session: &mut Session, plan: &Plan) -> ScenarioOutcome {
    let pacing = pacing_for(plan.iterations);
    let pair = matches!(plan.shape, Shape::MatchingPair);

    let expected_acks = if pair {
        2 * plan.iterations
    } else {
        plan.iterations
    };
    let expected_trades = if pair { plan.iterations } else { 0 };

    // 10% progress buckets for small runs, 5% once six digits.
    let bucket = if plan.iterations >= 100_000 { 20 } else { 10 };
    let progress_every = (plan.iterations / bucket).max(1);
    let drain_target = 5 * pacing.pairs_per_batch;

    let mut stats = ScenarioStats::default();
    let start = Instant::now();

    for i in 0..plan.iterations {
        let symbol = plan.symbols[(i % plan.symbols.len() as u64) as usize];
        // Vary prices a little so the books are not one fat level;
        // pairs stay self-matching because buy and sell use the same
        // price.
        let price = 10_000 + (i % 500) as u32;

        if let Err(e) = send_iteration(session, symbol, price, pair).await {
            error!("send failed at iteration {i}: {e:#}");
            session.close().await;
            report(plan, &stats, start.elapsed(), expected_acks, expected_trades);
            return ScenarioOutcome::Failed {
                stats,
                reason: FailureReason::SendErrors,
            };
        }

        if i > 0 && i % pacing.pairs_per_batch == 0 {
            if let Err(e) = drain_burst(session, &mut stats, drain_target).await {
                error!("drain failed at iteration {i}: {e:#}");
                session.close().await;
                report(plan, &stats, start.elapsed(), expected_acks, expected_trades);
                return ScenarioOutcome::Failed {
                    stats,
                    reason: FailureReason::SendErrors,
                };
            }
            sleep(pacing.inter_batch_sleep).await;
        }

        if i > 0 && i % progress_every == 0 {
            let elapsed = start.elapsed().as_secs_f64();
            let pct = 100.0 * i as f64 / plan.iterations as f64;
            let rate = i as f64 / elapsed.max(f64::EPSILON);
            info!(
                "progress {pct:5.1}% | {i} sent | {elapsed:7.1}s | {rate:9.0} pairs/s | {} events",
                stats.total_events()
            );
        }
    }

    // Let in-flight writes reach the wire, then prove completeness.
    sleep(SETTLE).await;
    match session.drain(pacing.final_drain).await {
        Ok(tail) => {
            for incoming in &tail {
                stats.record(incoming);
            }
        }
        Err(e) => {
            warn!("final drain ended early: {e:#}");
        }
    }

    report(plan, &stats, start.elapsed(), expected_acks, expected_trades);
    validate(stats, expected_acks, expected_trades)
}

async fn send_iteration(
    session: &mut Session,
    symbol: &str,
    price: u32,
    pair: bool,
) -> anyhow::Result<()> {
    if pair {
        let buy_id = session.next_order_id();
        session
            .send_request(&Request::new_order(1, symbol, price, 10, Side::Buy, buy_id))
            .await?;
        let sell_id = session.next_order_id();
        session
            .send_request(&Request::new_order(2, symbol, price, 10, Side::Sell, sell_id))
            .await?;
    } else {
        let id = session.next_order_id();
        session
            .send_request(&Request::new_order(1, symbol, price, 10, Side::Buy, id))
            .await?;
    }
    Ok(())
}

/// Aggressively consume up to `target` queued events with a tight
/// per-poll deadline. Keeps the peer's outbound buffers shallow
/// without stalling the send loop.
async fn drain_burst(
    session: &mut Session,
    stats: &mut ScenarioStats,
    target: u64,
) -> anyhow::Result<()> {
    for _ in 0..target {
        match session.recv(BURST_POLL).await? {
            Some(incoming) => stats.record(&incoming),
            None => break,
        }
    }
    Ok(())
}

/// Order + cancel flow (scenario 3): one resting order, withdrawn.
async fn run_cancel_flow(session: &mut Session, plan: &Plan) -> ScenarioOutcome {
    let symbol = plan.symbols[0];
    let mut stats = ScenarioStats::default();
    let start = Instant::now();

    let order_id = session.next_order_id();
    let result = async {
        session
            .send_request(&Request::new_order(1, symbol, 10_000, 10, Side::Buy, order_id))
            .await?;
        for incoming in session.drain(Duration::from_millis(500)).await? {
            stats.record(&incoming);
        }
        session
            .send_request(&Request::cancel(1, symbol, order_id))
            .await?;
        anyhow::Ok(())
    }
    .await;

    if let Err(e) = result {
        error!("cancel flow failed: {e:#}");
        session.close().await;
        return ScenarioOutcome::Failed {
            stats,
            reason: FailureReason::SendErrors,
        };
    }

    sleep(SETTLE).await;
    if let Ok(tail) = session.drain(Duration::from_secs(60)).await {
        for incoming in &tail {
            stats.record(incoming);
        }
    }

    report(plan, &stats, start.elapsed(), 1, 0);
    validate(stats, 1, 0)
}

fn report(
    plan: &Plan,
    stats: &ScenarioStats,
    elapsed: Duration,
    expected_acks: u64,
    expected_trades: u64,
) {
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    info!(
        "scenario '{}' done in {secs:.1}s: {stats} ({:.0} events/s)",
        plan.name,
        stats.total_events() as f64 / secs
    );
    if stats.acks < expected_acks {
        warn!(
            "acks short by {} (got {}, expected {expected_acks})",
            expected_acks - stats.acks,
            stats.acks
        );
    }
    if stats.trades < expected_trades {
        warn!(
            "trades short by {} (got {}, expected {expected_trades})",
            expected_trades - stats.trades,
            stats.trades
        );
    }
}

/// A run passes iff every expected ack arrived, every expected trade
/// arrived, and nothing was rejected. Top-of-book counts are
/// implementation-defined and not validated hard.
fn validate(stats: ScenarioStats, expected_acks: u64, expected_trades: u64) -> ScenarioOutcome {
    let outcome = if stats.rejects > 0 {
        ScenarioOutcome::Failed {
            stats,
            reason: FailureReason::Rejects,
        }
    } else if stats.acks < expected_acks {
        ScenarioOutcome::Failed {
            stats,
            reason: FailureReason::MissingAcks,
        }
    } else if expected_trades > 0 && stats.trades < expected_trades {
        ScenarioOutcome::Failed {
            stats,
            reason: FailureReason::MissingTrades,
        }
    } else {
        ScenarioOutcome::Passed { stats }
    };

    match &outcome {
        ScenarioOutcome::Passed { .. } => println!("*** TEST PASSED ***"),
        ScenarioOutcome::Failed { reason, .. } => {
            println!("*** TEST FAILED *** ({reason:?})");
        }
    }
    outcome
}
