//! Event loop driving an [`Allocator`] from line-oriented input.
//!
//! Every stimulus (an inbound line, a heartbeat tick, Ctrl-C) is handled to
//! completion before the next one is looked at, so the allocator needs no
//! locking. After each stimulus the outbox is pumped into the bus.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bus::{OutboxReceiver, StdioBus, pump};
use crate::control::{Allocator, Clock, Dispatch, Tick};
use crate::error::Result;
use crate::io::PassCsvWriter;

/// Runs the allocator against stdin/stdout until shutdown completes.
///
/// Inbound lines are `<topic> <payload>`; outbound messages are written to
/// stdout in the same form. Pass reports go to `telemetry_out` as CSV when
/// given.
///
/// # Errors
///
/// Returns an error if stdin cannot be read, stdout cannot be written or the
/// telemetry file cannot be created or written.
pub async fn run_stdio<K: Clock>(
    allocator: &mut Allocator<K>,
    outbox: &mut OutboxReceiver,
    telemetry_out: Option<&Path>,
) -> Result<()> {
    let mut telemetry = telemetry_out.map(PassCsvWriter::create).transpose()?;
    let mut bus = StdioBus::new(std::io::stdout().lock());
    let input = BufReader::new(tokio::io::stdin());
    run(allocator, outbox, input, &mut bus, telemetry.as_mut()).await
}

/// Same as [`run_stdio`] over an arbitrary reader and bus.
///
/// Reaching the end of `input` triggers a stop, as does Ctrl-C.
///
/// # Errors
///
/// Returns the first read, bus or telemetry error.
pub async fn run<K, R, W, T>(
    allocator: &mut Allocator<K>,
    outbox: &mut OutboxReceiver,
    input: R,
    bus: &mut StdioBus<W>,
    mut telemetry: Option<&mut PassCsvWriter<T>>,
) -> Result<()>
where
    K: Clock,
    R: AsyncBufRead + Unpin,
    W: Write,
    T: Write,
{
    let period = Duration::from_millis(allocator.timing().tick_ms.max(1));
    let grace = Duration::from_millis(allocator.timing().stop_grace_ms);
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut lines = input.lines();
    let mut input_open = true;

    allocator.start();
    pump(outbox, bus)?;

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => match line? {
                Some(line) => {
                    let Some((topic, payload)) = bus.accept(&line) else {
                        continue;
                    };
                    if let Dispatch::Power(Some(report)) = allocator.handle_message(&topic, &payload) {
                        debug!(%report, "pass");
                        if let Some(t) = telemetry.as_mut() {
                            t.write(&report)?;
                        }
                    }
                }
                None => {
                    info!("input closed");
                    input_open = false;
                    allocator.stop();
                    ticker = time::interval_at(Instant::now() + grace, period);
                }
            },
            _ = ticker.tick() => {
                if allocator.tick() == Tick::Stopped {
                    pump(outbox, bus)?;
                    break;
                }
            }
            _ = signal::ctrl_c(), if !allocator.is_stopping() => {
                warn!("received Ctrl+C, shutting down");
                allocator.stop();
                ticker = time::interval_at(Instant::now() + grace, period);
            }
        }

        if pump(outbox, bus)? {
            break;
        }
    }

    Ok(())
}
