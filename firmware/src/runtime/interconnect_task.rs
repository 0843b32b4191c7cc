use core::sync::atomic::Ordering;

use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Ticker};

use super::{CONSOLE_ATTACHED, CONSOLE_LINES, CONSOLE_REPLIES, FirmwareExecutor};
use crate::console::{post_reply, render_notice, render_response};
use crate::telemetry::{self, FirmwareInstant};

/// Owns the controller: runs the autodetect tick and serves console lines.
///
/// Ticks and commands are handled on the same task, so a manual command
/// never interleaves with an in-flight route sequence. Replies are posted
/// without waiting; a full reply queue drops the reply, never the tick.
#[embassy_executor::task]
pub async fn run(mut executor: FirmwareExecutor) -> ! {
    let period = Duration::try_from(executor.controller().config().tick_period)
        .unwrap_or(Duration::from_millis(250));
    let mut ticker = Ticker::every(period);
    let lines = CONSOLE_LINES.receiver();
    let mut mirrored = executor.telemetry().next_event_id();

    loop {
        match select(ticker.next(), lines.receive()).await {
            Either::First(()) => {
                if let Some(transition) = executor.tick(FirmwareInstant::now()) {
                    if CONSOLE_ATTACHED.load(Ordering::Relaxed)
                        && !post_reply(&CONSOLE_REPLIES, render_notice(transition))
                    {
                        defmt::warn!("console: reply queue full, notice dropped");
                    }
                }
            }
            Either::Second(line) => {
                let reply = render_response(&mut executor, &line, FirmwareInstant::now());
                if !post_reply(&CONSOLE_REPLIES, reply) {
                    defmt::warn!(
                        "console: reply queue full, response to `{}` dropped",
                        line.as_str()
                    );
                }
            }
        }

        mirrored = telemetry::mirror(executor.telemetry(), mirrored);
    }
}
