// Opens the bus and runs the sequencer to completion
// The sequencer blocks on the serial port, so it runs on tokio's blocking pool
// while the async side waits for either the result or Ctrl-C.

use tokio::task;
use tracing::{info, warn};

use crate::config::Config;
use crate::messages::RunSummary;
use crate::motor::{CancelToken, DynamixelBus, PollPolicy, shared};
use crate::sequencer::{Rig, Sequencer};

pub async fn run(config: Config) -> Result<RunSummary, Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening motor bus on {}", config.port);
    let bus = shared(DynamixelBus::open(&config.port)?);

    let cancel = CancelToken::new();
    let poll = PollPolicy {
        deadline: config.wait_timeout,
        cancel: cancel.clone(),
        ..PollPolicy::default()
    };
    let rig = Rig::new(bus, poll);

    info!(
        "Sequence: home={}, run={}, unload={}",
        config.home, config.run, config.unload
    );
    let sequencer = Sequencer::new(rig, config);
    let mut worker = task::spawn_blocking(move || sequencer.run());

    let summary = tokio::select! {
        result = &mut worker => result??,
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping after the current bus transaction");
            cancel.cancel();
            worker.await??
        }
    };

    info!("Run complete: {}", serde_json::to_string(&summary)?);
    Ok(summary)
}
