// Record-mode capture driven against the mock WaveForms runtime.
//
// Shows the full device lifecycle: scan, open, configure, start with a
// digital trigger, poll on the profile's period, stop, close.

use std::thread;

use clap::Parser;
use discovery2_rs::mock::MockWaveforms;
use discovery2_rs::waveforms::{AcquisitionState, RecordStatus};
use discovery2_rs::{
    Acquisition, DiscoveryConnector, LogicCapture, PollOutcome, TriggerMatch, TriggerSpec,
    TriggerStage,
};

#[derive(Parser)]
#[command(about = "Capture logic samples from a (mock) Analog Discovery 2")]
struct Args {
    /// Sample rate in Hz
    #[arg(long, default_value_t = 100)]
    samplerate: u64,

    /// Stop after this many samples
    #[arg(long, default_value_t = 1024)]
    limit: u64,

    /// Trigger conditions as channel=kind pairs, e.g. 3=rising,5=zero
    #[arg(long, value_delimiter = ',')]
    trigger: Vec<String>,
}

fn parse_trigger(pairs: &[String]) -> Result<Option<TriggerSpec>, Box<dyn std::error::Error>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut stage = TriggerStage::new();
    for pair in pairs {
        let (channel, kind) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected channel=kind, got '{pair}'"))?;
        let channel: u16 = channel.parse()?;
        let kind: TriggerMatch = kind.parse()?;
        stage = stage.channel(channel, kind);
    }
    Ok(Some(stage.into()))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    // Scripted hardware: one armed poll, then 256-sample batches until the
    // requested limit is covered.
    let mut sdk = MockWaveforms::new().with_device("Analog Discovery 2", "210321A7");
    sdk.push_poll(RecordStatus::default(), AcquisitionState::Armed);
    for _ in 0..(args.limit / 256 + 1) {
        sdk.push_poll(
            RecordStatus {
                available: 256,
                lost: 0,
                corrupt: 0,
            },
            AcquisitionState::Running,
        );
    }

    let mut entries = DiscoveryConnector::scan(&mut sdk)?;
    println!("found {} device(s)", entries.len());
    let mut entry = entries.remove(0);
    println!(
        "using {} {} (serial {}, version {})",
        entry.identity.vendor, entry.identity.model, entry.identity.serial, entry.identity.version
    );

    entry.session.open(&mut sdk)?;
    entry.session.set_samplerate(args.samplerate)?;

    let trigger = parse_trigger(&args.trigger)?;
    let mut capture = LogicCapture::new(entry.session.samplerate());
    let mut acq = Acquisition::new(entry.session.profile()).with_sample_limit(args.limit);

    acq.start(&entry.session, &mut sdk, trigger.as_ref(), &mut capture)?;
    let period = entry.session.profile().poll_period;
    while acq.poll(&entry.session, &mut sdk, &mut capture)? == PollOutcome::Continue {
        thread::sleep(period);
    }
    acq.stop(&mut capture);
    entry.session.close(&mut sdk);

    println!(
        "captured {} samples ({} stream faults)",
        capture.sample_count(),
        acq.stream_faults()
    );

    let mut df = capture.to_dataframe()?;
    LogicCapture::extract_bits(&mut df, entry.session.profile().logic_channels)?;
    println!("capture table: {} rows x {} columns", df.height(), df.width());

    let preview: Vec<u16> = capture.samples().into_iter().take(8).collect();
    println!("first samples: {preview:?}");

    Ok(())
}
