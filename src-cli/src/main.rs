//! sonance-play: plays a list of tracks gaplessly through one pipeline

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use sonance_core::{
    BufferConsumer, Easing, FactoryConfig, FaderDirection, PipelineFactory, PipelineSignal,
    SpectrumConsumer, State, NSECONDS_PER_MSECOND,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{track_uri, Args};

const DISPATCH_INTERVAL: Duration = Duration::from_millis(50);
const SPECTRUM_FPS: u32 = 20;
const BARS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if args.list_devices {
        return list_devices();
    }
    if args.tracks.is_empty() {
        bail!("no tracks given");
    }
    let uris = args
        .tracks
        .iter()
        .map(String::as_str)
        .map(track_uri)
        .collect::<Result<Vec<_>>>()?;

    let factory = PipelineFactory::new(FactoryConfig::default())?;
    let mut pipeline = factory.create_pipeline_with(args.pipeline_config()?)?;
    pipeline.init_from_url(&uris[0], &args.tracks[0], 0)?;

    pipeline.set_volume(args.volume);
    if let Some(balance) = args.balance {
        pipeline.set_stereo_balance(balance)?;
    }
    if let Some((preamp, gains)) = args.equalizer()? {
        pipeline.set_equalizer_params(preamp, gains);
    }

    let spectrum = args.spectrum.then(|| {
        let consumer = Arc::new(SpectrumConsumer::new(44100.0, SPECTRUM_FPS));
        pipeline.add_buffer_consumer(Arc::clone(&consumer) as Arc<dyn BufferConsumer>);
        consumer
    });

    let mut current = 0;
    if let Some(next) = uris.get(1) {
        pipeline.set_next_url(next, &args.tracks[1], 0, 0);
    }
    if let Some(ms) = args.fade_in_ms {
        pipeline.start_fader(
            ms * NSECONDS_PER_MSECOND,
            FaderDirection::Forward,
            Easing::default(),
            false,
        );
    }

    info!("Playing {}", args.tracks[0]);
    pipeline.set_state(State::Playing);

    loop {
        pipeline.dispatch_timeout(DISPATCH_INTERVAL);

        for signal in factory.signals().try_iter() {
            if args.json {
                println!("{}", serde_json::to_string(&signal)?);
            }
            match signal {
                PipelineSignal::EndOfStreamReached {
                    has_next_track: true,
                    ..
                } => {
                    current += 1;
                    if let Some(track) = args.tracks.get(current) {
                        info!("Playing {}", track);
                    }
                    if let Some(next) = uris.get(current + 1) {
                        pipeline.set_next_url(next, &args.tracks[current + 1], 0, 0);
                    }
                }
                PipelineSignal::EndOfStreamReached { .. } => {
                    info!("Finished after {} track(s)", current + 1);
                    pipeline.remove_all_buffer_consumers();
                    return Ok(());
                }
                PipelineSignal::Error { message, .. } => bail!("playback failed: {}", message),
                PipelineSignal::MetadataFound { bundle, .. } => {
                    if !bundle.title.is_empty() {
                        info!("{} - {}", bundle.artist, bundle.title);
                    } else if bundle.samplerate > 0 {
                        info!(
                            "{}: {} Hz, {} bit, {} kbit/s",
                            bundle.filetype, bundle.samplerate, bundle.bitdepth, bundle.bitrate
                        );
                    }
                }
                PipelineSignal::BufferingStarted { .. } => warn!("Buffering..."),
                _ => {}
            }
        }

        if let Some(spectrum) = &spectrum {
            if spectrum.update() {
                let line: String = spectrum
                    .spectrum()
                    .iter()
                    .map(|level| BARS[(level.clamp(0.0, 1.0) * 8.0) as usize])
                    .collect();
                eprint!("\r{}", line);
            }
        }
    }
}

#[cfg(feature = "device-output")]
fn list_devices() -> Result<()> {
    for device in sonance_core::OutputDevice::enumerate()? {
        let marker = if device.is_default { "*" } else { " " };
        println!(
            "{} {} ({} ch, {:?} Hz)",
            marker, device.name, device.max_channels, device.sample_rates
        );
    }
    Ok(())
}

#[cfg(not(feature = "device-output"))]
fn list_devices() -> Result<()> {
    bail!("built without the device-output feature")
}
