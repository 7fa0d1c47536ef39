//! CPAL output device

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfig};
use rtrb::{Consumer, RingBuffer};
use tracing::{error, info};

use crate::error::Error;
use crate::host::{AudioHost, OutputStream, StreamInfo};
use crate::nodes::RtrbSink;

/// The system's default output device.
#[derive(Default)]
pub struct CpalHost {
    /// Ring buffer length in seconds of audio
    buffer_secs: f32,
}

impl CpalHost {
    pub fn new() -> Self {
        Self { buffer_secs: 0.1 }
    }

    pub fn with_buffer_secs(mut self, secs: f32) -> Self {
        self.buffer_secs = secs.max(0.01);
        self
    }
}

impl AudioHost for CpalHost {
    type Sink = RtrbSink;
    type Stream = CpalStream;

    fn open(&mut self) -> Result<(RtrbSink, CpalStream, StreamInfo), Error> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(Error::UnsupportedPlatform)?;
        let config = device
            .default_output_config()
            .map_err(|_| Error::UnsupportedPlatform)?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());

        let channels = config.channels();
        let sample_rate = config.sample_rate().0;

        // Ring buffer sized to handle scheduling jitter
        let buffer_secs = if self.buffer_secs > 0.0 { self.buffer_secs } else { 0.1 };
        let buffer_samples = ((sample_rate as f32 * buffer_secs) as usize) * channels as usize;
        let capacity = buffer_samples.next_power_of_two().max(8192);
        let (producer, consumer) = RingBuffer::<f32>::new(capacity);

        let consumed = Arc::new(AtomicUsize::new(0));
        let stream = build_stream(&device, &config, consumer, Arc::clone(&consumed))
            .map_err(|e| Error::Stream(e.to_string()))?;
        // some backends start streams immediately
        stream.pause().map_err(|e| Error::Stream(e.to_string()))?;

        info!(device = %name, sample_rate, channels, "opened output");

        let info = StreamInfo {
            sample_rate,
            channels,
            capacity,
        };
        Ok((
            RtrbSink::new(producer, channels as usize),
            CpalStream { stream, consumed },
            info,
        ))
    }
}

/// A live cpal stream. Not `Send` on every platform, which is fine: the
/// context that owns it never leaves the control thread.
pub struct CpalStream {
    stream: cpal::Stream,
    consumed: Arc<AtomicUsize>,
}

impl OutputStream for CpalStream {
    fn resume(&mut self) -> Result<(), Error> {
        self.stream.play().map_err(|e| Error::Stream(e.to_string()))
    }

    fn suspend(&mut self) -> Result<(), Error> {
        self.stream.pause().map_err(|e| Error::Stream(e.to_string()))
    }

    fn samples_consumed(&self) -> usize {
        self.consumed.load(Ordering::Relaxed)
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &SupportedStreamConfig,
    mut consumer: Consumer<f32>,
    samples_consumed: Arc<AtomicUsize>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let stream_config = config.config();
    let on_error = |err: cpal::StreamError| error!("cpal stream error: {:?}", err);

    // Underruns play silence; samples are only counted when actually popped
    // so the producer side never overfills.
    match config.sample_format() {
        SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _| {
                let mut popped = 0;
                for sample in data.iter_mut() {
                    *sample = match consumer.pop() {
                        Ok(s) => {
                            popped += 1;
                            s
                        }
                        Err(_) => 0.0,
                    };
                }
                samples_consumed.fetch_add(popped, Ordering::Relaxed);
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [i16], _| {
                let mut popped = 0;
                for sample in data.iter_mut() {
                    let s = match consumer.pop() {
                        Ok(s) => {
                            popped += 1;
                            s
                        }
                        Err(_) => 0.0,
                    };
                    *sample = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                }
                samples_consumed.fetch_add(popped, Ordering::Relaxed);
            },
            on_error,
            None,
        ),
        SampleFormat::U16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [u16], _| {
                let mut popped = 0;
                for sample in data.iter_mut() {
                    let s = match consumer.pop() {
                        Ok(s) => {
                            popped += 1;
                            s
                        }
                        Err(_) => 0.0,
                    };
                    *sample = ((s.clamp(-1.0, 1.0) + 1.0) * 0.5 * u16::MAX as f32) as u16;
                }
                samples_consumed.fetch_add(popped, Ordering::Relaxed);
            },
            on_error,
            None,
        ),
        _ => Err(cpal::BuildStreamError::StreamConfigNotSupported),
    }
}
