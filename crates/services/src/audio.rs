// Copyright (c) 2024 Mike Tsao

//! [CpalAudioService] provides channel-based communication with the
//! [cpal](https://crates.io/crates/cpal) audio interface.

use crate::{AudioQueue, AudioSampleType, CrossbeamChannel, ProvidesService};
use anyhow::anyhow;
use core::fmt::Debug;
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, FromSample, Sample as CpalSample, SizedSample, Stream, StreamConfig,
    SupportedStreamConfig,
};
use crossbeam::channel::{Receiver, Sender};

/// A [CpalAudioServiceInput] tells [CpalAudioService] what to do. Audio frames
/// don't travel this way; write them to [CpalAudioService::queue()] instead.
#[derive(Debug)]
pub enum CpalAudioServiceInput {
    /// Asks the service to exit.
    Quit,
    /// Starts the underlying audio interface. It's unnecessary to send this for
    /// every new service, because a new service plays automatically upon
    /// creation.
    Play,
    /// Pauses the underlying audio interface.
    Pause,
}

/// A [CpalAudioServiceEvent] informs clients what's going on.
#[derive(Debug)]
pub enum CpalAudioServiceEvent {
    /// The service has initialized. Provides the sample rate and channel
    /// count.
    Reset(usize, u8),
    /// The audio interface needs audio frames ASAP. Push the specified number
    /// into the queue.
    FramesNeeded(usize),
    /// Sent when the audio interface asked for more frames than we had
    /// available in the ring buffer. The missing frames were played as
    /// silence; the value is how many.
    Underrun(usize),
}

/// Wrapper for cpal structs. [WrappedStream] exists for two reasons: first, to
/// implement [core::fmt::Debug] for the structs that don't, and second, because
/// the stream needs to live in its own thread, so we manage that here.
struct WrappedStream {
    queue: AudioQueue,

    sample_rate: usize,
    channel_count: u8,
}
impl Debug for WrappedStream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WrappedStream")
            .field("config", &"(skipped)")
            .field("cpal_stream", &"(skipped)")
            .field("queue_len", &self.queue.len())
            .finish()
    }
}
impl WrappedStream {
    /// period_size is the size, in frames, of a single group of frames in the
    /// audio buffer. <https://www.alsa-project.org/wiki/FramesPeriods>
    pub fn new_with(
        period_size: usize,
        sender: &Sender<CpalAudioServiceEvent>,
        receiver: &Receiver<CpalAudioServiceInput>,
    ) -> anyhow::Result<Self> {
        let (_host, device, config) = Self::host_device_setup()?;

        // The buffer holds three periods so that the hardware can consume one
        // while the software generates the next, with one spare.
        let buffer_size = period_size * 3;
        let queue = AudioQueue::new(buffer_size);

        // Stream creation needs to live in its own thread because it isn't
        // `Send`. See <https://github.com/RustAudio/cpal/issues/818> for more
        // discussion. The setup result comes back over a rendezvous channel so
        // that a broken device is reported to the caller rather than lost.
        let (setup_sender, setup_receiver) = crossbeam::channel::bounded::<anyhow::Result<()>>(1);
        let receiver = receiver.clone();
        let config_clone = config.clone();
        let queue_clone = queue.clone();
        let sender = sender.clone();
        std::thread::Builder::new()
            .name("cpal-stream".to_string())
            .spawn(move || {
                match Self::stream_setup_for(
                    &device,
                    config_clone,
                    period_size,
                    queue_clone,
                    sender,
                ) {
                    Ok(cpal_stream) => {
                        if let Err(e) = cpal_stream.play() {
                            let _ = setup_sender.send(Err(e.into()));
                            return;
                        }
                        let _ = setup_sender.send(Ok(()));
                        while let Ok(input) = receiver.recv() {
                            match input {
                                CpalAudioServiceInput::Play => {
                                    let _ = cpal_stream.play();
                                }
                                CpalAudioServiceInput::Pause => {
                                    let _ = cpal_stream.pause();
                                }
                                CpalAudioServiceInput::Quit => {
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = setup_sender.send(Err(e));
                    }
                }
            })?;
        setup_receiver
            .recv()
            .map_err(|_| anyhow!("Audio stream thread exited during setup"))??;

        Ok(Self {
            queue,
            sample_rate: config.sample_rate().0 as usize,
            channel_count: config.channels() as u8,
        })
    }

    /// Returns the default host, device, and stream config (all of which are
    /// cpal concepts).
    fn host_device_setup(
    ) -> anyhow::Result<(cpal::Host, cpal::Device, cpal::SupportedStreamConfig), anyhow::Error>
    {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::Error::msg("Default output device is not available"))?;
        let config = device.default_output_config()?;

        let config = SupportedStreamConfig::new(
            config.channels(),
            config.sample_rate(),
            *config.buffer_size(),
            config.sample_format(),
        );
        Ok((host, device, config))
    }

    /// Creates and returns a Stream for the given device and config. The Stream
    /// will consume the data in the supplied [AudioQueue]. This function is
    /// actually a wrapper around the generic [stream_make<T>()].
    fn stream_setup_for(
        device: &cpal::Device,
        config: SupportedStreamConfig,
        period_size: usize,
        queue: AudioQueue,
        sender: Sender<CpalAudioServiceEvent>,
    ) -> anyhow::Result<Stream, anyhow::Error> {
        let sample_format = config.sample_format();
        let mut config: StreamConfig = config.into();

        // We set buffer size here, rather than in host_device_setup(), because
        // it's troublesome to create a [cpal::SupportedBufferSize] on the fly.
        config.buffer_size = BufferSize::Fixed(period_size as u32);

        match sample_format {
            cpal::SampleFormat::I8 => {
                Self::stream_make::<i8>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::I16 => {
                Self::stream_make::<i16>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::I32 => {
                Self::stream_make::<i32>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::I64 => {
                Self::stream_make::<i64>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::U8 => {
                Self::stream_make::<u8>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::U16 => {
                Self::stream_make::<u16>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::U32 => {
                Self::stream_make::<u32>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::U64 => {
                Self::stream_make::<u64>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::F32 => {
                Self::stream_make::<f32>(&config, device, period_size, queue, sender)
            }
            cpal::SampleFormat::F64 => {
                Self::stream_make::<f64>(&config, device, period_size, queue, sender)
            }
            _ => Err(anyhow!("Unexpected sample format {sample_format:?}")),
        }
    }

    /// Generic portion of stream_setup_for().
    fn stream_make<T>(
        config: &cpal::StreamConfig,
        device: &cpal::Device,
        period_size: usize,
        queue: AudioQueue,
        sender: Sender<CpalAudioServiceEvent>,
    ) -> Result<Stream, anyhow::Error>
    where
        T: SizedSample + FromSample<AudioSampleType>,
    {
        let err_fn = |err| log::error!("Error building output sound stream: {}", err);

        let channel_count = config.channels as usize;
        let stream = device.build_output_stream(
            config,
            move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
                Self::on_window(output, channel_count, period_size, &queue, &sender)
            },
            err_fn,
            None,
        )?;
        Ok(stream)
    }

    /// cpal callback that supplies samples from the AudioQueue, converting them
    /// if needed to the stream's expected data type. Frames the queue can't
    /// supply are played as silence.
    fn on_window<T>(
        output: &mut [T],
        channel_count: usize,
        period_size: usize,
        queue: &AudioQueue,
        sender: &Sender<CpalAudioServiceEvent>,
    ) where
        T: CpalSample + FromSample<AudioSampleType>,
    {
        let have_len = queue.len();
        let need_len = output.len() / channel_count.max(1);

        // Calculate how many frames we should request.
        let request_len = if have_len < need_len {
            // We're at risk of underrun. Increase work amount beyond what we're
            // about to consume.
            need_len * 2
        } else if have_len > need_len * 2 {
            // We are far ahead of the current window's needs. Replace only half
            // of the current request.
            need_len / 2
        } else {
            // We're keeping up. Replace exactly what we're about to consume.
            need_len
        }
        .min(period_size);

        let mut missing = 0;
        for frame in output.chunks_exact_mut(channel_count) {
            let sample = queue.pop().unwrap_or_else(|| {
                missing += 1;
                (0.0, 0.0)
            });
            frame[0] = T::from_sample(sample.0);
            if channel_count > 1 {
                frame[1] = T::from_sample(sample.1);
                for extra in frame.iter_mut().skip(2) {
                    *extra = T::EQUILIBRIUM;
                }
            }
        }
        if missing > 0 {
            let _ = sender.try_send(CpalAudioServiceEvent::Underrun(missing));
        }

        // Don't ask for more than the queue can hold.
        let request_len = (queue.capacity() - queue.len()).min(request_len);
        if request_len > 0 {
            let _ = sender.try_send(CpalAudioServiceEvent::FramesNeeded(request_len));
        }
    }

    fn sample_rate(&self) -> usize {
        self.sample_rate
    }

    fn channel_count(&self) -> u8 {
        self.channel_count
    }
}

/// [CpalAudioService] provides channel-based communication with the cpal audio
/// interface.
#[derive(Debug)]
pub struct CpalAudioService {
    inputs: CrossbeamChannel<CpalAudioServiceInput>,
    events: CrossbeamChannel<CpalAudioServiceEvent>,

    /// The cpal audio stream.
    stream: WrappedStream,
}
impl ProvidesService<CpalAudioServiceInput, CpalAudioServiceEvent> for CpalAudioService {
    fn receiver(&self) -> &Receiver<CpalAudioServiceEvent> {
        &self.events.receiver
    }

    fn sender(&self) -> &Sender<CpalAudioServiceInput> {
        &self.inputs.sender
    }
}
impl CpalAudioService {
    /// A reasonable period size. This value is on the upper edge of perceptible
    /// latency for 44.1KHz (512 / 44100 = 11.6 milliseconds).
    pub const SUGGESTED_PERIOD_SIZE: usize = 512;

    /// Creates a new [CpalAudioService] with an internal buffer whose size is
    /// based on the given period size, or a reasonable default if none is
    /// provided. A "period" is a chunk of the audio buffer that the audio
    /// interface reads at once.
    ///
    /// Fails if there is no usable output device.
    pub fn new_with(period_size: Option<usize>) -> anyhow::Result<Self> {
        let inputs: CrossbeamChannel<CpalAudioServiceInput> = Default::default();
        let events: CrossbeamChannel<CpalAudioServiceEvent> = Default::default();
        let period_size = period_size.unwrap_or(Self::SUGGESTED_PERIOD_SIZE);
        let stream = WrappedStream::new_with(period_size, &events.sender, &inputs.receiver)?;
        let audio_service = Self {
            inputs,
            events,
            stream,
        };
        let _ = audio_service
            .events
            .sender
            .send(CpalAudioServiceEvent::Reset(
                audio_service.stream.sample_rate(),
                audio_service.stream.channel_count(),
            ));
        Ok(audio_service)
    }

    /// The queue the audio interface reads from. Frames pushed here are played
    /// in order.
    pub fn queue(&self) -> AudioQueue {
        self.stream.queue.clone()
    }

    /// The device's sample rate.
    pub fn sample_rate(&self) -> usize {
        self.stream.sample_rate()
    }
}
impl Drop for CpalAudioService {
    fn drop(&mut self) {
        let _ = self.inputs.sender.send(CpalAudioServiceInput::Quit);
    }
}
