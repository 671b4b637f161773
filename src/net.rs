use std::net::SocketAddr;

use anyhow::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use hound::{SampleFormat, WavSpec};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::config::DeviceConfig;
use crate::constants::BIT_DEPTH;
use crate::metadata::Sample;
use crate::mixer::MixerOutput;

/// Format of the endless WAV stream for a device's output.
pub fn wav_spec(device: &DeviceConfig) -> WavSpec {
    WavSpec {
        channels: device.channels,
        sample_rate: device.sample_rate,
        bits_per_sample: BIT_DEPTH,
        sample_format: SampleFormat::Int,
    }
}

pub fn encode_samples(samples: &[Sample]) -> Vec<u8> {
    let mut wav_data: Vec<u8> = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        // Writing into a Vec cannot fail
        let _ = WriteBytesExt::write_i16::<LittleEndian>(&mut wav_data, sample);
    }
    wav_data
}

/// Serve the mixer output as WAV to every client connecting to `listener`.
pub fn serve(listener: TcpListener, spec: WavSpec, source: MixerOutput) {
    tokio::spawn(async move {
        loop {
            match accept(&listener, spec, &source).await {
                Ok(addr) => info!("Accepted connection from {addr}"),
                Err(e) => warn!("Failed to accept connection: {e}"),
            }
        }
    });
}

/// Bind `listen_addr` and start serving in the background.
pub async fn start(listen_addr: &str, device: &DeviceConfig, source: MixerOutput) -> Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    serve(listener, wav_spec(device), source);
    Ok(())
}

async fn accept(listener: &TcpListener, spec: WavSpec, source: &MixerOutput) -> Result<SocketAddr> {
    let (stream, addr) = listener.accept().await?;

    let source = source.clone();
    tokio::spawn(async move {
        if let Err(e) = stream_to(stream, spec, source).await {
            debug!("Client {addr} disconnected: {e}");
        }
    });

    Ok(addr)
}

async fn stream_to(mut stream: TcpStream, spec: WavSpec, mut source: MixerOutput) -> Result<()> {
    // The header lets players recognize the stream as a wav file
    let header = spec.into_header_for_infinite_file();
    stream.write_all(&header[..]).await?;

    loop {
        source.changed().await?;

        let samples = source.borrow_and_update().clone();
        stream.write_all(&encode_samples(&samples)).await?;
    }
}
