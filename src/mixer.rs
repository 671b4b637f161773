use crate::device::SoftDevice;
use crate::metadata::Sample;
use std::sync::Arc;
use tokio::sync::watch;

const TARGET_CHUNK_SIZE: usize = 128;

/// Interleaved device output, one chunk per mixer tick.
pub type MixerOutput = watch::Receiver<Vec<Sample>>;

/// Render `device` in real time, publishing every chunk to the returned receiver.
///
/// Voices only consume their queues while this task runs.
pub fn start(device: Arc<SoftDevice>) -> MixerOutput {
    let (tx, rx) = watch::channel(Default::default());
    let sample_rate = device.config().sample_rate;

    tokio::spawn(async move {
        let start_time = std::time::Instant::now();
        let mut frame_send_count = 0;

        let sleep_time = std::time::Duration::from_micros(
            ((TARGET_CHUNK_SIZE as f64 / sample_rate as f64) * 1_000_000.0) as u64,
        );

        loop {
            let expected_sent_frames =
                ((start_time.elapsed() + sleep_time).as_secs_f64() * sample_rate as f64) as u64;

            let chunk_size = expected_sent_frames.saturating_sub(frame_send_count) as usize;
            let chunk = device.render(chunk_size);

            if tx.send(chunk).is_err() {
                debug!("Mixer output has no listeners left, stopping");
                break;
            }
            frame_send_count += chunk_size as u64;

            tokio::time::sleep(sleep_time).await;
        }
    });

    rx
}
