// Streaming defaults
pub const BUFFER_COUNT: usize = 3; // device buffers per streaming voice
pub const CHUNK_SAMPLES: usize = 4096; // interleaved samples per buffer
pub const TICK_INTERVAL_MS: u64 = 1; // worker poll period, 0 = yield only

// Software device defaults
pub const SAMPLE_RATE: u32 = 44100; // 44.1 kHz sample rate
pub const BIT_DEPTH: u16 = 16; // 16 bits per sample
pub const CHANNELS: u16 = 2; // Stereo output
pub const MAX_VOICES: usize = 32;
pub const MAX_BUFFERS: usize = 256;

// Player defaults
pub const CONFIG_PATH: &str = "Config.toml";
pub const PLAYLIST_PATH: &str = "playlist.txt";
pub const LISTEN_ADDR: &str = "127.0.0.1:7878";
