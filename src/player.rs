//! Playlist driven music player used by the binary.

use crate::constants::{CONFIG_PATH, PLAYLIST_PATH};
use crate::error::Error;
use crate::music::Music;
use crate::pcm::Pcm;
use crate::stdin::Command;
use crate::stream_source::State;
use crate::units::Length;
use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

pub const USAGE: &str =
    "usage: gapless [-p|--preload] [-c|--config <path>] [playlist.txt] <file>...";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Decode while playing
    #[default]
    Stream,
    /// Decode whole tracks up front, neighbours in the background
    Preload,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Args {
    pub mode: Mode,
    pub config: PathBuf,
    pub tracks: Vec<PathBuf>,
}

impl Args {
    pub fn parse<I, S>(args: I) -> Result<Args>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::parse_with_default(args, Path::new(PLAYLIST_PATH))
    }

    /// `default_playlist` is read when no tracks are given on the command line.
    pub fn parse_with_default<I, S>(args: I, default_playlist: &Path) -> Result<Args>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut mode = Mode::Stream;
        let mut config = PathBuf::from(CONFIG_PATH);
        let mut tracks = Vec::new();

        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-p" | "--preload" => mode = Mode::Preload,
                "-c" | "--config" => {
                    config = args
                        .next()
                        .ok_or_else(|| anyhow!("{arg} expects a path"))?
                        .into();
                }
                flag if flag.starts_with('-') && flag.len() > 1 => {
                    bail!("unknown option {flag}")
                }
                path if is_playlist(Path::new(path)) => tracks.extend(read_playlist(path)?),
                path => tracks.push(PathBuf::from(path)),
            }
        }

        if tracks.is_empty() && default_playlist.exists() {
            tracks = read_playlist(default_playlist)?;
        }
        if tracks.is_empty() {
            bail!("no tracks to play");
        }

        Ok(Args {
            mode,
            config,
            tracks,
        })
    }
}

fn is_playlist(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

/// One track per line; blank lines and `#` comments are skipped. Relative paths are resolved
/// against the playlist's own directory.
pub fn read_playlist<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read playlist {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| base.join(line))
        .collect())
}

pub struct Playlist {
    tracks: Vec<PathBuf>,
    current: usize,
    mode: Mode,
    /// Background decodes of the tracks around `current`
    decoding: HashMap<usize, JoinHandle<crate::Result<Pcm>>>,
}

impl Playlist {
    pub fn new(tracks: Vec<PathBuf>, mode: Mode) -> Self {
        Playlist {
            tracks,
            current: 0,
            mode,
            decoding: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.tracks.get(self.current).map(PathBuf::as_path)
    }

    pub fn advance(&mut self) -> bool {
        if self.current + 1 < self.tracks.len() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    pub fn retreat(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    /// Drop the current track; the following one becomes current.
    pub fn remove_current(&mut self) {
        if self.current < self.tracks.len() {
            self.tracks.remove(self.current);
            self.decoding.clear();
        }
    }

    /// Hand the current track to `music`, by path or as a decoded clip depending on the mode.
    pub fn load_into(&mut self, music: &Music) -> crate::Result<()> {
        let path = self
            .current_path()
            .ok_or_else(|| Error::InvalidValue("playlist is exhausted".to_string()))?
            .to_path_buf();

        match self.mode {
            Mode::Stream => music.open(&path),
            Mode::Preload => {
                let pcm = self.take_decoded(self.current, &path)?;
                music.preload(pcm)?;
                self.prefetch();
                Ok(())
            }
        }
    }

    fn take_decoded(&mut self, index: usize, path: &Path) -> crate::Result<Pcm> {
        match self.decoding.remove(&index) {
            Some(handle) => handle.join().map_err(|_| Error::Unknown)?,
            None => Pcm::from_file(path, None),
        }
    }

    fn prefetch(&mut self) {
        let wanted = [
            self.current.checked_sub(1),
            Some(self.current + 1).filter(|&next| next < self.tracks.len()),
        ];

        self.decoding.retain(|index, _| wanted.contains(&Some(*index)));
        for index in wanted.into_iter().flatten() {
            if self.decoding.contains_key(&index) {
                continue;
            }
            let path = self.tracks[index].clone();
            debug!("Decoding {} in the background", path.display());
            self.decoding
                .insert(index, std::thread::spawn(move || Pcm::from_file(path, None)));
        }
    }
}

pub struct Player {
    music: Music,
    playlist: Playlist,
    /// Playing on the user's behalf; a stop in this state means the track ran out
    active: bool,
}

impl Player {
    pub fn new(music: Music, playlist: Playlist) -> Self {
        Player {
            music,
            playlist,
            active: false,
        }
    }

    pub fn music(&self) -> &Music {
        &self.music
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// Load the current track, dropping tracks that fail to open.
    pub fn load(&mut self) -> bool {
        while let Some(path) = self.playlist.current_path().map(Path::to_path_buf) {
            match self.playlist.load_into(&self.music) {
                Ok(()) => {
                    info!(
                        "Loaded {} ({}, {}, {})",
                        path.display(),
                        Length::from(self.music.length()),
                        self.music.sample_rate(),
                        self.music.size()
                    );
                    return true;
                }
                Err(e) => {
                    warn!("Skipping {}: {e}", path.display());
                    self.playlist.remove_current();
                }
            }
        }
        false
    }

    pub fn start(&mut self) -> bool {
        self.load() && self.play()
    }

    fn play(&mut self) -> bool {
        self.active = self.music.play();
        self.active
    }

    fn next(&mut self) -> bool {
        if !self.playlist.advance() {
            info!("End of playlist");
            self.active = false;
            return false;
        }
        self.load() && self.play()
    }

    fn previous(&mut self) -> bool {
        if !self.playlist.retreat() {
            return false;
        }
        self.load() && self.play()
    }

    /// Apply one command. Returns false once the player should quit.
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Seek(secs) => {
                if let Err(e) = self.music.seek(secs) {
                    warn!("Seek failed: {e}");
                }
            }
            Command::Gain(gain) => {
                if !self.music.set_gain(gain) {
                    warn!("Gain {gain} rejected");
                }
            }
            Command::TogglePause => {
                if self.music.state() == State::Playing {
                    self.active = false;
                    self.music.pause();
                } else {
                    self.play();
                }
            }
            Command::Stop => {
                self.active = false;
                self.music.stop();
            }
            Command::ToggleLoop => {
                let looping = !self.music.looping();
                self.music.set_looping(looping);
                info!("Looping {}", if looping { "on" } else { "off" });
            }
            Command::Next => {
                self.next();
            }
            Command::Previous => {
                self.previous();
            }
            Command::Refresh => println!("{}", self.status()),
            Command::Quit => {
                self.active = false;
                self.music.stop();
                return false;
            }
        }
        true
    }

    /// Advance to the next track when the current one has played out.
    ///
    /// A stopped voice with samples still to come is an underrun the worker recovers from.
    pub fn poll(&mut self) {
        if self.active
            && self.music.state() == State::Stopped
            && self.music.source().exhausted()
        {
            debug!("Track {} finished", self.playlist.current() + 1);
            self.next();
        }
    }

    pub fn status(&self) -> String {
        let name = self
            .playlist
            .current_path()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        format!(
            "[{}/{}] {} {:?} {} / {} gain {:.2}{}",
            self.playlist.current() + 1,
            self.playlist.len(),
            name,
            self.music.state(),
            Length::from(self.music.position()),
            Length::from(self.music.length()),
            self.music.gain(),
            if self.music.looping() { " (loop)" } else { "" }
        )
    }
}
