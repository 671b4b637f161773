#[macro_use]
extern crate log;

use anyhow::Result;
use gapless::device::SoftDevice;
use gapless::player::{Args, Player, Playlist, USAGE};
use gapless::{config, mixer, net, stdin, Instance};
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    let config = config::load_or_default(&args.config).await?;

    let device = Arc::new(SoftDevice::open(config.device.clone())?);
    let instance = Instance::new(device.clone())?.with_stream_config(config.stream.clone())?;

    let mixer_output = mixer::start(device);
    if config.output.enabled {
        net::start(&config.output.listen_addr, &config.device, mixer_output.clone()).await?;
    }

    let mut player = Player::new(instance.music()?, Playlist::new(args.tracks, args.mode));
    if !player.start() {
        error!("None of the given tracks could be played");
        std::process::exit(1);
    }
    println!("{}", player.status());

    let mut commands = stdin::start();
    let mut poll = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => {
                    if !player.handle(command) {
                        break;
                    }
                }
                None => break,
            },
            _ = poll.tick() => player.poll(),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Bye");
    Ok(())
}
