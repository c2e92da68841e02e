// main.rs — headless entry point
//
// sofsim [--basedir DIR] [--game DIR] [--config FILE] [--ticks N] [--realtime]
//        [--forward N] [--dump] [+command args ...]
//
// Commands given with `+` run in order after the config. Without a `+map`
// the default map from `sv_map` is loaded.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use sofsim_common::cvar::CvarFlags;
use sofsim_common::q_shared::UserCmd;
use sofsim_game::g_error::GameError;
use sofsim_server::server::*;
use sofsim_server::sv_ccmds::sv_execute_command;
use sofsim_server::sv_files::DiskFileSystem;
use sofsim_server::sv_init::{sv_connect_local, sv_spawn_server};
use sofsim_server::sv_main::{sv_exec_config, sv_frame, sv_init, sv_local_input, sv_shutdown, DEFAULT_CONFIG};

const DEFAULT_MAP: &str = "training";

#[derive(Debug)]
struct Options {
    basedir: PathBuf,
    game: Option<String>,
    config: String,
    ticks: u32,
    realtime: bool,
    forward: i16,
    dump: bool,
    commands: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            basedir: PathBuf::from("data"),
            game: None,
            config: DEFAULT_CONFIG.to_string(),
            ticks: 100,
            realtime: false,
            forward: 0,
            dump: false,
            commands: Vec::new(),
        }
    }
}

const USAGE: &str = "sofsim [--basedir DIR] [--game DIR] [--config FILE] [--ticks N] [--realtime] \
                     [--forward N] [--dump] [+command args ...]";

fn parse_args(args: impl IntoIterator<Item = String>) -> ServerResult<Options> {
    let mut opts = Options::default();
    let mut args = args.into_iter().peekable();
    while let Some(arg) = args.next() {
        if let Some(cmd) = arg.strip_prefix('+') {
            let mut line = cmd.to_string();
            while let Some(word) = args.next_if(|a| !a.starts_with('+') && !a.starts_with("--")) {
                line.push(' ');
                if word.contains(char::is_whitespace) {
                    line.push_str(&format!("\"{}\"", word));
                } else {
                    line.push_str(&word);
                }
            }
            opts.commands.push(line);
            continue;
        }
        match arg.as_str() {
            "--basedir" => opts.basedir = args.next().ok_or(ServerError::Usage(USAGE))?.into(),
            "--game" => opts.game = Some(args.next().ok_or(ServerError::Usage(USAGE))?),
            "--config" => opts.config = args.next().ok_or(ServerError::Usage(USAGE))?,
            "--ticks" => {
                opts.ticks = args
                    .next()
                    .and_then(|n| n.parse().ok())
                    .ok_or(ServerError::Usage(USAGE))?
            }
            "--forward" => {
                opts.forward = args
                    .next()
                    .and_then(|n| n.parse().ok())
                    .ok_or(ServerError::Usage(USAGE))?
            }
            "--realtime" => opts.realtime = true,
            "--dump" => opts.dump = true,
            _ => return Err(ServerError::Usage(USAGE)),
        }
    }
    Ok(opts)
}

/// Stands in for a renderer: reads the published snapshot on its own thread.
fn spawn_hud_reader(snapshot: SharedSnapshot, stop: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut last = -1;
        while !stop.load(Ordering::Relaxed) {
            {
                let snap = snapshot.read();
                if snap.framenum != last {
                    last = snap.framenum;
                    if let Some(Some(p)) = snap.players.first() {
                        debug!(
                            "hud {:>5}: health {} armor {} {:?} {}/{} at ({:.0} {:.0} {:.0}), {} visible",
                            snap.framenum,
                            p.health,
                            p.armor,
                            p.weapon,
                            p.ammo_in_mag,
                            p.ammo_reserve,
                            p.origin[0],
                            p.origin[1],
                            p.origin[2],
                            snap.entities.len()
                        );
                    }
                }
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    })
}

fn run(opts: Options) -> ServerResult<()> {
    let mut fs = DiskFileSystem::new(&opts.basedir);
    if let Some(game) = &opts.game {
        fs.add_game_directory(opts.basedir.join(game));
    }
    let mut sv = ServerContext::new(Box::new(fs), opts.basedir.join("save"));
    sv.game.cvars.get("sv_map", DEFAULT_MAP, CvarFlags::ARCHIVE);

    match sv_exec_config(&mut sv, &opts.config) {
        Ok(_) => {}
        Err(ServerError::Io(err)) if opts.config == DEFAULT_CONFIG => {
            warn!("couldn't exec {}: {}", DEFAULT_CONFIG, err);
        }
        Err(err) => return Err(err),
    }
    sv_init(&mut sv);

    for line in &opts.commands {
        let out = sv_execute_command(&mut sv, line)?;
        if !out.is_empty() {
            print!("{}", out);
        }
    }
    if sv.state != ServerState::Game {
        let map = sv.game.cvars.variable_string("sv_map").to_string();
        sv_spawn_server(&mut sv, &map)?;
    }
    sv_connect_local(&mut sv)?;

    let stop = Arc::new(AtomicBool::new(false));
    let reader = spawn_hud_reader(sv.snapshot_handle(), Arc::clone(&stop));

    info!("running {} ticks", opts.ticks);
    let frametime = Duration::from_millis(sv.timing.sv_frametime as u64);
    let mut result = Ok(());
    let mut oldtime = Instant::now();
    let mut ticks = 0;
    while ticks < opts.ticks && sv.state == ServerState::Game {
        let cmd = UserCmd {
            msec: sv.timing.sv_frametime as u8,
            forwardmove: opts.forward,
            ..Default::default()
        };
        if let Err(err) = sv_local_input(&mut sv, cmd) {
            debug!("no local input this frame: {}", err);
        }

        let msec = if opts.realtime {
            std::thread::sleep(frametime.saturating_sub(oldtime.elapsed()));
            let now = Instant::now();
            let msec = now.duration_since(oldtime).as_millis() as i32;
            oldtime = now;
            msec
        } else {
            sv.timing.sv_frametime
        };

        match sv_frame(&mut sv, msec) {
            Ok(n) => ticks += n,
            Err(err) => {
                result = Err(err);
                break;
            }
        }
    }

    stop.store(true, Ordering::Relaxed);
    if reader.join().is_err() {
        warn!("hud reader panicked");
    }

    if let Ok(status) = sv_execute_command(&mut sv, "status") {
        print!("{}", status);
    }
    if opts.dump {
        let snap = sv.snapshot.read();
        let text = serde_json::to_string_pretty(&*snap).map_err(GameError::from)?;
        println!("{}", text);
    }
    sv_shutdown(&mut sv, "finished");
    result
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(opts) => opts,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    match run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
