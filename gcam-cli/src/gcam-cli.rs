use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use gcam::CameraModule;
use gcam_capture::{CameraSession, CollectOptions, TriggerFlag};
use gcam_sim as backend;

#[derive(Debug, Parser)]
struct Snap {
    /// specify the name of the camera to use
    #[arg(short, long)]
    camera_name: Option<String>,

    /// output image path (.png, .jpg)
    #[arg(short, long, default_value = "snap.png")]
    output: PathBuf,

    /// property=value pairs applied before capture,
    /// e.g. ExposureTime=Shutter_1_1000 or Gain=ISO_400
    #[arg(short, long)]
    set: Vec<String>,

    /// sample region "x,y,w,h": print its average color and outline it
    /// in the saved image
    #[arg(short, long)]
    probe: Option<String>,
}

#[derive(Debug, Parser)]
struct Triggered {
    /// number of cameras sharing the trigger
    #[arg(short, long, default_value = "1")]
    num_cameras: usize,

    /// delay before the trigger fires, in milliseconds
    #[arg(short, long, default_value = "1000")]
    delay_ms: u64,

    /// output files are named <prefix>-<camera>.png
    #[arg(short, long, default_value = "triggered")]
    output_prefix: String,
}

#[derive(Debug, Parser)]
struct Burst {
    /// number of cameras recording in parallel
    #[arg(short = 'c', long, default_value = "1")]
    num_cameras: usize,

    /// number of frames to record per camera
    #[arg(short, long, default_value = "10")]
    num_frames: usize,

    /// output frames are written to <dir>/<camera>/frame-NNNN.png
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

/// camera utilities
#[derive(Debug, Parser)]
#[command(name = "gcam", version)]
enum Command {
    /// list cameras
    List,
    /// capture and save one frame
    Snap(Snap),
    /// capture one frame per camera on a shared trigger
    Triggered(Triggered),
    /// record a burst of frames
    Burst(Burst),
}

fn default_camera(module: &backend::SimModule) -> anyhow::Result<String> {
    let infos = module.camera_infos()?;
    if infos.is_empty() {
        anyhow::bail!("no cameras detected");
    }
    Ok(infos[0].name().to_string())
}

fn apply_set_args(session: &mut CameraSession<backend::SimCamera>, pairs: &[String]) {
    for pair in pairs {
        match pair.split_once('=') {
            Some((property, value)) => session.apply_named(property, value),
            None => warn!("ignoring malformed --set {pair:?} (expected property=value)"),
        }
    }
}

fn list(module: &backend::SimModule) -> anyhow::Result<()> {
    for info in module.camera_infos()? {
        println!("{} ({} {})", info.name(), info.vendor(), info.model());
    }
    Ok(())
}

fn parse_region(spec: &str) -> anyhow::Result<(u32, u32, u32, u32)> {
    let parts: Vec<u32> = spec
        .split(',')
        .map(|part| part.trim().parse())
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [x, y, w, h] => Ok((*x, *y, *w, *h)),
        _ => anyhow::bail!("expected x,y,w,h, got {spec:?}"),
    }
}

fn snap(args: Snap) -> anyhow::Result<()> {
    let mut module = backend::new_module()?;
    let name = match args.camera_name {
        Some(name) => name,
        None => default_camera(&module)?,
    };
    let mut session = CameraSession::open(&mut module, &name)?;
    session.set_defaults();
    apply_set_args(&mut session, &args.set);
    print!("{}", session.settings_report());

    let frame = session.capture_single()?;
    info!("{}", frame.info_string());
    match &args.probe {
        Some(spec) => {
            let (x, y, w, h) = parse_region(spec)?;
            let mean = frame.region_mean_rgb(x, y, w, h)?;
            println!(
                "region {w}x{h} at ({x}, {y}) mean RGB ({}, {}, {})",
                mean[0], mean[1], mean[2]
            );
            let mut rgb = frame.to_rgb8()?;
            let half = i64::from((w.max(h) + 1) / 2);
            owned_frame::draw_square(
                &mut rgb,
                i64::from(x) + i64::from(w) / 2,
                i64::from(y) + i64::from(h) / 2,
                half,
                [255, 0, 0],
            );
            owned_frame::save_rgb8(&rgb, &args.output)?;
        }
        None => frame.save(&args.output)?,
    }
    println!("wrote {}", args.output.display());
    Ok(())
}

fn triggered(args: Triggered) -> anyhow::Result<()> {
    let mut module = backend::SimModule::with_cameras(args.num_cameras);
    let names: Vec<String> = module
        .camera_infos()?
        .iter()
        .map(|info| info.name().to_string())
        .collect();

    let mut sessions = Vec::new();
    for name in &names {
        let mut session = CameraSession::open(&mut module, name)?;
        session.set_defaults();
        sessions.push(session);
    }

    let trigger = TriggerFlag::new();
    let firer = {
        let trigger = trigger.clone();
        let delay = Duration::from_millis(args.delay_ms);
        std::thread::spawn(move || {
            info!("firing trigger in {} ms", delay.as_millis());
            std::thread::sleep(delay);
            trigger.fire();
        })
    };

    let results = gcam_capture::capture_all_on_trigger(&mut sessions, &trigger);
    let _ = firer.join();

    let mut failed = false;
    for (name, result) in names.iter().zip(results) {
        match result {
            Ok(frame) => {
                info!("{name}: {}", frame.info_string());
                let path = format!("{}-{name}.png", args.output_prefix);
                frame.save(&path)?;
                println!("wrote {path}");
            }
            Err(e) => {
                error!("{name}: capture failed: {e}");
                failed = true;
            }
        }
    }
    if failed {
        anyhow::bail!("not every camera produced a frame");
    }
    Ok(())
}

fn burst(args: Burst) -> anyhow::Result<()> {
    let mut module = backend::SimModule::with_cameras(args.num_cameras);
    let names: Vec<String> = module
        .camera_infos()?
        .iter()
        .map(|info| info.name().to_string())
        .collect();

    let mut sessions = Vec::new();
    for name in &names {
        let mut session = CameraSession::open(&mut module, name)?;
        session.set_defaults();
        sessions.push(session);
    }

    let results =
        gcam_capture::collect_all_frames(&mut sessions, args.num_frames, &CollectOptions::default());
    for (name, result) in names.iter().zip(results) {
        let collection = result?;
        println!(
            "{name}: captured {}/{} frames ({} reported lost)",
            collection.frames.len(),
            collection.requested,
            collection.lost_count
        );
        let dir = args.output_dir.join(name);
        std::fs::create_dir_all(&dir)?;
        for frame in &collection.frames {
            frame.save(dir.join(format!("frame-{:04}.png", frame.frame_id)))?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "gcam=info,gcam_capture=info,gcam_cli=info,warn");
    }
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match Command::parse() {
        Command::List => {
            let module = backend::new_module()?;
            list(&module)?;
        }
        Command::Snap(args) => snap(args)?,
        Command::Triggered(args) => triggered(args)?,
        Command::Burst(args) => burst(args)?,
    }
    Ok(())
}
