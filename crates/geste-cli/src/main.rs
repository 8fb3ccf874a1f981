use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geste_hw::Camera;

#[derive(Parser)]
#[command(name = "geste", about = "Gesture-controlled bulb — daemon status and diagnostics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the daemon's current gesture and connection state
    Status,
    /// Continuously print gesture state
    Watch {
        /// Seconds between updates
        #[arg(short, long, default_value_t = 1)]
        interval: u64,
    },
    /// List available camera devices
    Devices,
    /// Capture one frame to a PNG (for aiming the camera)
    Snapshot {
        /// V4L2 device path
        #[arg(short, long, default_value = "/dev/video0")]
        device: String,
        /// Output file
        #[arg(short, long, default_value = "snapshot.png")]
        output: String,
    },
}

#[zbus::proxy(
    interface = "org.geste.Daemon1",
    default_service = "org.geste.Daemon1",
    default_path = "/org/geste/Daemon1"
)]
trait Daemon {
    async fn status(&self) -> zbus::Result<String>;
    async fn luminance(&self) -> zbus::Result<u8>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Status => {
            let status = fetch_status().await?;
            print_status(&status);
        }
        Commands::Watch { interval } => {
            let connection = zbus::Connection::session()
                .await
                .context("connecting to session bus")?;
            let proxy = DaemonProxy::new(&connection).await?;

            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(interval.max(1)));
            loop {
                ticker.tick().await;
                let status: serde_json::Value = serde_json::from_str(&proxy.status().await?)?;
                println!(
                    "fingers={} luminance={} ({}%) telemetry={}",
                    status["fingers"],
                    status["luminance"],
                    status["percent"],
                    if status["connected"].as_bool().unwrap_or(false) {
                        status["device"].as_str().unwrap_or("?").to_string()
                    } else {
                        "offline".to_string()
                    }
                );
            }
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for device in devices {
                println!("{}  {} ({})", device.path, device.name, device.driver);
            }
        }
        Commands::Snapshot { device, output } => {
            let camera = Camera::open(&device).context("opening camera")?;
            let mut frame = camera.capture_frame().context("capturing frame")?;
            // Mirror so the snapshot matches what the gesture pipeline sees.
            frame.mirror();

            let img = image::RgbImage::from_raw(frame.width, frame.height, frame.data)
                .context("frame buffer does not match dimensions")?;
            img.save(&output).context("writing image")?;
            println!("Saved {}x{} snapshot to {output}", frame.width, frame.height);
        }
    }

    Ok(())
}

async fn fetch_status() -> Result<serde_json::Value> {
    let connection = zbus::Connection::session()
        .await
        .context("connecting to session bus")?;
    let proxy = DaemonProxy::new(&connection).await?;
    let status = proxy
        .status()
        .await
        .context("is gested running?")?;
    Ok(serde_json::from_str(&status)?)
}

fn print_status(status: &serde_json::Value) {
    println!("gested:    v{}", status["version"].as_str().unwrap_or("?"));
    match status["fingers"].as_i64() {
        Some(f) if f >= 0 => println!("fingers:   {f}"),
        _ => println!("fingers:   (no hand)"),
    }
    println!(
        "luminance: {} ({}%)",
        status["luminance"], status["percent"]
    );
    if status["connected"].as_bool().unwrap_or(false) {
        println!("telemetry: {}", status["device"].as_str().unwrap_or("?"));
    } else {
        println!("telemetry: offline");
    }
}
