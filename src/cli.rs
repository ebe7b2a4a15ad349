use std::path::PathBuf;

use clap::Parser;

/// Command-line options. Anything left unset falls back to the settings
/// file, then to built-in defaults.
#[derive(Parser, Debug, Default)]
#[command(name = "scrollscope")]
#[command(version)]
#[command(about = "Scrolling multi-channel audio oscilloscope")]
#[command(
    after_help = "KEYS:\n    Up / Down    longer / shorter duration\n    Esc / Q      quit"
)]
pub struct Cli {
    /// Number of input channels to display
    #[arg(short = 'n', long, value_name = "NUMBER")]
    pub channels: Option<usize>,

    /// Seconds of audio shown across the window
    #[arg(short, long, value_name = "SECONDS")]
    pub duration: Option<u32>,

    /// Draw clipping columns in red
    #[arg(short, long)]
    pub clipping: bool,

    /// Keep the image still and sweep a play-head instead of scrolling
    #[arg(short = 's', long = "no-scroll")]
    pub no_scroll: bool,

    /// Window width in pixels
    #[arg(short = 'x', long, value_name = "PIXELS")]
    pub width: Option<usize>,

    /// Window height in pixels
    #[arg(short = 'y', long, value_name = "PIXELS")]
    pub height: Option<usize>,

    /// Composite with texture strips instead of a raster buffer
    #[arg(short = 'g', long)]
    pub strips: bool,

    /// Frames per second (0 = unlimited, follow vsync)
    #[arg(short, long, value_name = "FPS")]
    pub fps: Option<u32>,

    /// Input device name
    #[arg(short = 'D', long, value_name = "NAME")]
    pub device: Option<String>,

    /// Settings file to read instead of the per-user default
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the available input devices and exit
    #[arg(long)]
    pub list_devices: bool,
}
