//! resin-layers CLI - Inspect islands and margin breaches in slice files.
//!
//! The container header is not parsed here; raster size, layer count and
//! the layer table offset come from the command line.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use resin_layers::prelude::*;
use resin_layers::raster::OverlaySegment;
use serde_json::json;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "resin-layers", version, about)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every layer and print islands, pixel counts and margin flags.
    Scan(ScanArgs),
    /// Print the classified overlay rows of one layer.
    Rows(RowsArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Slice file.
    file: PathBuf,

    /// Raster width in pixels.
    #[arg(long)]
    width: u32,

    /// Raster height in pixels.
    #[arg(long)]
    height: u32,

    /// Number of layers in the layer table.
    #[arg(long)]
    layers: u32,

    /// Absolute offset of the first layer record.
    #[arg(long)]
    table_offset: u64,

    /// JSON options file; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Margin band in pixels (0 disables the check).
    #[arg(long)]
    margin: Option<u32>,

    /// Reject payloads whose runs do not cover the raster exactly.
    #[arg(long)]
    strict: bool,

    /// Island pixel connectivity.
    #[arg(long, value_enum)]
    connectivity: Option<ConnectivityChoice>,

    /// Smallest island component that is counted.
    #[arg(long)]
    min_island: Option<usize>,
}

#[derive(Args, Debug)]
struct ScanArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Emit a JSON report instead of a table.
    #[arg(long, short)]
    json: bool,
}

#[derive(Args, Debug)]
struct RowsArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Layer index (0-based).
    #[arg(long)]
    layer: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ConnectivityChoice {
    Four,
    Eight,
}

impl From<ConnectivityChoice> for Connectivity {
    fn from(choice: ConnectivityChoice) -> Self {
        match choice {
            ConnectivityChoice::Four => Connectivity::Four,
            ConnectivityChoice::Eight => Connectivity::Eight,
        }
    }
}

/// Whole slice file, mapped or read into memory.
enum SourceData {
    #[cfg(feature = "mmap")]
    Mapped(memmap2::Mmap),
    #[cfg_attr(feature = "mmap", allow(dead_code))]
    Owned(Vec<u8>),
}

impl SourceData {
    fn open(path: &Path) -> Result<Self> {
        #[cfg(feature = "mmap")]
        {
            let file = std::fs::File::open(path)?;
            // Safety: the file is opened read-only and only read while mapped
            let map = unsafe { memmap2::Mmap::map(&file) }?;
            Ok(Self::Mapped(map))
        }
        #[cfg(not(feature = "mmap"))]
        {
            Ok(Self::Owned(std::fs::read(path)?))
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            #[cfg(feature = "mmap")]
            Self::Mapped(map) => &map[..],
            Self::Owned(buf) => buf.as_slice(),
        }
    }
}

impl SourceArgs {
    fn header(&self) -> SliceHeader {
        SliceHeader::new(self.width, self.height, self.layers, self.table_offset)
    }

    fn options(&self) -> Result<LoadOptions> {
        let mut opts = match &self.config {
            Some(path) => LoadOptions::load(path)?,
            None => LoadOptions::default(),
        };
        if let Some(margin) = self.margin {
            opts.margin = margin;
        }
        if self.strict {
            opts.decode = DecodeMode::Strict;
        }
        if let Some(connectivity) = self.connectivity {
            opts.islands.connectivity = connectivity.into();
        }
        if let Some(min) = self.min_island {
            opts.islands.min_island_pixels = min;
        }
        Ok(opts)
    }
}

#[cfg(feature = "trace")]
type TraceGuard = tracing_chrome::FlushGuard;
#[cfg(not(feature = "trace"))]
type TraceGuard = ();

/// Install the log subscriber. With the `trace` feature and `RESIN_TRACE=1`,
/// spans are also written to `trace.json`.
fn init_tracing(verbose: u8) -> Option<TraceGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    #[cfg(feature = "trace")]
    if std::env::var("RESIN_TRACE").ok().as_deref() == Some("1") {
        let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
            .file("trace.json")
            .build();
        if tracing::subscriber::set_global_default(registry.with(chrome_layer)).is_err() {
            return None;
        }
        return Some(guard);
    }

    let _ = tracing::subscriber::set_global_default(registry);
    None
}

fn main() {
    let cli = Cli::parse();
    let _trace_guard = init_tracing(cli.verbose);

    let result = match cli.cmd {
        Command::Scan(args) => cmd_scan(&args),
        Command::Rows(args) => cmd_rows(&args),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_scan(args: &ScanArgs) -> Result<()> {
    let source = SourceData::open(&args.source.file)?;
    let header = args.source.header();
    let opts = args.source.options()?;
    tracing::info!(file = %args.source.file.display(), ?header, "scanning");

    let layers = load_all(source.bytes(), header, &opts, &mut LogProgress)?;

    if args.json {
        let report: Vec<_> = layers
            .iter()
            .enumerate()
            .map(|(i, l)| {
                json!({
                    "index": i,
                    "z": l.z(),
                    "exposure": l.exposure(),
                    "off_time": l.off_time(),
                    "pixels": l.pixels(),
                    "islands": l.island_count(),
                    "margin_breach": l.margin_breach(),
                })
            })
            .collect();
        let doc = json!({ "header": header, "options": opts, "layers": report });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("{:>6} {:>9} {:>9} {:>7} {:>10} {:>8} {:>7}", "layer", "z", "exposure", "off", "pixels", "islands", "margin");
    for (i, l) in layers.iter().enumerate() {
        println!(
            "{:>6} {:>9.3} {:>9.2} {:>7.2} {:>10} {:>8} {:>7}",
            i,
            l.z(),
            l.exposure(),
            l.off_time(),
            l.pixels(),
            l.island_count(),
            if l.margin_breach() { "yes" } else { "-" },
        );
    }

    let with_islands = layers.iter().filter(|l| l.island_count() > 0).count();
    let breaches = layers.iter().filter(|l| l.margin_breach()).count();
    println!();
    println!("{} layers, {} with islands, {} margin breaches", layers.len(), with_islands, breaches);
    Ok(())
}

fn cmd_rows(args: &RowsArgs) -> Result<()> {
    let source = SourceData::open(&args.source.file)?;
    let header = args.source.header();
    if args.layer >= header.layer_count as usize {
        return Err(Error::other(format!(
            "layer {} out of range (count: {})",
            args.layer, header.layer_count
        )));
    }

    // Islands depend on every layer below, so walk up to the requested one
    let mut loader = LayerSequenceLoader::new(source.bytes(), header, args.source.options()?)?;
    let mut target = None;
    while loader.next_index() <= args.layer {
        target = loader.next_layer(&mut LogProgress)?;
    }
    let Some(layer) = target else {
        return Err(Error::other(format!("layer {} not loaded", args.layer)));
    };

    println!("layer {}: z={:.3} islands={}", args.layer, layer.z(), layer.island_count());
    for (y, row) in layer.overlay_rows()?.iter().enumerate() {
        if row.is_empty() {
            continue;
        }
        let segments: Vec<String> = row.segments.iter().map(format_segment).collect();
        println!("{:>5}: {}", y, segments.join(" "));
    }
    Ok(())
}

fn format_segment(seg: &OverlaySegment) -> String {
    let tag = match seg.class {
        PixelClass::Supported => 'S',
        PixelClass::Island => 'I',
        PixelClass::Background => '.',
    };
    format!("{}+{}{}", seg.start, seg.len, tag)
}
