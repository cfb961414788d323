use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};
use lipsync_core::{
    select_frame, AppConfig, Authoring, DirectoryLoader, DisplayGeometry, ExportFormat,
    FrameRenderer, FrameSelection, LipSyncError, Player, Recorder, SegmentPanel, TimelineStore,
    VirtualTransport, VisemeGroup, VisemeResolver, Zoom,
};
use tracing_subscriber::EnvFilter;

fn main() -> lipsync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Preview {
            timeline,
            at,
            step,
            width,
        } => run_preview(&timeline, at, step, width),
        Commands::Export {
            timeline,
            visemes,
            output,
            fps,
            format,
        } => run_export(&timeline, visemes, output, fps, format),
    }
}

fn run_preview(
    timeline: &TimelineArgs,
    at: Option<f64>,
    step: Option<f64>,
    width: Option<f64>,
) -> lipsync_core::Result<()> {
    let store = build_store(timeline)?;
    let config = timeline.load_config()?;

    if let Some(width) = width {
        for line in layout_lines(&store, &config, width) {
            println!("{line}");
        }
    }
    if let Some(time) = at {
        println!("{}", describe(time, select_frame(&store, time)));
        return Ok(());
    }
    if let Some(step) = step.filter(|step| !(*step > 0.0)) {
        return Err(LipSyncError::InvalidArgument(format!(
            "--step must be positive, got {step}"
        )));
    }

    let mut resolver = VisemeResolver::new(DirectoryLoader::new(&config.visemes.directory));
    let mut player = Player::new(
        VirtualTransport::with_duration(timeline.duration),
        FrameRenderer::from_config(&config.preview),
        config.preview.tick_rate,
    );
    tracing::info!(
        duration = timeline.duration,
        interval = ?player.tick_interval(),
        "previewing timeline"
    );

    player.play()?;
    let mut last = None;
    while let Some(outcome) = player.tick(&store, &mut resolver) {
        if last != Some(outcome.selection) {
            println!("{}", describe(outcome.time, outcome.selection));
            last = Some(outcome.selection);
        }
        player.advance(step);
    }
    Ok(())
}

fn run_export(
    timeline: &TimelineArgs,
    visemes: Option<PathBuf>,
    output: Option<PathBuf>,
    fps: Option<u32>,
    format: Option<FormatArg>,
) -> lipsync_core::Result<()> {
    let mut config = timeline.load_config()?;
    if let Some(visemes) = visemes {
        config.visemes.directory = visemes;
    }
    if let Some(output) = output {
        config.export.output_path = output.display().to_string();
    }
    if let Some(fps) = fps {
        config.export.fps = fps;
    }
    if let Some(format) = format {
        config.export.format = format.into();
    }

    let store = build_store(timeline)?;
    let mut resolver = VisemeResolver::new(DirectoryLoader::new(&config.visemes.directory));
    let mut player = Player::new(
        VirtualTransport::with_duration(timeline.duration),
        FrameRenderer::from_config(&config.preview),
        config.preview.tick_rate,
    );
    let mut recorder = Recorder::new(config.export.clone());
    let mut sink = recorder.open_sink()?;

    tracing::info!(
        output = %config.export.output_path,
        format = ?config.export.format,
        "exporting"
    );
    let summary = recorder.export_stepped(&mut player, &store, &mut resolver, sink.as_mut())?;
    println!(
        "wrote {} frames covering {:.2}s to {}",
        summary.frames, summary.duration, config.export.output_path
    );
    Ok(())
}

fn build_store(timeline: &TimelineArgs) -> lipsync_core::Result<TimelineStore> {
    let mut store = TimelineStore::new();
    store.set_duration(timeline.duration);
    if store.duration().is_none() {
        return Err(LipSyncError::InvalidArgument(format!(
            "--duration must be positive, got {}",
            timeline.duration
        )));
    }

    for spec in &timeline.segments {
        store.begin_or_complete_segment(spec.start)?;
        match store.begin_or_complete_segment(spec.end)? {
            Authoring::Completed(id) => store.set_text(id, spec.text.clone())?,
            Authoring::Pending(_) => return Err(LipSyncError::msg("segment was left unpaired")),
        }
    }
    Ok(store)
}

/// Lays the segments out on a waveform of the given container width, zoomed
/// per the configuration.
fn layout_lines(store: &TimelineStore, config: &AppConfig, width: f64) -> Vec<String> {
    let zoom = Zoom::from_config(&config.zoom);
    let geometry = DisplayGeometry::zoomed(store.duration().unwrap_or(0.0), width, zoom);
    let mut panel = SegmentPanel::new(geometry);
    panel.relayout(store, geometry);

    let mut lines = vec![format!(
        "waveform {:.0}px at {:.0}px/s",
        geometry.width,
        zoom.px_per_second()
    )];
    for row in panel.rows() {
        lines.push(format!(
            "{}  [{:.0}px +{:.0}px]  {:?}",
            row.title, row.block.left, row.block.width, row.view.text
        ));
    }
    lines
}

fn describe(time: f64, selection: FrameSelection) -> String {
    match selection {
        FrameSelection::Neutral => format!("{time:>7.2}s  neutral"),
        FrameSelection::Letter(c) => {
            format!("{time:>7.2}s  {c} -> {}", VisemeGroup::for_char(c))
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Lip-sync viseme timeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print which viseme is shown over the course of the clip.
    Preview {
        #[command(flatten)]
        timeline: TimelineArgs,
        /// Only report the frame at this time, in seconds.
        #[arg(long)]
        at: Option<f64>,
        /// Playback step between ticks, in seconds. Defaults to one tick of
        /// the configured tick rate.
        #[arg(long)]
        step: Option<f64>,
        /// Print the segment layout for a waveform this many pixels wide.
        #[arg(long)]
        width: Option<f64>,
    },
    /// Render the animation to a GIF or a PNG sequence.
    Export {
        #[command(flatten)]
        timeline: TimelineArgs,
        /// Directory holding the viseme images.
        #[arg(long)]
        visemes: Option<PathBuf>,
        /// Output file (gif) or directory (png).
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        fps: Option<u32>,
        #[arg(long, value_enum)]
        format: Option<FormatArg>,
    },
}

#[derive(Args, Debug)]
struct TimelineArgs {
    /// Length of the audio clip, in seconds.
    #[arg(short, long)]
    duration: f64,
    /// Segment as START:END:TEXT. Repeat for more segments.
    #[arg(short, long = "segment")]
    segments: Vec<SegmentSpec>,
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl TimelineArgs {
    fn load_config(&self) -> lipsync_core::Result<AppConfig> {
        match &self.config {
            Some(path) => AppConfig::load(path),
            None => Ok(AppConfig::default()),
        }
    }
}

#[derive(Debug, Clone)]
struct SegmentSpec {
    start: f64,
    end: f64,
    text: String,
}

impl FromStr for SegmentSpec {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts = raw.splitn(3, ':');
        let (Some(start), Some(end), Some(text)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("expected START:END:TEXT, got `{raw}`"));
        };
        let start = start
            .trim()
            .parse()
            .map_err(|err| format!("bad start time `{start}`: {err}"))?;
        let end = end
            .trim()
            .parse()
            .map_err(|err| format!("bad end time `{end}`: {err}"))?;
        Ok(Self {
            start,
            end,
            text: text.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Gif,
    Png,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Gif => ExportFormat::Gif,
            FormatArg::Png => ExportFormat::PngSequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use lipsync_core::AudioSource;
    use super::*;

    #[test]
    fn parses_segment_specs() {
        let spec: SegmentSpec = "2.0:4.5:hi: there".parse().unwrap();
        assert_eq!((spec.start, spec.end), (2.0, 4.5));
        assert_eq!(spec.text, "hi: there");
        assert!("2.0:oops".parse::<SegmentSpec>().is_err());
        assert!("x:1:a".parse::<SegmentSpec>().is_err());
    }

    #[test]
    fn builds_store_from_arguments() {
        let cli = Cli::parse_from([
            "lipsync", "preview", "--duration", "10", "--segment", "2:4:HI", "--segment",
            "6:5:ok", "--at", "3",
        ]);
        let Commands::Preview { timeline, at, .. } = cli.command else {
            panic!("expected preview");
        };
        let store = build_store(&timeline).unwrap();
        assert_eq!(store.segments().count(), 2);
        assert_eq!(at, Some(3.0));
        assert_eq!(select_frame(&store, 3.0), FrameSelection::Letter('I'));
        assert_eq!(select_frame(&store, 5.2), FrameSelection::Letter('o'));
    }

    #[test]
    fn rejects_missing_duration() {
        let cli = Cli::parse_from(["lipsync", "preview", "--duration", "0"]);
        let Commands::Preview { timeline, .. } = cli.command else {
            panic!("expected preview");
        };
        assert!(build_store(&timeline).is_err());
    }

    #[test]
    fn step_defaults_to_the_tick_rate() {
        let cli = Cli::parse_from(["lipsync", "preview", "--duration", "2"]);
        let Commands::Preview { step, width, .. } = cli.command else {
            panic!("expected preview");
        };
        assert_eq!((step, width), (None, None));

        let config = AppConfig::default();
        let mut player = Player::new(
            VirtualTransport::with_duration(2.0),
            FrameRenderer::from_config(&config.preview),
            config.preview.tick_rate,
        );
        player.play().unwrap();
        player.advance(step);
        let expected = 1.0 / f64::from(config.preview.tick_rate);
        assert!((player.audio().current_time() - expected).abs() < 1e-6);
    }

    #[test]
    fn lays_out_segments_with_the_configured_zoom() {
        let cli = Cli::parse_from([
            "lipsync", "preview", "--duration", "10", "--segment", "2:4:HI", "--width", "800",
        ]);
        let Commands::Preview {
            timeline, width, ..
        } = cli.command
        else {
            panic!("expected preview");
        };
        let store = build_store(&timeline).unwrap();
        let lines = layout_lines(&store, &AppConfig::default(), width.unwrap());
        assert_eq!(
            lines,
            [
                "waveform 1000px at 100px/s",
                "Segment: 2.00 - 4.00  [200px +200px]  \"HI\"",
            ]
        );

        let config = AppConfig::from_json(r#"{ "zoom": { "initial": 20 } }"#).unwrap();
        let lines = layout_lines(&store, &config, 800.0);
        assert_eq!(lines[0], "waveform 800px at 20px/s");
        assert_eq!(lines[1], "Segment: 2.00 - 4.00  [160px +160px]  \"HI\"");
    }

    #[test]
    fn describes_frames() {
        assert_eq!(describe(2.0, FrameSelection::Letter('h')), "   2.00s  h -> H");
        assert_eq!(describe(0.5, FrameSelection::Neutral), "   0.50s  neutral");
    }
}
