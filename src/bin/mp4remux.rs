use anyhow::{Context, bail};
use clap::Parser;
use mp4forge::{
    AppendTrack, BuildOptions, ChangeTimeScaleTrack, CroppedTrack, Movie, MovieCreator, Mp4Builder,
    Track,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Rewrite an MP4 as a progressive, interleaved file")]
struct Args {
    /// Input MP4 file
    input: PathBuf,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,

    /// Keep only these track ids (default: all tracks)
    #[arg(long = "track")]
    tracks: Vec<u32>,

    /// Append the same-id tracks of these files after the input's samples
    #[arg(long = "append")]
    append: Vec<PathBuf>,

    /// First sample to keep (0-based)
    #[arg(long)]
    from: Option<usize>,

    /// Sample to stop before (0-based, exclusive)
    #[arg(long)]
    to: Option<usize>,

    /// Convert every track to this timescale
    #[arg(long)]
    timescale: Option<u32>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let base = MovieCreator::open(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let extra = args
        .append
        .iter()
        .map(|p| MovieCreator::open(p).with_context(|| format!("reading {}", p.display())))
        .collect::<anyhow::Result<Vec<Movie>>>()?;

    let mut movie = Movie::new();
    for track in base.into_tracks() {
        let id = track.meta().track_id;
        if !args.tracks.is_empty() && !args.tracks.contains(&id) {
            continue;
        }
        let mut current: Box<dyn Track> = if extra.is_empty() {
            track
        } else {
            let mut parts: Vec<&dyn Track> = vec![track.as_ref()];
            for m in &extra {
                match m.track_by_id(id) {
                    Some(t) => parts.push(t),
                    None => bail!("appended file has no track {id}"),
                }
            }
            Box::new(AppendTrack::new(&parts)?)
        };
        if args.from.is_some() || args.to.is_some() {
            let from = args.from.unwrap_or(0);
            let to = args.to.unwrap_or(current.samples().len()).min(current.samples().len());
            current = Box::new(CroppedTrack::new(current.as_ref(), from, to)?);
        }
        if let Some(timescale) = args.timescale {
            current = Box::new(ChangeTimeScaleTrack::new(current.as_ref(), timescale)?);
        }
        movie.add_boxed_track(current);
    }
    if movie.is_empty() {
        bail!("no tracks selected");
    }

    let tree = Mp4Builder::new(BuildOptions::default()).build(&movie)?;
    let mut out = BufWriter::new(
        File::create(&args.output).with_context(|| format!("creating {}", args.output.display()))?,
    );
    let written = tree.write(&mut out)?;
    info!(bytes = written, path = %args.output.display(), "wrote movie");
    Ok(())
}
