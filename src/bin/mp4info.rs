use anyhow::Context;
use clap::Parser;
use mp4forge::{BoxData, IsoFile, MediaKind, MovieCreator, Payload, Track, track::track_duration};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Summarize the brands, movie header and tracks of an MP4 file.
#[derive(Parser, Debug)]
#[command(version, about = "Print brands, movie header and per-track sample tables")]
struct Args {
    /// Input file
    input: PathBuf,

    /// Emit a JSON document
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Brands {
    major: String,
    minor_version: u32,
    compatible: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MovieSummary {
    timescale: u32,
    duration: u64,
    seconds: f64,
    next_track_id: u32,
}

#[derive(Debug, Serialize)]
struct TrackInfo {
    index: usize,
    track_id: u32,
    kind: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<(u16, u32)>,
    timescale: u32,
    duration: u64,
    seconds: f64,
    start_time: f64,
    language: String,
    samples: usize,
    bytes: u64,
    /// `None` when every sample is a sync sample.
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_samples: Option<usize>,
}

#[derive(Debug, Serialize)]
struct FileSummary {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    brands: Option<Brands>,
    #[serde(skip_serializing_if = "Option::is_none")]
    movie: Option<MovieSummary>,
    tracks: Vec<TrackInfo>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let file = IsoFile::open(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let summary = summarize(&file, args.input.display().to_string())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn summarize(file: &IsoFile, name: String) -> anyhow::Result<FileSummary> {
    let tree = file.boxes();
    let brands = match tree.root_of_type(b"ftyp").map(|id| &tree.node(id).data) {
        Some(BoxData::FileType(ftyp)) => Some(Brands {
            major: ftyp.major_brand.to_string(),
            minor_version: ftyp.minor_version,
            compatible: ftyp.compatible_brands.iter().map(ToString::to_string).collect(),
        }),
        _ => None,
    };
    let movie = match tree.find_path(None, "moov/mvhd").map(|id| &tree.node(id).data) {
        Some(BoxData::MovieHeader(mvhd)) => Some(MovieSummary {
            timescale: mvhd.timescale,
            duration: mvhd.duration,
            seconds: mvhd.duration as f64 / mvhd.timescale.max(1) as f64,
            next_track_id: mvhd.next_track_id,
        }),
        _ => None,
    };

    let mut tracks = Vec::new();
    if file.movie_box().is_some() {
        let parsed = MovieCreator::build(file)?;
        for (index, track) in parsed.tracks().iter().enumerate() {
            tracks.push(track_info(index, track.as_ref()));
        }
    }
    Ok(FileSummary { file: name, brands, movie, tracks })
}

fn track_info(index: usize, track: &dyn Track) -> TrackInfo {
    let meta = track.meta();
    let description = track.sample_description();
    let entry = description
        .roots()
        .first()
        .and_then(|&stsd| description.children(stsd).first().copied());
    let codec = entry.map(|e| description.node(e).typ.to_string());
    let prefix = entry.and_then(|e| match &description.node(e).data {
        BoxData::Container(c) => Some(&c.prefix),
        _ => None,
    });
    let dimensions = match prefix.and_then(|p| p.visual()) {
        Some(v) => Some((v.width as u32, v.height as u32)),
        None if meta.width > 0.0 => Some((meta.width as u32, meta.height as u32)),
        None => None,
    };
    let audio = prefix
        .and_then(|p| p.audio())
        .map(|a| (a.channel_count, a.sample_rate_hz()));
    let duration = track_duration(track);

    TrackInfo {
        index,
        track_id: meta.track_id,
        kind: track.kind(),
        codec,
        dimensions,
        audio,
        timescale: meta.timescale,
        duration,
        seconds: duration as f64 / meta.timescale.max(1) as f64,
        start_time: meta.start_time,
        language: meta.language.clone(),
        samples: track.samples().len(),
        bytes: track.samples().iter().map(Payload::len).sum(),
        sync_samples: track.sync_samples().map(<[u32]>::len),
    }
}

fn print_summary(summary: &FileSummary) {
    println!("{}", summary.file);
    if let Some(b) = &summary.brands {
        println!("  brands   {} (minor {}) [{}]", b.major, b.minor_version, b.compatible.join(" "));
    }
    if let Some(m) = &summary.movie {
        println!(
            "  movie    {} / {} = {:.3}s, next track id {}",
            m.duration, m.timescale, m.seconds, m.next_track_id
        );
    }
    for t in &summary.tracks {
        let codec = t.codec.as_deref().unwrap_or("????");
        print!("  #{} id={} {:?} {codec}", t.index, t.track_id, t.kind);
        if let Some((w, h)) = t.dimensions {
            print!(" {w}x{h}");
        }
        if let Some((channels, rate)) = t.audio {
            print!(" {channels}ch {rate}Hz");
        }
        println!(" lang={}", t.language);

        let sync = match t.sync_samples {
            Some(n) => format!("{n} sync"),
            None => "all sync".to_string(),
        };
        println!(
            "      {} samples ({sync}), {} bytes, {} / {} = {:.3}s",
            t.samples, t.bytes, t.duration, t.timescale, t.seconds
        );
        if t.start_time > 0.0 {
            println!("      starts at {:.3}s", t.start_time);
        }
    }
}
