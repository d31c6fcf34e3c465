use clap::{ArgAction, Parser};
use mp4forge::{
    BoxTree, FourCC, IsoFile, NodeId,
    json_api::{box_fields, box_to_json},
    util::hex_dump,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "MP4/ISOBMFF box explorer")]
struct Args {
    /// MP4/ISOBMFF file path
    path: String,

    /// Only print subtree(s) matching a dotted path (e.g. moov.trak[0].mdia.minf.stbl)
    #[arg(long = "filter")]
    filter: Option<String>,

    /// Dump raw payload of this 4CC (e.g. --raw stsd) or uuid:xxxxxxxx...
    #[arg(long = "raw")]
    raw: Option<String>,

    /// Limit recursion depth (for text/tree output)
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Print structured values when a decoder exists
    #[arg(long, action = ArgAction::SetTrue)]
    decode: bool,

    /// Show bytes count when dumping raw (0 means entire box payload)
    #[arg(long, default_value_t = 0)]
    bytes: usize,

    /// Emit JSON instead of human-readable tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let file = IsoFile::open(&args.path)?;
    let tree = file.boxes();

    let targets = match &args.filter {
        Some(path) => select_by_path(tree, path),
        None => tree.roots().to_vec(),
    };

    if args.json {
        let json: Vec<_> = targets.iter().map(|&id| box_to_json(tree, id, args.decode)).collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    for &id in &targets {
        print_box(tree, id, 0, args.max_depth, args.decode);
    }

    if let Some(sel) = &args.raw {
        dump_raw(tree, sel, args.bytes)?;
    }
    Ok(())
}

fn display_type(tree: &BoxTree, id: NodeId) -> String {
    let node = tree.node(id);
    match node.uuid {
        Some(u) => format!("uuid:{}", hex::encode(u)),
        None => node.typ.to_string(),
    }
}

fn print_box(tree: &BoxTree, id: NodeId, depth: usize, max_depth: usize, decode: bool) {
    let indent = "  ".repeat(depth);
    let node = tree.node(id);
    let offset = format!("{:#x}", tree.offset_of(id));
    let size = tree.size(id);
    let typ = display_type(tree, id);

    if node.data.is_container() {
        println!("{indent}{offset:>6} {size:>10} {typ} (container)");
    } else if let Some((version, flags)) = node.data.full_header() {
        println!("{indent}{offset:>6} {size:>10} {typ} (ver={version}, flags=0x{flags:06x})");
    } else {
        println!("{indent}{offset:>6} {size:>10} {typ}");
    }
    if decode {
        if let Some(fields) = box_fields(&node.data) {
            println!("{indent}        -> {fields}");
        }
    }
    if depth < max_depth {
        for &child in tree.children(id) {
            print_box(tree, child, depth + 1, max_depth, decode);
        }
    }
}

fn matches_selector(tree: &BoxTree, id: NodeId, sel: &str) -> bool {
    let node = tree.node(id);
    match (node.uuid, sel.strip_prefix("uuid:")) {
        (Some(u), Some(prefix)) => hex::encode(u).starts_with(&prefix.to_ascii_lowercase()),
        (None, None) => FourCC::from_str(sel) == Some(node.typ),
        _ => false,
    }
}

fn dump_raw(tree: &BoxTree, sel: &str, limit: usize) -> anyhow::Result<()> {
    let mut stack: Vec<NodeId> = tree.roots().iter().rev().copied().collect();
    let mut index = 0;
    while let Some(id) = stack.pop() {
        stack.extend(tree.children(id).iter().rev().copied());
        if !matches_selector(tree, id, sel) {
            continue;
        }
        let mut bytes = Vec::new();
        tree.write_node(id, &mut bytes)?;
        let header = tree.header_size(id) as usize;
        let payload = &bytes[header..];
        let shown = if limit == 0 { payload.len() } else { limit.min(payload.len()) };
        let offset = tree.offset_of(id) + header as u64;
        println!(
            "\n== Dump {index} ({}) payload: offset={offset:#x}, len={shown} ==",
            display_type(tree, id)
        );
        print!("{}", hex_dump(&payload[..shown], offset));
        index += 1;
    }
    Ok(())
}

fn select_by_path(tree: &BoxTree, path: &str) -> Vec<NodeId> {
    let mut current: Option<Vec<NodeId>> = None;
    for seg in path.split('.') {
        let (name, idx) = parse_segment(seg);
        let Some(fourcc) = FourCC::from_str(name) else {
            return Vec::new();
        };
        let candidates: Vec<NodeId> = match &current {
            None => tree.roots().to_vec(),
            Some(parents) => parents.iter().flat_map(|&p| tree.children(p).to_vec()).collect(),
        };
        let matches: Vec<NodeId> =
            candidates.into_iter().filter(|&c| tree.node(c).typ == fourcc).collect();
        let next = match idx {
            Some(i) => matches.get(i).copied().into_iter().collect(),
            None => matches,
        };
        if next.is_empty() {
            return next;
        }
        current = Some(next);
    }
    current.unwrap_or_default()
}

fn parse_segment(seg: &str) -> (&str, Option<usize>) {
    match seg.find('[') {
        Some(l) => {
            let name = &seg[..l];
            let idx = seg[l + 1..]
                .find(']')
                .and_then(|r| seg[l + 1..l + 1 + r].parse::<usize>().ok());
            (name, idx)
        }
        None => (seg, None),
    }
}
