use clap::{ArgAction, Parser};
use mp4tree::{
    BoxClass, BoxNode, BoxRegistry, DecoderRegistry, FourCC, ParseOptions, RenderOptions,
    Renderer, default_decoders, parse_file, render::ReadSeek, write_diagnostics,
};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(version, about = "Print the box structure of an MP4/ISOBMFF file")]
struct Args {
    /// MP4/ISOBMFF file path
    path: String,

    /// Only print subtree(s) matching a dotted path (e.g. moov.trak[0].mdia.minf.stbl)
    #[arg(long = "filter")]
    filter: Option<String>,

    /// Nesting limit while parsing; deeper containers are reported, not walked
    #[arg(long, default_value_t = mp4tree::parser::DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Limit printed depth (text output only)
    #[arg(long)]
    depth: Option<usize>,

    /// Decode and print header fields of known boxes
    #[arg(long, action = ArgAction::SetTrue)]
    decode: bool,

    /// Print each box's descriptive name
    #[arg(long, action = ArgAction::SetTrue)]
    names: bool,

    /// Emit JSON instead of the indented listing
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Debug logging on stderr (RUST_LOG overrides)
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if args.verbose {
            "mp4tree=debug".to_string()
        } else {
            "mp4tree=warn".to_string()
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(io::stderr)
        .init();

    let registry = BoxRegistry::standard();
    let outcome = parse_file(
        &args.path,
        &registry,
        ParseOptions {
            max_depth: args.max_depth,
        },
    )?;

    let targets: Vec<&BoxNode> = match &args.filter {
        Some(path) => select_by_path(&outcome.boxes, path),
        None => outcome.boxes.iter().collect(),
    };

    let decoders = default_decoders();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.json {
        let mut src = BufReader::new(File::open(&args.path)?); // fresh handle for decoding
        let decode = args.decode.then_some(&decoders);
        let boxes: Vec<JsonBox> = targets
            .iter()
            .map(|b| build_json_for_box(&mut src, b, decode, &registry))
            .collect();
        let report = JsonReport {
            file: &args.path,
            state: outcome.state,
            boxes,
            diagnostics: &outcome.diagnostics,
        };
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        let renderer = Renderer::new(
            &registry,
            RenderOptions {
                max_depth: args.depth.unwrap_or(usize::MAX),
                names: args.names,
            },
        );
        if args.decode {
            let mut src = BufReader::new(File::open(&args.path)?);
            renderer.write_tree_decoded(&mut out, targets.iter().copied(), &mut src, &decoders)?;
        } else {
            renderer.write_tree(&mut out, targets.iter().copied())?;
        }
        writeln!(out, "{} boxes selected", count_boxes(targets.iter().copied()))?;
        write_diagnostics(&mut out, &outcome.diagnostics)?;
    }

    if outcome.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}

/// Boxes in the selected subtrees, children included.
fn count_boxes<'a>(boxes: impl IntoIterator<Item = &'a BoxNode>) -> usize {
    boxes
        .into_iter()
        .map(|b| 1 + b.children.as_deref().map_or(0, |kids| count_boxes(kids)))
        .sum()
}

// ---------- Filter path: moov.trak[0].mdia.minf.stbl ----------

fn select_by_path<'a>(roots: &'a [BoxNode], path: &str) -> Vec<&'a BoxNode> {
    let mut current: Vec<&'a BoxNode> = Vec::new();

    for (depth, seg) in path.split('.').enumerate() {
        let (name, idx) = parse_segment(seg);
        let fourcc = FourCC::from_str(name).unwrap_or(FourCC(*b"????"));

        let candidates: Vec<&'a [BoxNode]> = if depth == 0 {
            vec![roots]
        } else {
            current
                .iter()
                .filter_map(|b| b.children.as_deref())
                .collect()
        };

        let mut next = Vec::new();
        for list in candidates {
            let matches: Vec<&BoxNode> = list.iter().filter(|b| b.typ() == fourcc).collect();
            match idx {
                Some(i) => next.extend(matches.get(i).copied()),
                None => next.extend(matches),
            }
        }

        current = next;
        if current.is_empty() {
            break;
        }
    }

    current
}

fn parse_segment(seg: &str) -> (&str, Option<usize>) {
    if let Some(l) = seg.find('[') {
        let name = &seg[..l];
        if let Some(r) = seg[l + 1..].find(']') {
            let idx = seg[l + 1..l + 1 + r].parse::<usize>().ok();
            return (name, idx);
        }
        (name, None)
    } else {
        (seg, None)
    }
}

// ---------- JSON representation ----------

#[derive(Serialize)]
struct JsonReport<'a> {
    file: &'a str,
    state: mp4tree::RangeState,
    boxes: Vec<JsonBox>,
    diagnostics: &'a [mp4tree::Diagnostic],
}

#[derive(Serialize)]
struct JsonBox {
    offset: u64,
    size: u64,
    header_size: u64,
    typ: String,
    uuid: Option<String>,
    class: BoxClass,
    full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    decoded: Option<Vec<mp4tree::Field>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decode_error: Option<String>,
    children: Option<Vec<JsonBox>>,
}

fn build_json_for_box(
    src: &mut dyn ReadSeek,
    b: &BoxNode,
    decoders: Option<&DecoderRegistry>,
    registry: &BoxRegistry,
) -> JsonBox {
    let hdr = &b.header;

    let (decoded, decode_error) = match decoders.and_then(|d| d.decode_node(&mut *src, b, registry)) {
        Some(Ok(fields)) => (Some(fields), None),
        Some(Err(e)) => (None, Some(e.to_string())),
        None => (None, None),
    };

    let children = b.children.as_ref().map(|kids| {
        kids.iter()
            .map(|c| build_json_for_box(&mut *src, c, decoders, registry))
            .collect()
    });

    JsonBox {
        offset: hdr.start,
        size: hdr.size,
        header_size: hdr.header_size,
        typ: hdr.typ.to_string(),
        uuid: hdr.uuid.map(hex::encode),
        class: b.class,
        full_name: registry.full_name(hdr.typ).to_string(),
        decoded,
        decode_error,
        children,
    }
}
