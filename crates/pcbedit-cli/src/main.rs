//! PCB board editing CLI.
//!
//! Provides the `pcbedit` binary, which drives the edit operations of
//! `pcbedit-edit` on boards stored as JSON files: invariant checks, net
//! segment connectivity reports, removal with re-splitting, and
//! copy/paste through a JSON clipboard file.
//!
//! Exit codes: 0 = success, 1 = edit failed (board unchanged),
//! 2 = invariant violation or internal fault, 3 = I/O or parse error.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use pcbedit_core::{
    Board, BoardDocument, ComponentId, HoleId, IdGenerator, NetLabelId, NetSegmentId, NodeId,
    PlaneId, Point, PolygonId, RandomIds, SequentialIds, StrokeTextId, TraceId, ViaId,
};
use pcbedit_edit::{
    paste_board_items, remove_board_items, ClipboardData, ClipboardDataBuilder, EditConfig,
    EditError, NetSegmentSplitter, Selection,
};

/// PCB board editing tools.
#[derive(Parser)]
#[command(name = "pcbedit", about = "PCB board editing tools")]
struct Cli {
    /// Edit configuration file (JSON).
    #[arg(long, global = true, env = "PCBEDIT_CONFIG")]
    config: Option<PathBuf>,

    /// Generate sequential identities starting at this value instead of
    /// random ones.
    #[arg(long, global = true)]
    seed: Option<u128>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Verify the structural invariants of a board.
    Check {
        /// Board file.
        board: PathBuf,
    },

    /// Report the connected parts of each net segment without modifying
    /// the board.
    Split {
        /// Board file.
        board: PathBuf,

        /// Only report this net segment.
        #[arg(short, long)]
        segment: Option<Uuid>,
    },

    /// Remove items from a board, re-splitting affected net segments.
    Remove {
        /// Board file.
        board: PathBuf,

        #[command(flatten)]
        items: ItemArgs,

        /// Output file (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Copy items from a board into a clipboard file.
    Copy {
        /// Board file.
        board: PathBuf,

        #[command(flatten)]
        items: ItemArgs,

        /// Reference position of the copy, as `x,y`.
        #[arg(long, default_value = "0,0", value_parser = parse_point, allow_hyphen_values = true)]
        reference: Point,

        /// Output file (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Paste a clipboard file into a board.
    Paste {
        /// Board file.
        board: PathBuf,

        /// Clipboard file written by `copy`.
        clipboard: PathBuf,

        /// Translation applied to every pasted item, as `x,y`.
        #[arg(long, default_value = "0,0", value_parser = parse_point, allow_hyphen_values = true)]
        offset: Point,

        /// Output file (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Item selection shared by `remove` and `copy`.
#[derive(Args, Debug, Default)]
struct ItemArgs {
    #[arg(long = "junction")]
    junctions: Vec<Uuid>,
    #[arg(long = "via")]
    vias: Vec<Uuid>,
    #[arg(long = "trace")]
    traces: Vec<Uuid>,
    #[arg(long = "label")]
    labels: Vec<Uuid>,
    /// Component whose placed device is selected.
    #[arg(long = "device")]
    devices: Vec<Uuid>,
    #[arg(long = "plane")]
    planes: Vec<Uuid>,
    #[arg(long = "polygon")]
    polygons: Vec<Uuid>,
    #[arg(long = "hole")]
    holes: Vec<Uuid>,
    #[arg(long = "text")]
    stroke_texts: Vec<Uuid>,
}

impl ItemArgs {
    fn selection(&self) -> Selection {
        Selection {
            junctions: self.junctions.iter().copied().map(NodeId).collect(),
            vias: self.vias.iter().copied().map(ViaId).collect(),
            traces: self.traces.iter().copied().map(TraceId).collect(),
            labels: self.labels.iter().copied().map(NetLabelId).collect(),
            devices: self.devices.iter().copied().map(ComponentId).collect(),
            planes: self.planes.iter().copied().map(PlaneId).collect(),
            polygons: self.polygons.iter().copied().map(PolygonId).collect(),
            holes: self.holes.iter().copied().map(HoleId).collect(),
            stroke_texts: self.stroke_texts.iter().copied().map(StrokeTextId).collect(),
        }
    }

    fn clipboard<'d>(&self, board: &'d Board) -> ClipboardDataBuilder<'d, Board> {
        let selection = self.selection();
        let mut builder = ClipboardDataBuilder::new(board);
        for id in selection.devices {
            builder = builder.device(id);
        }
        for id in selection.vias {
            builder = builder.via(id);
        }
        for id in selection.traces {
            builder = builder.trace(id);
        }
        for id in selection.labels {
            builder = builder.label(id);
        }
        for id in selection.planes {
            builder = builder.plane(id);
        }
        for id in selection.polygons {
            builder = builder.polygon(id);
        }
        for id in selection.holes {
            builder = builder.hole(id);
        }
        for id in selection.stroke_texts {
            builder = builder.stroke_text(id);
        }
        builder
    }
}

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => match EditConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(3);
            }
        },
        None => EditConfig::default(),
    };

    let exit_code = match cli.seed {
        Some(seed) => run(cli.command, &config, &mut SequentialIds::starting_at(seed)),
        None => run(cli.command, &config, &mut RandomIds),
    };
    process::exit(exit_code);
}

/// Execute one subcommand and return its exit code.
fn run<I: IdGenerator>(command: Commands, config: &EditConfig, ids: &mut I) -> i32 {
    match command {
        Commands::Check { board } => run_check(&board),
        Commands::Split { board, segment } => run_split(&board, segment.map(NetSegmentId), ids),
        Commands::Remove {
            board,
            items,
            output,
        } => run_remove(&board, &items, output.as_deref(), config, ids),
        Commands::Copy {
            board,
            items,
            reference,
            output,
        } => run_copy(&board, &items, reference, output.as_deref(), ids),
        Commands::Paste {
            board,
            clipboard,
            offset,
            output,
        } => run_paste(&board, &clipboard, offset, output.as_deref(), config, ids),
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

/// Summary printed by `check`.
#[derive(Serialize)]
struct BoardSummary<'a> {
    name: &'a str,
    net_segments: usize,
    junctions: usize,
    vias: usize,
    traces: usize,
    devices: usize,
}

fn run_check(path: &Path) -> i32 {
    let board = match load_board(path) {
        Ok(board) => board,
        Err(code) => return code,
    };
    if let Err(e) = board.check_invariants() {
        eprintln!("Invariant violation: {}", e);
        return 2;
    }
    print_json(&BoardSummary {
        name: board.name(),
        net_segments: board.net_segments().count(),
        junctions: board.junction_count(),
        vias: board.via_count(),
        traces: board.trace_count(),
        devices: board.devices().count(),
    })
}

/// One connected part of a net segment, as printed by `split`.
#[derive(Serialize)]
struct PartReport {
    segment: NetSegmentId,
    net: String,
    junctions: Vec<NodeId>,
    vias: Vec<ViaId>,
    traces: Vec<TraceId>,
    labels: Vec<NetLabelId>,
    placeholders: Vec<NodeId>,
}

fn run_split<I: IdGenerator>(path: &Path, only: Option<NetSegmentId>, ids: &mut I) -> i32 {
    let board = match load_board(path) {
        Ok(board) => board,
        Err(code) => return code,
    };
    if let Some(id) = only {
        if board.net_segment(id).is_none() {
            eprintln!("Error: net segment {} not found", id);
            return 1;
        }
    }

    let mut reports = Vec::new();
    for segment in board.net_segments() {
        if only.is_some_and(|id| id != segment.id) {
            continue;
        }
        let mut splitter = NetSegmentSplitter::new();
        for junction in segment.junctions.values() {
            splitter.add_junction(junction.clone());
        }
        for via in segment.vias.values() {
            splitter.add_via(via.clone());
        }
        for trace in segment.traces.keys() {
            match board.anchored_trace(*trace) {
                Ok(anchored) => splitter.add_trace(anchored),
                Err(e) => return edit_failure(EditError::from(e)),
            }
        }
        for label in segment.labels.values() {
            splitter.add_label(label.clone());
        }
        for component in board.device_components() {
            splitter.add_device(component);
        }
        let parts = match splitter.split(ids) {
            Ok(parts) => parts,
            Err(e) => return edit_failure(e),
        };
        if parts.len() > 1 {
            info!(segment = %segment.id, parts = parts.len(), "net segment is not connected");
        }
        for part in parts {
            reports.push(PartReport {
                segment: segment.id,
                net: segment.net_name.clone(),
                junctions: part.junctions.iter().map(|j| j.id).collect(),
                vias: part.vias.iter().map(|v| v.id).collect(),
                traces: part.traces.iter().map(|t| t.id()).collect(),
                labels: part.labels.iter().map(|l| l.id).collect(),
                placeholders: part.placeholders,
            });
        }
    }
    print_json(&reports)
}

fn run_remove<I: IdGenerator>(
    path: &Path,
    items: &ItemArgs,
    output: Option<&Path>,
    config: &EditConfig,
    ids: &mut I,
) -> i32 {
    let mut board = match load_board(path) {
        Ok(board) => board,
        Err(code) => return code,
    };
    match remove_board_items(&mut board, ids, &items.selection(), config) {
        Ok(outcome) if outcome.is_noop() => info!("nothing to remove"),
        Ok(_) => {}
        Err(e) => return edit_failure(e),
    }
    write_board(&board, output)
}

fn run_copy<I: IdGenerator>(
    path: &Path,
    items: &ItemArgs,
    reference: Point,
    output: Option<&Path>,
    ids: &mut I,
) -> i32 {
    let board = match load_board(path) {
        Ok(board) => board,
        Err(code) => return code,
    };
    if !items.junctions.is_empty() {
        info!("junctions are copied with their traces; --junction ignored");
    }
    let data = match items.clipboard(&board).build(reference, ids) {
        Ok(data) => data,
        Err(e) => return edit_failure(e),
    };
    if data.is_empty() {
        info!("clipboard is empty");
    }
    match serde_json::to_string_pretty(&data) {
        Ok(json) => write_output(&json, output),
        Err(e) => {
            eprintln!("Error: failed to serialize clipboard: {}", e);
            3
        }
    }
}

fn run_paste<I: IdGenerator>(
    path: &Path,
    clipboard: &Path,
    offset: Point,
    output: Option<&Path>,
    config: &EditConfig,
    ids: &mut I,
) -> i32 {
    let mut board = match load_board(path) {
        Ok(board) => board,
        Err(code) => return code,
    };
    let data: ClipboardData = match read_file(clipboard)
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
    {
        Ok(data) => data,
        Err(msg) => {
            eprintln!("Error: failed to load clipboard '{}': {}", clipboard.display(), msg);
            return 3;
        }
    };
    match paste_board_items(&mut board, ids, &data, offset, config) {
        Ok((_, report)) => {
            info!(
                pasted = report.pasted_devices.len(),
                skipped = report.skipped_devices.len(),
                placeholders = report.placeholders.len(),
                "paste finished"
            );
        }
        Err(e) => return edit_failure(e),
    }
    write_board(&board, output)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a point given as `x,y` (nanometres).
fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("invalid point '{}', expected x,y", s))?;
    let x = x
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid x coordinate '{}': {}", x, e))?;
    let y = y
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid y coordinate '{}': {}", y, e))?;
    Ok(Point::new(x, y))
}

fn read_file(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| e.to_string())
}

/// Load a board, printing the error and returning the exit code on failure.
fn load_board(path: &Path) -> Result<Board, i32> {
    let board = read_file(path)
        .and_then(|text| Board::from_json(&text).map_err(|e| e.to_string()))
        .map_err(|msg| {
            eprintln!("Error: failed to load board '{}': {}", path.display(), msg);
            3
        })?;
    info!(board = board.name(), path = %path.display(), "board loaded");
    Ok(board)
}

fn write_board(board: &Board, output: Option<&Path>) -> i32 {
    match board.to_json() {
        Ok(json) => write_output(&json, output),
        Err(e) => {
            eprintln!("Error: failed to serialize board: {}", e);
            3
        }
    }
}

fn write_output(text: &str, output: Option<&Path>) -> i32 {
    match output {
        Some(path) => match fs::write(path, text) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: failed to write '{}': {}", path.display(), e);
                3
            }
        },
        None => {
            println!("{}", text);
            0
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: failed to serialize result: {}", e);
            3
        }
    }
}

/// Report a failed edit. Bug-class faults get exit code 2.
fn edit_failure(err: EditError) -> i32 {
    if err.is_bug() {
        eprintln!("Internal fault: {}", err);
        2
    } else {
        eprintln!("Edit failed: {}", err);
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_points() {
        assert_eq!(parse_point("10,-20").unwrap(), Point::new(10, -20));
        assert_eq!(parse_point(" 3 , 4 ").unwrap(), Point::new(3, 4));
        assert!(parse_point("10").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn cli_parses_remove_selection() {
        let id = Uuid::from_u128(7);
        let cli = Cli::try_parse_from([
            "pcbedit",
            "remove",
            "board.json",
            "--junction",
            &id.to_string(),
            "--via",
            &id.to_string(),
            "--plane",
            &id.to_string(),
        ])
        .unwrap();
        match cli.command {
            Commands::Remove { items, .. } => {
                let selection = items.selection();
                assert!(selection.junctions.contains(&NodeId(id)));
                assert!(selection.vias.contains(&ViaId(id)));
                assert!(selection.planes.contains(&PlaneId(id)));
                assert!(selection.traces.is_empty());
            }
            _ => panic!("expected remove"),
        }
    }

    #[test]
    fn paste_accepts_negative_offset() {
        let cli =
            Cli::try_parse_from(["pcbedit", "paste", "b.json", "c.json", "--offset", "-50,25"])
                .unwrap();
        match cli.command {
            Commands::Paste { offset, .. } => assert_eq!(offset, Point::new(-50, 25)),
            _ => panic!("expected paste"),
        }
    }

    #[test]
    fn bug_class_errors_exit_with_two() {
        let err = EditError::StructuralInvariantViolation {
            reason: "dangling".into(),
        };
        assert_eq!(edit_failure(err), 2);
        assert_eq!(
            edit_failure(EditError::MissingLayer {
                name: "top_cu".into()
            }),
            1
        );
    }
}
