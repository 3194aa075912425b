//! A thin USI-shaped stdin/stdout loop over [`tsume_core::MateSolver`].
//!
//! Handles just enough of the USI protocol to drive a mate search from a
//! GUI or test harness: `usi`, `isready`, `setoption`, `position`, `go mate`,
//! `stop`, `quit`. All search logic lives in `tsume-core`; this binary only
//! parses commands and reports results.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use tsume_core::engine::{EngineOptions, PostSearchLevel, SearchMonitor};
use tsume_core::hand::HandPiece;
use tsume_core::shogi::board::Board;
use tsume_core::shogi::movegen::NaiveMoveGenerator;
use tsume_core::shogi::position::MateSearchPosition;
use tsume_core::shogi::types::{Move, Square};
use tsume_core::types::color::Color;
use tsume_core::{MateSolver, SolveOutcome};

const ENGINE_NAME: &str = "tsume-usi";
const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
const ENGINE_AUTHOR: &str = "SH11235";

/// Starting position for `position startpos`: a bare pair of kings with no
/// other material, since this engine only ever solves tsume problems (an
/// unadorned opening position is never itself a mating problem).
fn startpos_board() -> Board {
    let mut board = Board::empty();
    board.set_attacker_king(Square::new(4, 8));
    board.set_defender_king(Square::new(4, 0));
    board.set_side_to_move(Color::Black);
    board
}

struct UsiEngine {
    board: Board,
    options: EngineOptions,
    solver: Option<MateSolver>,
    search_thread: Option<thread::JoinHandle<(MateSolver, SolveOutcome)>>,
    stop_handle: Option<Arc<SearchMonitor>>,
}

impl UsiEngine {
    fn new() -> UsiEngine {
        let options = EngineOptions::default();
        UsiEngine {
            board: startpos_board(),
            solver: Some(MateSolver::new(options.clone())),
            options,
            search_thread: None,
            stop_handle: None,
        }
    }

    fn process_command(&mut self, line: &str) -> Result<bool> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = tokens.first() else { return Ok(true) };

        match cmd {
            "usi" => self.cmd_usi(),
            "isready" => self.cmd_isready(),
            "setoption" => self.cmd_setoption(&tokens),
            "usinewgame" => self.cmd_usinewgame(),
            "position" => self.cmd_position(&tokens),
            "go" => self.cmd_go(&tokens),
            "stop" => self.cmd_stop(),
            "quit" => {
                self.cmd_stop();
                return Ok(false);
            }
            _ => {}
        }

        Ok(true)
    }

    fn cmd_usi(&self) {
        println!("id name {ENGINE_NAME} {ENGINE_VERSION}");
        println!("id author {ENGINE_AUTHOR}");
        println!("option name USI_Hash type spin default 1024 min 1 max 65536");
        println!("option name NodesLimit type spin default -1 min -1 max 2000000000");
        println!("option name RootIsAndNodeIfChecked type check default true");
        println!("option name PostSearch type combo default None var None var UpperBound var MinLength");
        println!("option name MultiPV type spin default 1 min 1 max 64");
        println!("option name TtReadPath type string default <empty>");
        println!("option name TtWritePath type string default <empty>");
        println!("usiok");
    }

    fn cmd_isready(&self) {
        println!("readyok");
    }

    fn cmd_setoption(&mut self, tokens: &[&str]) {
        self.wait_for_search();

        let mut name = String::new();
        let mut value = String::new();
        let mut parsing_name = false;
        let mut parsing_value = false;
        for token in tokens.iter().skip(1) {
            match *token {
                "name" => {
                    parsing_name = true;
                    parsing_value = false;
                }
                "value" => {
                    parsing_name = false;
                    parsing_value = true;
                }
                _ => {
                    if parsing_name {
                        if !name.is_empty() {
                            name.push(' ');
                        }
                        name.push_str(token);
                    } else if parsing_value {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(token);
                    }
                }
            }
        }

        match name.as_str() {
            "USI_Hash" => {
                if let Ok(mb) = value.parse::<u64>() {
                    self.options.hash_mb = mb;
                    if let Some(solver) = self.solver.as_mut() {
                        solver.resize_tt(mb);
                    }
                }
            }
            "NodesLimit" => {
                if let Ok(v) = value.parse::<i64>() {
                    self.options.nodes_limit = EngineOptions::make_inf_if_not_positive(v);
                }
            }
            "RootIsAndNodeIfChecked" => {
                if let Ok(v) = value.parse::<bool>() {
                    self.options.root_is_and_node_if_checked = v;
                }
            }
            "PostSearch" => {
                self.options.post_search_level = match value.as_str() {
                    "UpperBound" => PostSearchLevel::UpperBound,
                    "MinLength" => PostSearchLevel::MinLength,
                    _ => PostSearchLevel::None,
                };
            }
            "MultiPV" => {
                if let Ok(v) = value.parse::<u32>() {
                    self.options.multi_pv = v.max(1);
                }
            }
            "TtReadPath" => {
                self.options.tt_read_path = if value == "<empty>" { String::new() } else { value };
            }
            "TtWritePath" => {
                self.options.tt_write_path = if value == "<empty>" { String::new() } else { value };
            }
            _ => {}
        }
    }

    fn cmd_usinewgame(&mut self) {
        self.cmd_stop();
        self.solver = Some(MateSolver::new(self.options.clone()));
    }

    fn cmd_position(&mut self, tokens: &[&str]) {
        let mut idx = 1;
        if idx >= tokens.len() {
            return;
        }

        if tokens[idx] == "startpos" {
            self.board = startpos_board();
            idx += 1;
        } else if tokens[idx] == "sfen" {
            idx += 1;
            let mut sfen_parts = Vec::new();
            while idx < tokens.len() && tokens[idx] != "moves" {
                sfen_parts.push(tokens[idx]);
                idx += 1;
            }
            match Board::from_sfen(&sfen_parts.join(" ")) {
                Ok(board) => self.board = board,
                Err(e) => {
                    eprintln!("info string error parsing sfen: {e}");
                    return;
                }
            }
        } else {
            return;
        }

        if idx < tokens.len() && tokens[idx] == "moves" {
            idx += 1;
            while idx < tokens.len() {
                match parse_usi_move(tokens[idx]) {
                    Some(mv) => {
                        self.board.do_move(mv);
                    }
                    None => {
                        eprintln!("info string error parsing move: {}", tokens[idx]);
                        break;
                    }
                }
                idx += 1;
            }
        }
    }

    fn cmd_go(&mut self, tokens: &[&str]) {
        self.cmd_stop();
        let Some(mate_idx) = tokens.iter().position(|&t| t == "mate") else {
            // Only mate search is supported; anything else is a no-op reply.
            println!("checkmate notimplemented");
            return;
        };

        // `go mate <ms>` bounds this search's wall clock; `go mate infinite`
        // (or no value at all) leaves `EngineOptions::time_limit_ms`'s
        // persistent setting untouched.
        match tokens.get(mate_idx + 1) {
            Some(&"infinite") | None => {}
            Some(v) => {
                if let Ok(ms) = v.parse::<u64>() {
                    self.options.time_limit_ms = ms;
                }
            }
        }

        let mut board = self.board.clone();
        let root_is_and_node = self.options.root_is_and_node_if_checked && board.in_check();

        let mut solver = self.solver.take().unwrap_or_else(|| MateSolver::new(self.options.clone()));
        *solver.options_mut() = self.options.clone();
        self.stop_handle = Some(solver.monitor_handle());

        self.search_thread = Some(thread::spawn(move || {
            let movegen = NaiveMoveGenerator;
            let outcome = solver.search(&mut board, !root_is_and_node, &movegen);
            print_checkmate_result(&solver, outcome);
            (solver, outcome)
        }));
    }

    fn cmd_stop(&mut self) {
        if let Some(handle) = &self.stop_handle {
            handle.request_stop();
        }
        self.wait_for_search();
    }

    fn wait_for_search(&mut self) {
        if let Some(handle) = self.search_thread.take() {
            match handle.join() {
                Ok((solver, _outcome)) => self.solver = Some(solver),
                Err(_) => {
                    eprintln!("info string search thread panicked, resetting solver");
                    self.solver = Some(MateSolver::new(self.options.clone()));
                }
            }
        }
        self.stop_handle = None;
    }
}

/// Renders a resolved search outcome as USI's `checkmate` response: the
/// move sequence on proof, `nomate` on disproof, `timeout` when the node
/// budget ran out before either side was settled.
fn print_checkmate_result(solver: &MateSolver, outcome: SolveOutcome) {
    match outcome {
        SolveOutcome::Proven { .. } => {
            let pv: Vec<String> = solver.best_moves().iter().map(|&mv| move_to_usi(mv)).collect();
            log::info!("pv: {}", pv.join(" "));
            println!("checkmate {}", pv.join(" "));
        }
        SolveOutcome::Disproven { .. } => {
            println!("checkmate nomate");
        }
        SolveOutcome::Unknown => {
            println!("checkmate timeout");
        }
    }
    io::stdout().flush().ok();
}

fn square_to_usi(sq: Square) -> String {
    format!("{}{}", sq.file() + 1, (b'a' + sq.rank()) as char)
}

fn parse_square(s: &str) -> Option<Square> {
    let mut chars = s.chars();
    let file = chars.next()?.to_digit(10)? as u8;
    let rank_char = chars.next()?;
    if !(1..=9).contains(&file) || !('a'..='i').contains(&rank_char) {
        return None;
    }
    Some(Square::new(file - 1, rank_char as u8 - b'a'))
}

fn hand_piece_from_usi_char(c: char) -> Option<HandPiece> {
    match c {
        'P' => Some(HandPiece::Pawn),
        'L' => Some(HandPiece::Lance),
        'N' => Some(HandPiece::Knight),
        'S' => Some(HandPiece::Silver),
        'G' => Some(HandPiece::Gold),
        'B' => Some(HandPiece::Bishop),
        'R' => Some(HandPiece::Rook),
        _ => None,
    }
}

fn hand_piece_to_usi_char(p: HandPiece) -> char {
    match p {
        HandPiece::Pawn => 'P',
        HandPiece::Lance => 'L',
        HandPiece::Knight => 'N',
        HandPiece::Silver => 'S',
        HandPiece::Gold => 'G',
        HandPiece::Bishop => 'B',
        HandPiece::Rook => 'R',
    }
}

/// Parses a USI move token: `<from><to>[+]` for a slide, `<PIECE>*<to>` for
/// a drop.
fn parse_usi_move(s: &str) -> Option<Move> {
    let bytes = s.as_bytes();
    if bytes.len() >= 3 && bytes[1] == b'*' {
        let piece = hand_piece_from_usi_char(bytes[0] as char)?;
        let to = parse_square(&s[2..])?;
        return Some(Move::Drop { piece, to });
    }

    let promote = s.ends_with('+');
    let body = if promote { &s[..s.len() - 1] } else { s };
    if body.len() != 4 {
        return None;
    }
    let from = parse_square(&body[0..2])?;
    let to = parse_square(&body[2..4])?;
    Some(Move::Normal { from, to, promote })
}

fn move_to_usi(mv: Move) -> String {
    match mv {
        Move::Normal { from, to, promote } => {
            let suffix = if promote { "+" } else { "" };
            format!("{}{}{}", square_to_usi(from), square_to_usi(to), suffix)
        }
        Move::Drop { piece, to } => format!("{}*{}", hand_piece_to_usi_char(piece), square_to_usi(to)),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let mut engine = UsiEngine::new();
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if !engine.process_command(line.trim())? {
            break;
        }
    }
    Ok(())
}
