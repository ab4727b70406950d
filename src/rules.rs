//! Rules adapter over the `chess` crate
//!
//! The rest of the system never touches the rules library directly: it hands
//! a [`LiveBoard`] a candidate move and gets back either the applied move
//! (with SAN notation and the resulting FEN) or a rejection, plus terminal
//! classification of the current position.
//!
//! The underlying library validates legality and detects checkmate/stalemate,
//! but does not track repetition or the halfmove clock at the board level, so
//! the wrapper carries a position-hash multiset and its own clocks. That keeps
//! terminal classification complete: checkmate, stalemate, threefold
//! repetition, insufficient material, fifty-move draw - checked in that order.

use std::collections::HashMap;
use std::str::FromStr;

use chess::{Board, BoardStatus, ChessMove, Game, MoveGen, Piece, Square};
use thiserror::Error;

use crate::core_types::Color;

/// Why a candidate move was not applied.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("invalid square: {0}")]
    InvalidSquare(String),

    #[error("invalid promotion piece: {0}")]
    InvalidPromotion(String),

    #[error("illegal move")]
    Illegal,
}

/// Game-ending classification of a position or signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    Checkmate,
    Stalemate,
    /// Draw by threefold repetition.
    Threefold,
    /// Draw by insufficient mating material.
    Insufficient,
    /// Fifty-move rule (or any other automatic draw).
    Draw,
}

impl TerminalKind {
    /// Wire reason string, matching the `gameOver` event vocabulary.
    pub fn reason(self) -> &'static str {
        match self {
            TerminalKind::Checkmate => "checkmate",
            TerminalKind::Stalemate => "stalemate",
            TerminalKind::Threefold => "threefold",
            TerminalKind::Insufficient => "insufficient",
            TerminalKind::Draw => "draw",
        }
    }

    /// Whether this terminal state has a winner (the side that delivered it).
    pub fn is_decisive(self) -> bool {
        matches!(self, TerminalKind::Checkmate)
    }
}

/// An accepted, applied move.
#[derive(Debug, Clone)]
pub struct AppliedMove {
    pub from: String,
    pub to: String,
    /// SAN notation (e.g. "Nxf7+", "O-O", "e8=Q#").
    pub notation: String,
    /// FEN of the position after the move.
    pub fen: String,
}

/// A live position: the rules library's game plus the repetition/clock
/// bookkeeping the library leaves to the caller.
pub struct LiveBoard {
    game: Game,
    /// Zobrist hash -> number of times the position occurred.
    seen: HashMap<u64, u32>,
    halfmove_clock: u32,
    fullmove_number: u32,
}

impl LiveBoard {
    /// Standard starting position.
    pub fn new() -> Self {
        let game = Game::new();
        let mut seen = HashMap::new();
        seen.insert(game.current_position().get_hash(), 1);
        Self {
            game,
            seen,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// Position from a FEN string. Repetition history starts empty, the
    /// clocks are taken from the FEN's last two fields.
    pub fn from_fen(fen: &str) -> Result<Self, chess::Error> {
        let board = Board::from_str(fen)?;
        let fields: Vec<&str> = fen.split_whitespace().collect();
        let halfmove_clock = fields.get(4).and_then(|f| f.parse().ok()).unwrap_or(0);
        let fullmove_number = fields.get(5).and_then(|f| f.parse().ok()).unwrap_or(1);
        let game = Game::new_with_board(board);
        let mut seen = HashMap::new();
        seen.insert(game.current_position().get_hash(), 1);
        Ok(Self {
            game,
            seen,
            halfmove_clock,
            fullmove_number,
        })
    }

    /// FEN of the current position, with the clock fields maintained here.
    pub fn fen(&self) -> String {
        let base = self.game.current_position().to_string();
        let mut fields: Vec<String> = base.split_whitespace().map(str::to_string).collect();
        if fields.len() == 6 {
            fields[4] = self.halfmove_clock.to_string();
            fields[5] = self.fullmove_number.to_string();
        }
        fields.join(" ")
    }

    /// Whose turn it is.
    pub fn side_to_move(&self) -> Color {
        match self.game.side_to_move() {
            chess::Color::White => Color::White,
            chess::Color::Black => Color::Black,
        }
    }

    /// Validate and apply a candidate move.
    pub fn apply(
        &mut self,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> Result<AppliedMove, MoveError> {
        let source = Square::from_str(from).map_err(|_| MoveError::InvalidSquare(from.into()))?;
        let dest = Square::from_str(to).map_err(|_| MoveError::InvalidSquare(to.into()))?;
        let promo = promotion.map(parse_promotion).transpose()?;
        let mv = ChessMove::new(source, dest, promo);

        let before = self.game.current_position();
        if !before.legal(mv) {
            return Err(MoveError::Illegal);
        }

        let moved_piece = before.piece_on(source);
        let is_capture = before.piece_on(dest).is_some()
            || (moved_piece == Some(Piece::Pawn) && source.get_file() != dest.get_file());

        if !self.game.make_move(mv) {
            return Err(MoveError::Illegal);
        }
        let after = self.game.current_position();

        // Clock bookkeeping: captures and pawn moves reset the halfmove
        // clock; the fullmove number advances after black moves.
        if is_capture || moved_piece == Some(Piece::Pawn) {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if after.side_to_move() == chess::Color::White {
            self.fullmove_number += 1;
        }
        *self.seen.entry(after.get_hash()).or_insert(0) += 1;

        let notation = san(&before, mv, &after, is_capture);
        Ok(AppliedMove {
            from: from.to_string(),
            to: to.to_string(),
            notation,
            fen: self.fen(),
        })
    }

    /// Terminal classification of the current position, if any.
    pub fn terminal(&self) -> Option<TerminalKind> {
        let board = self.game.current_position();
        match board.status() {
            BoardStatus::Checkmate => return Some(TerminalKind::Checkmate),
            BoardStatus::Stalemate => return Some(TerminalKind::Stalemate),
            BoardStatus::Ongoing => {}
        }
        if self.seen.get(&board.get_hash()).copied().unwrap_or(0) >= 3 {
            return Some(TerminalKind::Threefold);
        }
        if insufficient_material(&board) {
            return Some(TerminalKind::Insufficient);
        }
        if self.halfmove_clock >= 100 {
            return Some(TerminalKind::Draw);
        }
        None
    }
}

impl Default for LiveBoard {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_promotion(p: &str) -> Result<Piece, MoveError> {
    match p.to_ascii_lowercase().as_str() {
        "q" => Ok(Piece::Queen),
        "r" => Ok(Piece::Rook),
        "b" => Ok(Piece::Bishop),
        "n" => Ok(Piece::Knight),
        other => Err(MoveError::InvalidPromotion(other.into())),
    }
}

/// Neither side can force mate: bare kings, a single minor piece, or bishops
/// that all live on one square color.
fn insufficient_material(board: &Board) -> bool {
    let majors =
        *board.pieces(Piece::Pawn) | *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen);
    if majors.popcnt() > 0 {
        return false;
    }
    let knights = board.pieces(Piece::Knight).popcnt();
    let bishops = *board.pieces(Piece::Bishop);
    if knights == 0 && bishops.popcnt() == 0 {
        return true;
    }
    if knights == 1 && bishops.popcnt() == 0 {
        return true;
    }
    if knights == 0 {
        // All bishops on the same square color cannot deliver mate.
        let (mut light, mut dark) = (0u32, 0u32);
        for sq in bishops {
            if (sq.get_rank().to_index() + sq.get_file().to_index()) % 2 == 0 {
                dark += 1;
            } else {
                light += 1;
            }
        }
        return light == 0 || dark == 0;
    }
    false
}

fn piece_letter(piece: Piece) -> &'static str {
    match piece {
        Piece::Pawn => "",
        Piece::Knight => "N",
        Piece::Bishop => "B",
        Piece::Rook => "R",
        Piece::Queen => "Q",
        Piece::King => "K",
    }
}

/// Standard algebraic notation for a legal move on `before`.
fn san(before: &Board, mv: ChessMove, after: &Board, is_capture: bool) -> String {
    let source = mv.get_source();
    let dest = mv.get_dest();
    let piece = before.piece_on(source).unwrap_or(Piece::Pawn);

    let mut out = String::new();
    let castle = piece == Piece::King
        && source
            .get_file()
            .to_index()
            .abs_diff(dest.get_file().to_index())
            >= 2;
    if castle {
        out.push_str(if dest.get_file().to_index() > source.get_file().to_index() {
            "O-O"
        } else {
            "O-O-O"
        });
    } else if piece == Piece::Pawn {
        if is_capture {
            out.push(file_char(source));
            out.push('x');
        }
        out.push_str(&dest.to_string());
        if let Some(promo) = mv.get_promotion() {
            out.push('=');
            out.push_str(piece_letter(promo));
        }
    } else {
        out.push_str(piece_letter(piece));
        out.push_str(&disambiguation(before, piece, source, dest));
        if is_capture {
            out.push('x');
        }
        out.push_str(&dest.to_string());
    }

    match after.status() {
        BoardStatus::Checkmate => out.push('#'),
        _ if after.checkers().popcnt() > 0 => out.push('+'),
        _ => {}
    }
    out
}

/// File/rank prefix when another identical piece could reach the same square.
fn disambiguation(before: &Board, piece: Piece, source: Square, dest: Square) -> String {
    let rivals: Vec<Square> = MoveGen::new_legal(before)
        .filter(|m| {
            m.get_dest() == dest
                && m.get_source() != source
                && before.piece_on(m.get_source()) == Some(piece)
        })
        .map(|m| m.get_source())
        .collect();
    if rivals.is_empty() {
        return String::new();
    }
    if rivals.iter().all(|s| s.get_file() != source.get_file()) {
        return file_char(source).to_string();
    }
    if rivals.iter().all(|s| s.get_rank() != source.get_rank()) {
        return (source.get_rank().to_index() + 1).to_string();
    }
    source.to_string()
}

fn file_char(sq: Square) -> char {
    (b'a' + sq.get_file().to_index() as u8) as char
}
