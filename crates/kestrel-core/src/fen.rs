//! FEN helpers that the board library does not cover: move counters and
//! colour mirroring.

use crate::FenError;

/// FEN of the standard starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// A FEN string split into its six fields, with missing counters defaulted.
#[derive(Debug)]
pub(crate) struct FenFields<'a> {
    pub placement: &'a str,
    pub side: &'a str,
    pub castling: &'a str,
    pub en_passant: &'a str,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl<'a> FenFields<'a> {
    pub fn parse(fen: &'a str) -> Result<Self, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(FenError::MissingFields { found: fields.len() });
        }
        let counter = |idx: usize, field: &'static str, default: u32| match fields.get(idx) {
            None => Ok(default),
            Some(text) => text.parse::<u32>().map_err(|_| FenError::InvalidCounter {
                field,
                found: (*text).to_string(),
            }),
        };
        check_placement(fields[0])?;
        Ok(Self {
            placement: fields[0],
            side: fields[1],
            castling: fields[2],
            en_passant: fields[3],
            halfmove_clock: counter(4, "halfmove clock", 0)?,
            fullmove_number: counter(5, "fullmove number", 1)?,
        })
    }

    /// The four fields the board itself understands, single-space separated.
    pub fn board_part(&self) -> String {
        format!(
            "{} {} {} {} 0 1",
            self.placement, self.side, self.castling, self.en_passant
        )
    }
}

/// Reject piece placements the board library cannot represent: wrong rank
/// or file counts, unknown pieces, or anything but one king per side.
fn check_placement(placement: &str) -> Result<(), FenError> {
    let invalid = |reason| FenError::InvalidPlacement {
        placement: placement.to_string(),
        reason,
    };
    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return Err(invalid("expected 8 ranks"));
    }
    let (mut white_kings, mut black_kings) = (0, 0);
    for rank in ranks {
        let mut files = 0u32;
        for c in rank.chars() {
            match c {
                '1'..='8' => files += c as u32 - '0' as u32,
                'K' => {
                    white_kings += 1;
                    files += 1;
                }
                'k' => {
                    black_kings += 1;
                    files += 1;
                }
                'P' | 'N' | 'B' | 'R' | 'Q' | 'p' | 'n' | 'b' | 'r' | 'q' => files += 1,
                _ => return Err(invalid("unknown piece")),
            }
        }
        if files != 8 {
            return Err(invalid("rank does not cover 8 files"));
        }
    }
    if white_kings != 1 || black_kings != 1 {
        return Err(invalid("each side needs exactly one king"));
    }
    Ok(())
}

fn swap_case(c: char) -> char {
    if c.is_ascii_uppercase() {
        c.to_ascii_lowercase()
    } else {
        c.to_ascii_uppercase()
    }
}

/// Colour-flip a FEN: ranks reversed, piece colours swapped, side to move,
/// castling rights and en passant square mirrored. Counters are kept.
pub fn mirror_fen(fen: &str) -> Result<String, FenError> {
    let f = FenFields::parse(fen)?;

    let placement = f
        .placement
        .split('/')
        .rev()
        .map(|rank| rank.chars().map(swap_case).collect::<String>())
        .collect::<Vec<_>>()
        .join("/");

    let side = if f.side == "w" { "b" } else { "w" };

    let castling = if f.castling == "-" {
        "-".to_string()
    } else {
        let flipped: String = f.castling.chars().map(swap_case).collect();
        "KQkq".chars().filter(|c| flipped.contains(*c)).collect()
    };

    let en_passant: String = f
        .en_passant
        .chars()
        .map(|c| match c {
            '3' => '6',
            '6' => '3',
            other => other,
        })
        .collect();

    Ok(format!(
        "{placement} {side} {castling} {en_passant} {} {}",
        f.halfmove_clock, f.fullmove_number
    ))
}
