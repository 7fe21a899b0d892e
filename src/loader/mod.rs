use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::hw::Word;

// ══════════════════════════════════════════════════════════════
//  Program image
// ══════════════════════════════════════════════════════════════

/// An executable as produced by the loader: the words of the program and
/// the virtual address the first word expects to live at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    pub load_address: usize,
    pub words: Vec<Word>,
}

impl ProgramImage {
    pub fn new(load_address: usize, words: Vec<Word>) -> Self {
        ProgramImage { load_address, words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Last virtual address occupied by the image (inclusive).
    pub fn end_address(&self) -> usize {
        self.load_address + self.words.len().saturating_sub(1)
    }

    /// Word stored at virtual address `vaddr`, if the image covers it.
    pub fn word_at(&self, vaddr: usize) -> Option<Word> {
        vaddr
            .checked_sub(self.load_address)
            .and_then(|i| self.words.get(i).copied())
    }

    /// Parse the textual image format.
    ///
    /// ```text
    /// ; comment up to end of line
    /// @0              load address directive (must come before any word)
    /// 2 0 17 -1       words
    /// "init.maq"      characters followed by a terminating 0
    /// ```
    pub fn parse(text: &str) -> Result<ProgramImage, ImageError> {
        let mut load_address = None;
        let mut words = Vec::new();

        for (n, raw) in text.lines().enumerate() {
            let line_no = n + 1;
            let line = match raw.find(';') {
                Some(i) => &raw[..i],
                None => raw,
            };
            let mut rest = line.trim();
            while !rest.is_empty() {
                if let Some(after) = rest.strip_prefix('"') {
                    let close = after.find('"').ok_or(ImageError::UnterminatedString(line_no))?;
                    words.extend(after[..close].chars().map(|c| c as Word));
                    words.push(0);
                    rest = after[close + 1..].trim_start();
                    continue;
                }
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                let token = &rest[..end];
                rest = rest[end..].trim_start();

                if let Some(addr) = token.strip_prefix('@') {
                    if !words.is_empty() || load_address.is_some() {
                        return Err(ImageError::MisplacedDirective(line_no));
                    }
                    let addr = addr
                        .parse::<usize>()
                        .map_err(|_| ImageError::InvalidToken(line_no, String::from(token)))?;
                    load_address = Some(addr);
                } else {
                    let w = token
                        .parse::<Word>()
                        .map_err(|_| ImageError::InvalidToken(line_no, String::from(token)))?;
                    words.push(w);
                }
            }
        }

        if words.is_empty() {
            return Err(ImageError::Empty);
        }
        Ok(ProgramImage::new(load_address.unwrap_or(0), words))
    }
}

// ══════════════════════════════════════════════════════════════
//  ImageError
// ══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    Empty,
    InvalidToken(usize, String),
    MisplacedDirective(usize),
    UnterminatedString(usize),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ImageError::Empty => write!(f, "Image has no words"),
            ImageError::InvalidToken(line, tok) => write!(f, "Invalid token '{}' on line {}", tok, line),
            ImageError::MisplacedDirective(line) => write!(f, "Load directive must come first (line {})", line),
            ImageError::UnterminatedString(line) => write!(f, "Unterminated string on line {}", line),
        }
    }
}
