/// Fixed-width listing wire format
///
/// Every field is exactly `width` characters: the value, left-justified and
/// padded with spaces to `width - 1`, then the `|` delimiter. Oversized
/// values are truncated, never escaped, so a client can address field `i`
/// at offset `i * width`. Field order:
///
/// ```text
/// database id | display path | subfolder count | file count | subfolders... | files...
/// ```
///
/// Widths count characters (Unicode scalar values), not bytes.
use thiserror::Error;

use super::listing::Listing;

pub const DELIMITER: char = '|';

/// Render one field. `width` must be at least 2.
pub fn encode_field(value: &str, width: usize) -> String {
    let budget = width.saturating_sub(1);
    let mut field: String = value.chars().take(budget).collect();
    let used = field.chars().count();
    field.extend(std::iter::repeat(' ').take(budget - used));
    field.push(DELIMITER);
    field
}

/// Serialize a listing behind the database identifier header.
pub fn encode_listing(database_id: &str, listing: &Listing, width: usize) -> String {
    let field_count = 4 + listing.subfolders.len() + listing.files.len();
    let mut out = String::with_capacity(field_count * width);

    out.push_str(&encode_field(database_id, width));
    out.push_str(&encode_field(&listing.display_path, width));
    out.push_str(&encode_field(&listing.subfolders.len().to_string(), width));
    out.push_str(&encode_field(&listing.files.len().to_string(), width));
    for folder in &listing.subfolders {
        out.push_str(&encode_field(folder, width));
    }
    for file in &listing.files {
        out.push_str(&encode_field(file, width));
    }
    out
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame length {0} is not a multiple of the field width")]
    Misaligned(usize),
    #[error("field {0} does not end with the delimiter")]
    MissingDelimiter(usize),
    #[error("frame is missing the {0} field")]
    MissingHeader(&'static str),
    #[error("field {index} is not a count: {value:?}")]
    BadCount { index: usize, value: String },
    #[error("frame announces {expected} entries but carries {actual}")]
    EntryCount { expected: usize, actual: usize },
}

/// A listing as read back by a client, one fixed-width field at a time.
///
/// Padding is trimmed, so values that themselves end in spaces do not
/// survive the trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFrame {
    pub database_id: String,
    pub display_path: String,
    pub subfolders: Vec<String>,
    pub files: Vec<String>,
}

impl ListingFrame {
    pub fn parse(wire: &str, width: usize) -> Result<Self, FrameError> {
        let chars: Vec<char> = wire.chars().collect();
        if width < 2 || chars.len() % width != 0 {
            return Err(FrameError::Misaligned(chars.len()));
        }

        let mut fields = Vec::with_capacity(chars.len() / width);
        for (index, chunk) in chars.chunks(width).enumerate() {
            let (delimiter, value) = chunk.split_last().ok_or(FrameError::Misaligned(chars.len()))?;
            if *delimiter != DELIMITER {
                return Err(FrameError::MissingDelimiter(index));
            }
            let value: String = value.iter().collect();
            fields.push(value.trim_end_matches(' ').to_string());
        }

        let mut fields = fields.into_iter();
        let database_id = fields.next().ok_or(FrameError::MissingHeader("database id"))?;
        let display_path = fields.next().ok_or(FrameError::MissingHeader("display path"))?;
        let subfolder_count = parse_count(fields.next(), 2, "subfolder count")?;
        let file_count = parse_count(fields.next(), 3, "file count")?;

        let entries: Vec<String> = fields.collect();
        if entries.len() != subfolder_count + file_count {
            return Err(FrameError::EntryCount {
                expected: subfolder_count + file_count,
                actual: entries.len(),
            });
        }

        let mut subfolders = entries;
        let files = subfolders.split_off(subfolder_count);
        Ok(ListingFrame { database_id, display_path, subfolders, files })
    }
}

fn parse_count(field: Option<String>, index: usize, name: &'static str) -> Result<usize, FrameError> {
    let value = field.ok_or(FrameError::MissingHeader(name))?;
    value.parse().map_err(|_| FrameError::BadCount { index, value })
}
