//! Text encoding of visited tiles as `x,y,plane` triples.

use std::collections::HashSet;

use tile_collector_core::WorldPoint;

const RECORD_DELIMITER: char = ';';
const FIELD_DELIMITER: char = ',';

/// Tiles recovered from an encoded string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedTiles {
    /// Every well-formed record, deduplicated.
    pub tiles: HashSet<WorldPoint>,
    /// Number of non-empty records that could not be parsed.
    pub skipped: usize,
}

/// Encodes tiles as semicolon-separated `x,y,plane` triples.
///
/// The output is canonical: records are ordered by plane, then `y`, then `x`,
/// so equal sets always encode to the same string.
#[must_use]
pub fn encode_tiles<'a, I>(tiles: I) -> String
where
    I: IntoIterator<Item = &'a WorldPoint>,
{
    let mut ordered: Vec<WorldPoint> = tiles.into_iter().copied().collect();
    ordered.sort_by_key(|tile| (tile.plane(), tile.y(), tile.x()));
    ordered.dedup();

    let mut encoded = String::with_capacity(ordered.len() * 16);
    for (index, tile) in ordered.iter().enumerate() {
        if index > 0 {
            encoded.push(RECORD_DELIMITER);
        }
        encoded.push_str(&format!("{},{},{}", tile.x(), tile.y(), tile.plane()));
    }
    encoded
}

/// Decodes a string produced by [`encode_tiles`], in any record order.
///
/// Malformed records are skipped individually; they never abort the decode.
#[must_use]
pub fn decode_tiles(data: &str) -> DecodedTiles {
    let mut decoded = DecodedTiles::default();
    for record in data.split(RECORD_DELIMITER) {
        let record = record.trim();
        if record.is_empty() {
            continue;
        }

        match parse_record(record) {
            Some(tile) => {
                let _ = decoded.tiles.insert(tile);
            }
            None => decoded.skipped += 1,
        }
    }
    decoded
}

fn parse_record(record: &str) -> Option<WorldPoint> {
    let mut fields = record.split(FIELD_DELIMITER);
    let x = fields.next()?.trim().parse::<i32>().ok()?;
    let y = fields.next()?.trim().parse::<i32>().ok()?;
    let plane = fields.next()?.trim().parse::<u8>().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(WorldPoint::new(x, y, plane))
}
