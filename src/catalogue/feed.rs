//! RSS export parsing and the text formats handed to the caller
//!
//! The catalogue's RSS export is the only structured view of a result
//! list. Items are read in feed order; a missing sub-element yields an
//! empty field rather than failing the whole feed.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::types::{AbstractSet, ListingRecord};
use crate::utils::CatalogueError;

/// Header line of the listing output
pub const LISTING_HEADER: &str = "Title|Description|Detail URL";

/// Header line of the abstract output
pub const ABSTRACT_HEADER: &str = "Abstract";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Description,
    Link,
}

#[derive(Debug, Default)]
struct ItemFields {
    title: String,
    description: String,
    link: String,
}

impl ItemFields {
    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Description => &mut self.description,
            Field::Link => &mut self.link,
        }
    }

    fn into_record(self) -> ListingRecord {
        ListingRecord::new(self.title, self.description, self.link)
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn is_item(name: &str) -> bool {
    // RSS 2.0 / RDF use <item>, Atom uses <entry>
    name == "item" || name == "entry"
}

fn field_for(name: &str) -> Option<Field> {
    match name {
        "title" => Some(Field::Title),
        "description" | "summary" => Some(Field::Description),
        "link" => Some(Field::Link),
        _ => None,
    }
}

/// Parse every feed item into a listing record, preserving feed order
///
/// Channel-level `<title>`/`<link>` are ignored. Atom `<link href=".."/>`
/// is accepted as the detail URL.
pub fn parse_feed(xml: &str) -> Result<Vec<ListingRecord>, CatalogueError> {
    let mut reader = Reader::from_str(xml);
    // Whitespace is significant inside a field; normalisation happens in
    // ListingRecord::new
    reader.config_mut().trim_text(false);

    let mut records = Vec::new();
    let mut item: Option<ItemFields> = None;
    let mut field: Option<Field> = None;
    // Element depth below the current <item>
    let mut depth = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| {
            CatalogueError::Feed(format!("at byte {}: {}", reader.buffer_position(), e))
        })?;

        match event {
            Event::Start(e) => {
                let name = local_name(&e);
                if item.is_some() {
                    depth += 1;
                    if depth == 1 {
                        field = field_for(&name);
                    }
                } else if is_item(&name) {
                    item = Some(ItemFields::default());
                    depth = 0;
                }
            }
            Event::End(e) => {
                if item.is_none() {
                    continue;
                }
                if depth == 0 {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    if is_item(&name)
                        && let Some(fields) = item.take()
                    {
                        records.push(fields.into_record());
                    }
                    continue;
                }
                if depth == 1 {
                    field = None;
                }
                depth -= 1;
            }
            Event::Empty(e) => {
                if depth == 0
                    && let Some(fields) = item.as_mut()
                    && local_name(&e) == "link"
                    && fields.link.is_empty()
                {
                    let href = e
                        .try_get_attribute("href")
                        .map_err(|err| CatalogueError::Feed(err.to_string()))?;
                    if let Some(attr) = href {
                        fields.link = attr
                            .unescape_value()
                            .map_err(|err| CatalogueError::Feed(err.to_string()))?
                            .to_string();
                    }
                }
            }
            Event::Text(e) => {
                if let (Some(fields), Some(current)) = (item.as_mut(), field) {
                    let text = match e.unescape() {
                        Ok(text) => text.to_string(),
                        // HTML entities such as &nbsp; are not XML entities
                        Err(_) => String::from_utf8_lossy(&e).to_string(),
                    };
                    append_text(fields.slot(current), &text);
                }
            }
            Event::CData(e) => {
                if let (Some(fields), Some(current)) = (item.as_mut(), field) {
                    append_text(fields.slot(current), &String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(records)
}

/// Text content is the plain concatenation of every text and CDATA chunk
fn append_text(slot: &mut String, text: &str) {
    slot.push_str(text);
}

/// One listing row: `title|description|detailUrl`
pub fn format_listing_row(record: &ListingRecord) -> String {
    format!("{}|{}|{}", record.title, record.description, record.detail_url)
}

/// Header line followed by one row per record, in the given order
pub fn format_listing(records: &[ListingRecord]) -> String {
    std::iter::once(LISTING_HEADER.to_string())
        .chain(records.iter().map(format_listing_row))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a listing row back into its three fields
///
/// Tolerates one trailing separator. Returns `None` for lines with fewer
/// than three columns (including the header-less empty line).
pub fn parse_listing_line(line: &str) -> Option<ListingRecord> {
    let mut columns = line.splitn(3, '|');
    let title = columns.next()?;
    let description = columns.next()?;
    let detail_url = columns.next()?;
    let detail_url = detail_url.strip_suffix('|').unwrap_or(detail_url);

    Some(ListingRecord {
        title: title.to_string(),
        description: description.to_string(),
        detail_url: detail_url.to_string(),
    })
}

/// Parse a whole listing output, skipping the header line
pub fn parse_listing(output: &str) -> Vec<ListingRecord> {
    output
        .lines()
        .skip_while(|line| *line == LISTING_HEADER)
        .filter_map(parse_listing_line)
        .collect()
}

/// `Abstract` header followed by the raw blocks
///
/// Blocks may contain their own line breaks.
pub fn format_abstracts(abstracts: &AbstractSet) -> String {
    std::iter::once(ABSTRACT_HEADER)
        .chain(abstracts.blocks().iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}
