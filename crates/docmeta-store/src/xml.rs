//! XML codec for the backing file
//!
//! ```xml
//! <?xml version="1.0"?>
//! <metadata>
//!   <document uri="file:///home/me/notes.txt" atime="1700000000000">
//!     <entry key="position" value="42"/>
//!   </document>
//! </metadata>
//! ```
//!
//! Decoding is lenient per record: a `document` without `uri` or `atime` is
//! dropped, as is an `entry` without `key` or `value`. Everything else in the
//! document is kept. An `entry` with an empty `value` is well-formed but
//! carries no attribute, so it is dropped without being counted.

use crate::entry::Entry;
use docmeta_common::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{trace, warn};

/// Name of the root element
pub const ROOT_ELEMENT: &str = "metadata";

const XML_DECLARATION: &str = r#"<?xml version="1.0"?>"#;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "metadata")]
struct MetadataXml {
    #[serde(rename = "document", default)]
    documents: Vec<DocumentXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DocumentXml {
    #[serde(rename = "@uri", default, skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
    #[serde(rename = "@atime", default, skip_serializing_if = "Option::is_none")]
    atime: Option<String>,
    #[serde(rename = "entry", default)]
    entries: Vec<EntryXml>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryXml {
    #[serde(rename = "@key", default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(rename = "@value", default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

/// Result of decoding a backing file
#[derive(Debug, Default)]
pub struct Decoded {
    /// Well-formed documents in file order
    pub documents: Vec<(String, Entry)>,
    /// `document` records dropped for a missing `uri` or `atime`
    pub skipped_documents: usize,
    /// `entry` records dropped for a missing `key` or `value`
    pub skipped_entries: usize,
}

/// Decode the backing file contents
pub fn decode(xml: &str) -> Result<Decoded> {
    let root = root_element_name(xml)?;
    if root != ROOT_ELEMENT {
        return Err(Error::WrongRootElement { found: root });
    }

    let parsed: MetadataXml = quick_xml::de::from_str(xml).map_err(Error::xml_parse)?;

    let mut decoded = Decoded::default();
    for document in parsed.documents {
        let (Some(uri), Some(atime)) = (document.uri, document.atime) else {
            decoded.skipped_documents += 1;
            continue;
        };
        if uri.is_empty() {
            decoded.skipped_documents += 1;
            continue;
        }

        let mut values = HashMap::with_capacity(document.entries.len());
        for entry in document.entries {
            match (entry.key, entry.value) {
                (Some(key), Some(value)) if !key.is_empty() => {
                    // An empty value is the same as an unset attribute
                    if value.is_empty() {
                        trace!("entry: {} is empty, dropped", key);
                        continue;
                    }
                    trace!("entry: {} = {}", key, value);
                    values.insert(key, value);
                }
                _ => decoded.skipped_entries += 1,
            }
        }

        trace!("uri: {} atime: {}", uri, atime);
        let atime = parse_atime(&uri, &atime);
        decoded.documents.push((uri, Entry::with_values(atime, values)));
    }

    Ok(decoded)
}

/// Encode documents into the backing file format
///
/// Documents are written sorted by URI and attributes sorted by key.
pub fn encode<'a, I>(documents: I) -> Result<String>
where
    I: IntoIterator<Item = (&'a str, &'a Entry)>,
{
    let mut documents: Vec<_> = documents.into_iter().collect();
    documents.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let root = MetadataXml {
        documents: documents
            .into_iter()
            .map(|(uri, entry)| DocumentXml {
                uri: Some(uri.to_string()),
                atime: Some(entry.atime().to_string()),
                entries: entry
                    .sorted_values()
                    .into_iter()
                    .map(|(key, value)| EntryXml {
                        key: Some(key.to_string()),
                        value: Some(value.to_string()),
                    })
                    .collect(),
            })
            .collect(),
    };

    let mut body = String::new();
    let mut ser = quick_xml::se::Serializer::new(&mut body);
    ser.indent(' ', 2);
    root.serialize(ser).map_err(Error::xml_write)?;

    Ok(format!("{XML_DECLARATION}\n{body}\n"))
}

fn root_element_name(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event().map_err(Error::xml_parse)? {
            Event::Start(e) | Event::Empty(e) => {
                return Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Event::Eof => return Err(Error::EmptyDocument),
            _ => {}
        }
    }
}

/// An unparsable atime sorts as the oldest possible access
fn parse_atime(uri: &str, atime: &str) -> i64 {
    atime.trim().parse().unwrap_or_else(|_| {
        warn!("Invalid atime {:?} for {}, treating as oldest", atime, uri);
        0
    })
}
