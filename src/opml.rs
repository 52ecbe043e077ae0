// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reading feed URLs out of OPML subscription exports.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::OpmlError;
use crate::http::HttpClient;
use crate::source::is_http_url;

/// Collect the `xmlUrl` of every `outline` element, nested ones included
pub fn parse_opml(xml_bytes: &[u8]) -> Result<Vec<String>, OpmlError> {
    let mut reader = Reader::from_reader(xml_bytes);
    let mut buf = Vec::new();
    let mut urls = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(element) | Event::Empty(element) => {
                if let Some(url) = outline_xml_url(&element)? {
                    urls.push(url);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(urls)
}

fn outline_xml_url(element: &BytesStart<'_>) -> Result<Option<String>, OpmlError> {
    if element.local_name().as_ref() != b"outline" {
        return Ok(None);
    }

    for attribute in element.attributes() {
        let attribute = attribute?;
        if attribute.key.local_name().as_ref() == b"xmlUrl" {
            let value = attribute.unescape_value()?;
            let value = value.trim();
            return Ok((!value.is_empty()).then(|| value.to_string()));
        }
    }

    Ok(None)
}

/// Load an OPML document from a local path or an http(s) URL
pub async fn load_opml<C: HttpClient + ?Sized>(
    client: &C,
    location: &str,
) -> Result<Vec<String>, OpmlError> {
    let bytes = if is_http_url(location) {
        client
            .get_bytes(location)
            .await
            .map_err(|e| OpmlError::FetchFailed {
                url: location.to_string(),
                source: e,
            })?
            .to_vec()
    } else {
        let path = Path::new(location);
        tokio::fs::read(path)
            .await
            .map_err(|e| OpmlError::FileReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?
    };

    parse_opml(&bytes)
}
