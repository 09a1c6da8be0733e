use std::borrow::Cow;

use patchrss_core::{Feed, FeedItem, PatchError};
use rss::{Channel, Item};

/// Parse an already-decoded upstream body into the [`Feed`] model.
///
/// Accepts RSS 0.9x, 1.0 (RDF), and 2.0. Anything else, Atom included, is
/// `UnparseableFeed`.
pub fn parse_feed(body: &str) -> Result<Feed, PatchError> {
    let body = undeclare_encoding(body);
    let channel = Channel::read_from(body.as_bytes())
        .map_err(|e| PatchError::UnparseableFeed(e.to_string()))?;

    let feed = Feed {
        title: non_empty(channel.title()),
        link: non_empty(channel.link()),
        description: non_empty(channel.description()),
        last_build_date: channel.last_build_date().and_then(non_empty),
        generator: channel.generator().and_then(non_empty),
        items: channel.items().iter().map(item_from).collect(),
    };
    tracing::debug!(items = feed.items.len(), "Parsed upstream feed");
    Ok(feed)
}

fn item_from(item: &Item) -> FeedItem {
    FeedItem {
        title: item.title().and_then(non_empty),
        link: item.link().and_then(non_empty),
        description: item.description().and_then(non_empty),
        pub_date: item.pub_date().and_then(non_empty),
        guid: item.guid().and_then(|g| non_empty(g.value())),
        dc_creator: dc_creator(item),
    }
}

/// `dc:creator`, whether or not the upstream declared the Dublin Core namespace.
///
/// With the namespace declared the rss crate lifts it into the Dublin Core
/// extension; without it the element stays in the raw `dc` extension map.
fn dc_creator(item: &Item) -> Option<String> {
    let declared = item
        .dublin_core_ext()
        .and_then(|dc| dc.creators().iter().find_map(|c| non_empty(c)));

    declared.or_else(|| {
        item.extensions()
            .get("dc")
            .and_then(|fields| fields.get("creator"))
            .and_then(|values| values.iter().find_map(|ext| ext.value().and_then(non_empty)))
    })
}

/// Replace an XML declaration that names an encoding.
///
/// The text is UTF-8 by now; left in place, the declaration would make the
/// reader decode it a second time as e.g. Shift_JIS.
fn undeclare_encoding(body: &str) -> Cow<'_, str> {
    let Some(rest) = body.strip_prefix("<?xml") else {
        return Cow::Borrowed(body);
    };
    match rest.find("?>") {
        Some(end) if rest[..end].contains("encoding") => {
            Cow::Owned(format!("<?xml version=\"1.0\"?>{}", &rest[end + 2..]))
        }
        _ => Cow::Borrowed(body),
    }
}

/// `None` for blank values; anything else is passed through untouched.
fn non_empty(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
