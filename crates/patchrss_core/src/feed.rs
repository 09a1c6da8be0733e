/// Channel metadata plus items, as read from an upstream feed.
///
/// Empty strings never appear here: the parser maps them to `None`, so
/// "present" always means "worth emitting".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feed {
    pub title: Option<String>,
    /// May or may not be a valid URL; the rewriter decides.
    pub link: Option<String>,
    pub description: Option<String>,
    /// Opaque; passed through untouched.
    pub last_build_date: Option<String>,
    pub generator: Option<String>,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub pub_date: Option<String>,
    pub guid: Option<String>,
    /// `dc:creator` from the Dublin Core namespace.
    pub dc_creator: Option<String>,
}

impl Feed {
    /// True iff any item carries a `dc:*` field, i.e. the output needs `xmlns:dc`.
    pub fn uses_dublin_core(&self) -> bool {
        self.items.iter().any(FeedItem::has_dublin_core)
    }
}

impl FeedItem {
    pub fn has_dublin_core(&self) -> bool {
        self.dc_creator.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dublin_core_evidence() {
        let mut feed = Feed {
            items: vec![FeedItem::default(), FeedItem::default()],
            ..Default::default()
        };
        assert!(!feed.uses_dublin_core());

        feed.items[1].dc_creator = Some("alice".into());
        assert!(feed.uses_dublin_core());
    }

    #[test]
    fn test_empty_feed_has_no_namespaces() {
        assert!(!Feed::default().uses_dublin_core());
    }
}
