//! Address classification.
//!
//! Every completed top-frame navigation is mapped to a [`PageKind`] purely
//! from the destination address; the navigation state machine picks the
//! behavior script to inject from that kind alone.

/// The three page kinds the state machine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// A thread view where a reaction must be recorded before returning home.
    Action,
    /// A thread-creation form; nothing is ever injected here.
    Excluded,
    /// Everything else, including the site root; queue-driven.
    General,
}

/// The address patterns of the target site.
///
/// Defaults target the production forum. All matching is plain
/// substring/prefix work on the address string; no hidden state.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    root: String,
    thread_marker: String,
    section_marker: String,
    compose_marker: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::new("https://craxpro.to")
    }
}

impl SiteProfile {
    /// Builds a profile for `root` with the standard forum markers.
    pub fn new(root: impl Into<String>) -> Self {
        let mut root = root.into();
        while root.ends_with('/') {
            root.pop();
        }
        Self {
            root,
            thread_marker: "/threads/".to_string(),
            section_marker: "/forums/".to_string(),
            compose_marker: "post-thread".to_string(),
        }
    }

    /// The site root, without a trailing slash.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Full prefix of thread-view addresses, e.g. `https://site/threads/`.
    pub fn thread_prefix(&self) -> String {
        format!("{}{}", self.root, self.thread_marker)
    }

    /// Full prefix of forum-section addresses, e.g. `https://site/forums/`.
    pub fn section_prefix(&self) -> String {
        format!("{}{}", self.root, self.section_marker)
    }

    /// Marker that identifies the thread-creation form within a section.
    pub fn compose_marker(&self) -> &str {
        &self.compose_marker
    }

    /// Classifies `address`. Pure and total.
    ///
    /// The action-page check runs first; if the two patterns ever overlapped,
    /// `Action` wins.
    pub fn classify(&self, address: &str) -> PageKind {
        if address.starts_with(&self.thread_prefix()) {
            return PageKind::Action;
        }
        if address.contains(&self.section_prefix()) && address.contains(&self.compose_marker) {
            return PageKind::Excluded;
        }
        PageKind::General
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteProfile {
        SiteProfile::new("https://site")
    }

    #[test]
    fn thread_addresses_are_action_pages() {
        assert_eq!(site().classify("https://site/threads/42"), PageKind::Action);
        assert_eq!(
            site().classify("https://site/threads/some-topic.123/"),
            PageKind::Action
        );
    }

    #[test]
    fn thread_creation_addresses_are_excluded() {
        assert_eq!(
            site().classify("https://site/forums/x/post-thread"),
            PageKind::Excluded
        );
        assert_eq!(
            site().classify("https://site/forums/general.2/post-thread?inline-mode=1"),
            PageKind::Excluded
        );
    }

    #[test]
    fn everything_else_is_general() {
        assert_eq!(site().classify("https://site"), PageKind::General);
        assert_eq!(site().classify("https://site/"), PageKind::General);
        assert_eq!(site().classify("https://site/forums/x/"), PageKind::General);
        assert_eq!(site().classify("https://other.example/threads/1"), PageKind::General);
        assert_eq!(site().classify("about:blank"), PageKind::General);
    }

    #[test]
    fn action_wins_over_excluded_on_overlap() {
        // Contrived address matching both patterns; the action check runs first.
        assert_eq!(
            site().classify("https://site/threads/1?next=https://site/forums/x/post-thread"),
            PageKind::Action
        );
    }

    #[test]
    fn trailing_slash_in_root_is_normalized() {
        let site = SiteProfile::new("https://site/");
        assert_eq!(site.root(), "https://site");
        assert_eq!(site.classify("https://site/threads/1"), PageKind::Action);
    }
}
