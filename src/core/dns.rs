use hickory_proto::rr::Name;

/// A domain name with the canonical, no-trailing-dot text form the wildcard
/// resolver and the authoritative stores key off of.
///
/// Thin wrapper over [`hickory_proto::rr::Name`] — wire parsing, comparison
/// and label handling all come from the wire-codec crate; only the text
/// forms used by the KV lookup keys are authored here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainName(Name);

impl DomainName {
    pub fn as_name(&self) -> &Name {
        &self.0
    }

    /// Canonical dotted form without a trailing dot, e.g. `"a.b.c"`.
    /// The root name renders as the empty string.
    pub fn text(&self) -> String {
        self.0
            .iter()
            .map(|label| String::from_utf8_lossy(label).into_owned())
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn is_root(&self) -> bool {
        self.0.num_labels() == 0
    }

    /// `parent("a.b.c") == "b.c"`; the root is its own parent.
    pub fn parent(&self) -> Self {
        Self(self.0.base_name())
    }

    /// The `*.<name>` search key queried at this name's level of the wildcard walk.
    pub fn wildcard_text(&self) -> String {
        format!("*.{}", self.text())
    }
}

impl From<Name> for DomainName {
    fn from(name: Name) -> Self {
        Self(name)
    }
}

impl From<&Name> for DomainName {
    fn from(name: &Name) -> Self {
        Self(name.clone())
    }
}
