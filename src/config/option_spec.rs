/// Declares one environment-resolvable option a plugin class reads.
///
/// `default` is a raw JSON literal (e.g. `"300"`, `"\"info\""`, `"[]"`),
/// parsed lazily at resolution time rather than stored as a `serde_json::Value`
/// so the table stays `const`-constructible.
pub struct OptionSpec {
    pub name: &'static str,
    pub required: bool,
    pub default: Option<&'static str>,
}

impl OptionSpec {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            default: None,
        }
    }

    pub const fn optional(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            required: false,
            default: Some(default),
        }
    }

    /// An optional option with no declared default — resolves to JSON `null`
    /// when absent, leaving the fallback to the plugin's own logic.
    pub const fn nullable(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            default: None,
        }
    }
}
