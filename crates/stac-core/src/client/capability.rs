//! Data-access capabilities.
//!
//! A capability is one category of catalog behaviour. The base client always
//! provides [`Capability::Read`]; every other capability is optional and may be
//! supplied by the base client, by an extension, or by nobody.

/// Sub-capabilities of a data-access client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// Collection and item reads, base search.
    Read,
    /// Single-resource create/update/delete.
    Transaction,
    /// Bulk item insertion.
    BulkTransaction,
    /// Field projection on search results.
    Fields,
    /// Property filtering on search results.
    Query,
    /// Ordering of search results.
    Sort,
}

impl Capability {
    /// Every capability, in wiring order.
    pub const ALL: [Capability; 6] = [
        Capability::Read,
        Capability::Transaction,
        Capability::BulkTransaction,
        Capability::Fields,
        Capability::Query,
        Capability::Sort,
    ];

    /// Stable name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Transaction => "transaction",
            Capability::BulkTransaction => "bulk_transaction",
            Capability::Fields => "fields",
            Capability::Query => "query",
            Capability::Sort => "sort",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a wired capability implementation came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// The base data-access client.
    Base,
    /// The named extension.
    Extension(String),
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Base => write!(f, "base"),
            Source::Extension(name) => write!(f, "extension:{}", name),
        }
    }
}
