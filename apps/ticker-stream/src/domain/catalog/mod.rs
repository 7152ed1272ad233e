//! Symbol Catalog Types

/// A tradable symbol and its display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Ticker symbol, e.g. `BTC`.
    pub symbol: String,
    /// Display name, e.g. `Bitcoin (BTC)`.
    pub full_name: String,
}
