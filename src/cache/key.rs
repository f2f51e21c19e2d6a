//! Cache key generation.
//!
//! Keys are organized hierarchically under a fixed namespace so that whole
//! data categories can be cleared with a single pattern:
//!
//! ```text
//! evo2:variant_analysis:chr17:43119628:G:hg38
//! evo2:sequence:chr17:43119628-43129627:hg38
//! evo2:gene_search:BRCA1:hg38
//! ```
//!
//! Key construction is pure and deterministic: identical logical requests
//! always produce byte-identical keys. No normalization happens here; callers
//! normalize semantically-equivalent inputs (chromosome naming, position
//! ordering) before building a key, because two different parameter strings
//! intentionally address two different cache entries.

use std::fmt::{self, Write};
use std::time::Duration;

/// Fixed namespace prefixed to every key.
pub const NAMESPACE: &str = "evo2";

/// The kind of data being cached or forwarded.
///
/// Selects both the key shape and the TTL applied at cache-write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Genomes,
    Chromosomes,
    GeneSearch,
    GeneDetails,
    Sequence,
    Clinvar,
    NcbiProxy,
    UcscProxy,
    VariantAnalysis,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Genomes => "genomes",
            Category::Chromosomes => "chromosomes",
            Category::GeneSearch => "gene_search",
            Category::GeneDetails => "gene_details",
            Category::Sequence => "sequence",
            Category::Clinvar => "clinvar",
            Category::NcbiProxy => "ncbi_proxy",
            Category::UcscProxy => "ucsc_proxy",
            Category::VariantAnalysis => "variant_analysis",
        }
    }

    /// Cache lifetime for this category.
    ///
    /// Reference data (genomes, chromosomes) rarely changes and keeps for a
    /// day; clinical-variant annotations follow upstream curation and expire
    /// in minutes. The policy is consulted by writers at `set` time; the
    /// store itself always takes an explicit TTL.
    pub fn ttl(&self) -> Duration {
        match self {
            Category::Genomes => Duration::from_secs(24 * 60 * 60),
            Category::Chromosomes => Duration::from_secs(24 * 60 * 60),
            Category::GeneSearch => Duration::from_secs(60 * 60),
            Category::GeneDetails => Duration::from_secs(12 * 60 * 60),
            Category::Sequence => Duration::from_secs(6 * 60 * 60),
            Category::Clinvar => Duration::from_secs(30 * 60),
            Category::NcbiProxy => Duration::from_secs(5 * 60),
            Category::UcscProxy => Duration::from_secs(60 * 60),
            Category::VariantAnalysis => Duration::from_secs(30 * 60),
        }
    }

    /// Pattern matching every key in this category.
    pub fn pattern(&self) -> String {
        format!("{}:{}:*", NAMESPACE, self.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-qualified cache key: `evo2:<category>:<param1>:<param2>:...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from a category and its identifying parameters, in the
    /// order supplied. Total; never fails.
    pub fn build<I>(category: Category, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        let mut key = format!("{}:{}", NAMESPACE, category);
        for param in params {
            // Writing to a String is infallible.
            let _ = write!(key, ":{}", param);
        }
        CacheKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_hierarchical_keys() {
        let key = CacheKey::build(
            Category::VariantAnalysis,
            ["chr17", "43119628", "G", "hg38", "+"],
        );
        assert_eq!(key.as_str(), "evo2:variant_analysis:chr17:43119628:G:hg38:+");

        let key = CacheKey::build(Category::Sequence, ["chr17", "43119628-43129627", "hg38"]);
        assert_eq!(key.as_str(), "evo2:sequence:chr17:43119628-43129627:hg38");
    }

    #[test]
    fn zero_param_key_is_just_the_category() {
        let key = CacheKey::build(Category::Genomes, std::iter::empty::<&str>());
        assert_eq!(key.as_str(), "evo2:genomes");
    }

    #[test]
    fn identical_inputs_yield_identical_keys() {
        let a = CacheKey::build(Category::GeneSearch, ["BRCA1", "hg38"]);
        let b = CacheKey::build(Category::GeneSearch, ["BRCA1", "hg38"]);
        assert_eq!(a, b);
    }

    #[test]
    fn any_differing_param_yields_a_different_key() {
        let base = CacheKey::build(Category::GeneSearch, ["BRCA1", "hg38"]);
        assert_ne!(base, CacheKey::build(Category::GeneSearch, ["BRCA2", "hg38"]));
        assert_ne!(base, CacheKey::build(Category::GeneSearch, ["BRCA1", "hg19"]));
        assert_ne!(base, CacheKey::build(Category::GeneDetails, ["BRCA1", "hg38"]));
    }

    #[test]
    fn params_are_order_sensitive() {
        let a = CacheKey::build(Category::Clinvar, ["chr17", "hg38"]);
        let b = CacheKey::build(Category::Clinvar, ["hg38", "chr17"]);
        assert_ne!(a, b);
    }

    #[test]
    fn category_pattern_covers_its_keys_only() {
        let pattern = Category::GeneSearch.pattern();
        assert_eq!(pattern, "evo2:gene_search:*");
    }

    #[test]
    fn ttl_table_spot_checks() {
        assert_eq!(Category::Genomes.ttl(), Duration::from_secs(86_400));
        assert_eq!(Category::GeneSearch.ttl(), Duration::from_secs(3_600));
        assert_eq!(Category::Clinvar.ttl(), Duration::from_secs(1_800));
        assert_eq!(Category::NcbiProxy.ttl(), Duration::from_secs(300));
        assert_eq!(Category::VariantAnalysis.ttl(), Duration::from_secs(1_800));
    }
}
