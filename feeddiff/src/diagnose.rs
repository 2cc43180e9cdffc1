use std::fmt;

use crate::compare::ComparisonReport;

/// Minutes the proxy keeps a cached copy before refetching.
const PROXY_CACHE_MINUTES: u64 = 15;

/// Conclusion drawn from a comparison and the proxy's cache status header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis {
    Identical,
    /// The proxy answered from its cache (`HIT`)
    StaleCache,
    /// The proxy fetched live (`MISS`) and still served different content
    LiveFetchAltered,
    /// Any other cache status, or none; holds the raw header value
    UnknownCache(Option<String>),
}

/// Maps the comparison and the cache status header value to a hypothesis.
/// Cache status values are matched exactly, case-sensitively.
pub fn diagnose(report: &ComparisonReport, cache_status: Option<&str>) -> Diagnosis {
    if report.identical {
        return Diagnosis::Identical;
    }

    match cache_status {
        Some("HIT") => Diagnosis::StaleCache,
        Some("MISS") => Diagnosis::LiveFetchAltered,
        other => Diagnosis::UnknownCache(other.map(str::to_string)),
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnosis::Identical => {
                write!(f, "✓ Both feeds are identical, nothing to fix!")
            }
            Diagnosis::StaleCache => {
                writeln!(f, "⚠️  The two feeds differ")?;
                writeln!(
                    f,
                    "   Likely cause: the proxy served a stale cached copy (cache status: HIT)"
                )?;
                write!(
                    f,
                    "   Suggestion: wait {} minutes for the cache to expire and retry, or change the cache policy",
                    PROXY_CACHE_MINUTES
                )
            }
            Diagnosis::LiveFetchAltered => {
                writeln!(f, "⚠️  The two feeds differ")?;
                writeln!(
                    f,
                    "   Likely cause: the proxy fetched the feed live (cache status: MISS) but the content still differs"
                )?;
                write!(
                    f,
                    "   Suggestion: check whether the proxy's transformation logic modifies the feed"
                )
            }
            Diagnosis::UnknownCache(status) => {
                writeln!(f, "⚠️  The two feeds differ")?;
                write!(
                    f,
                    "   Cache status unknown: {}",
                    status.as_deref().unwrap_or("UNKNOWN")
                )
            }
        }
    }
}
