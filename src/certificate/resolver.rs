use tracing::warn;

use crate::error::Error;
use crate::types::Result;

/// Pick the single certificate a fingerprint lookup returned.
///
/// Duplicates mean the store is inconsistent and are reported rather than
/// resolved to the first match.
pub fn resolve_unique<C>(fingerprint: &str, mut matches: Vec<C>) -> Result<C> {
    match matches.len() {
        0 => Err(Error::NotFound {
            fingerprint: fingerprint.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        count => {
            warn!("Store holds {} certificates with fingerprint {}", count, fingerprint);
            Err(Error::Ambiguous {
                fingerprint: fingerprint.to_string(),
                count,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_match_resolves() {
        assert_eq!(resolve_unique("AB12", vec!["cert"]).unwrap(), "cert");
    }

    #[test]
    fn test_no_match_is_not_found() {
        let result = resolve_unique::<&str>("AB12", vec![]);

        match result {
            Err(Error::NotFound { fingerprint }) => assert_eq!(fingerprint, "AB12"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_duplicates_are_ambiguous() {
        let result = resolve_unique("AB12", vec!["first", "second"]);

        match result {
            Err(Error::Ambiguous { fingerprint, count }) => {
                assert_eq!(fingerprint, "AB12");
                assert_eq!(count, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
