use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::certificate::record::CertificateRecord;

/// Signature algorithm GOST R 34.10-2012 with a 256-bit key
pub const ALGORITHM_GOST_2012_256: &str = "1.2.643.7.1.1.1.1";

/// Single keep/drop decision over a record
#[derive(Clone)]
pub struct CertificatePredicate {
    name: String,
    test: Arc<dyn Fn(&CertificateRecord) -> bool + Send + Sync>,
}

impl CertificatePredicate {
    /// Wrap an arbitrary predicate
    pub fn new<F>(name: impl Into<String>, test: F) -> Self
    where
        F: Fn(&CertificateRecord) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            test: Arc::new(test),
        }
    }

    /// Keep certificates valid at the wall-clock time of each evaluation
    pub fn valid_now() -> Self {
        Self::new("valid-now", |record| record.is_valid_at(Utc::now()))
    }

    /// Keep certificates valid at a fixed instant
    pub fn valid_at(now: DateTime<Utc>) -> Self {
        Self::new(format!("valid-at {}", now), move |record| record.is_valid_at(now))
    }

    /// Keep certificates whose public key algorithm OID equals `oid`
    pub fn algorithm(oid: impl Into<String>) -> Self {
        let oid = oid.into();
        Self::new(format!("algorithm {}", oid), move |record| record.public_key_algorithm == oid)
    }

    /// Predicate name, for logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the predicate
    pub fn test(&self, record: &CertificateRecord) -> bool {
        (self.test)(record)
    }
}

impl fmt::Debug for CertificatePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CertificatePredicate").field(&self.name).finish()
    }
}

/// Keep the records that satisfy every predicate.
///
/// Predicates run left to right and stop at the first rejection.
pub fn filter_certificates(
    records: Vec<CertificateRecord>,
    predicates: &[CertificatePredicate],
) -> Vec<CertificateRecord> {
    records
        .into_iter()
        .filter(|record| predicates.iter().all(|predicate| predicate.test(record)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(thumbprint: &str, from: DateTime<Utc>, to: DateTime<Utc>, oid: &str) -> CertificateRecord {
        CertificateRecord {
            version: 3,
            thumbprint: thumbprint.to_string(),
            subject_name: format!("CN={}", thumbprint),
            serial_number: "01".to_string(),
            issuer_name: "CN=Test CA".to_string(),
            valid_from_date: from,
            valid_to_date: to,
            subject_simple_name: thumbprint.to_string(),
            subject_email_name: String::new(),
            subject_upn: String::new(),
            subject_dns_name: String::new(),
            issuer_simple_name: "Test CA".to_string(),
            issuer_email_name: String::new(),
            issuer_upn: String::new(),
            issuer_dns_name: String::new(),
            public_key_algorithm: oid.to_string(),
        }
    }

    fn fixture(now: DateTime<Utc>) -> Vec<CertificateRecord> {
        let day = Duration::days(1);
        vec![
            record("AA", now - day, now + day, ALGORITHM_GOST_2012_256),
            record("BB", now - day, now + day, "1.2.840.113549.1.1.1"),
            record("CC", now - day * 3, now - day, ALGORITHM_GOST_2012_256),
            record("DD", now + day, now + day * 2, ALGORITHM_GOST_2012_256),
            record("EE", now - day, now, ALGORITHM_GOST_2012_256),
        ]
    }

    fn thumbprints(records: &[CertificateRecord]) -> Vec<&str> {
        records.iter().map(|r| r.thumbprint.as_str()).collect()
    }

    #[test]
    fn test_validity_predicate() {
        let now = Utc::now();
        let second = Duration::seconds(1);
        let predicate = CertificatePredicate::valid_at(now);

        assert!(predicate.test(&record("A", now - second, now + second, "")));
        assert!(!predicate.test(&record("B", now - second * 2, now - second, "")));
        assert!(predicate.test(&record("C", now - second, now, "")));
    }

    #[test]
    fn test_valid_now_reads_clock() {
        let now = Utc::now();
        let predicate = CertificatePredicate::valid_now();

        assert!(predicate.test(&record("A", now - Duration::hours(1), now + Duration::hours(1), "")));
        assert!(!predicate.test(&record("B", now - Duration::hours(2), now - Duration::hours(1), "")));
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let now = Utc::now();
        let predicates = [
            CertificatePredicate::valid_at(now),
            CertificatePredicate::algorithm(ALGORITHM_GOST_2012_256),
        ];

        let kept = filter_certificates(fixture(now), &predicates);

        assert_eq!(thumbprints(&kept), vec!["AA", "EE"]);
    }

    #[test]
    fn test_filter_order_independent() {
        let now = Utc::now();
        let forward = [
            CertificatePredicate::valid_at(now),
            CertificatePredicate::algorithm(ALGORITHM_GOST_2012_256),
        ];
        let backward = [forward[1].clone(), forward[0].clone()];

        assert_eq!(
            filter_certificates(fixture(now), &forward),
            filter_certificates(fixture(now), &backward)
        );
    }

    #[test]
    fn test_empty_chain_keeps_everything() {
        let now = Utc::now();

        assert_eq!(filter_certificates(fixture(now), &[]).len(), 5);
    }
}
