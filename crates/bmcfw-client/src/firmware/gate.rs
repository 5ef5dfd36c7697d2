//! Skip-or-update decision

use crate::types::FirmwareRecord;

/// Result of comparing a request against the device inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision<'a> {
    /// First record carrying the requested name
    pub matched: Option<&'a FirmwareRecord>,
    /// Whether an upload is required
    pub needs_update: bool,
}

impl GateDecision<'_> {
    /// Device already runs the requested version
    pub fn is_current(&self) -> bool {
        !self.needs_update
    }
}

/// Decides whether the requested firmware is already installed
///
/// Names are matched exactly and only the first matching record counts.
/// Versions are compared as opaque strings: "1.0" and "1.00" differ.
pub struct VersionGate;

impl VersionGate {
    pub fn decide<'a>(
        records: &'a [FirmwareRecord],
        target_name: &str,
        target_version: &str,
    ) -> GateDecision<'a> {
        let matched = records.iter().find(|r| r.name == target_name);
        let needs_update = match matched {
            Some(record) => record.version != target_version,
            None => true,
        };
        GateDecision {
            matched,
            needs_update,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(id: &str, name: &str, version: &str) -> FirmwareRecord {
        FirmwareRecord {
            identifier: id.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            description: String::new(),
        }
    }

    fn inventory() -> Vec<FirmwareRecord> {
        vec![
            record("/fw/bmc", "BMC", "3.2"),
            record("/fw/bios", "BIOS", "1.0"),
            record("/fw/bios-backup", "BIOS", "0.9"),
        ]
    }

    #[rstest]
    #[case("BIOS", "1.0", Some("/fw/bios"), false)]
    #[case("BIOS", "2.0", Some("/fw/bios"), true)]
    #[case("BIOS", "0.9", Some("/fw/bios"), true)]
    #[case("BIOS", "1.00", Some("/fw/bios"), true)]
    #[case("bios", "1.0", None, true)]
    #[case("CPLD", "1.0", None, true)]
    fn test_decide(
        #[case] name: &str,
        #[case] version: &str,
        #[case] expected_id: Option<&str>,
        #[case] expected_update: bool,
    ) {
        let records = inventory();
        let decision = VersionGate::decide(&records, name, version);
        assert_eq!(decision.matched.map(|r| r.identifier.as_str()), expected_id);
        assert_eq!(decision.needs_update, expected_update);
    }

    #[test]
    fn test_empty_inventory_needs_update() {
        let decision = VersionGate::decide(&[], "BIOS", "1.0");
        assert!(decision.matched.is_none());
        assert!(decision.needs_update);
    }

    #[test]
    fn test_decision_is_repeatable() {
        let records = inventory();
        let first = VersionGate::decide(&records, "BMC", "3.2");
        let second = VersionGate::decide(&records, "BMC", "3.2");
        assert_eq!(first, second);
        assert!(first.is_current());
    }
}
