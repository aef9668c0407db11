//! Deterministic analysis rules over a collected dataset.
//!
//! Pure functions of the dataset: no I/O, no randomness. The same
//! input always yields the same findings, in the same order.

use vigil_common::{CategoryResult, CollectedDataset, Finding, Severity};

const SECURITY: &str = "security";
const PERFORMANCE: &str = "performance";
const COMPLIANCE: &str = "compliance";

/// Service name substrings that have no place on an audited host.
const INSECURE_SERVICES: &[(&str, &str)] = &[
    ("telnet", "Telnet transmits credentials in cleartext"),
    ("rsh", "rsh/rlogin trust relationships are trivially spoofed"),
    ("rlogin", "rsh/rlogin trust relationships are trivially spoofed"),
    ("tftp", "TFTP offers unauthenticated file transfer"),
    ("vsftpd 2.3.4", "vsftpd 2.3.4 ships a known backdoor"),
];

/// Evaluate the full rule table. Findings come out in rule order with
/// content-derived ids, so identical datasets produce byte-identical
/// lists.
pub fn evaluate(dataset: &CollectedDataset) -> Vec<Finding> {
    let mut findings = Vec::new();
    check_ssh_config(dataset, &mut findings);
    check_firewall(dataset, &mut findings);
    check_root_accounts(dataset, &mut findings);
    check_sudoers(dataset, &mut findings);
    check_pending_updates(dataset, &mut findings);
    check_disk_usage(dataset, &mut findings);
    check_insecure_services(dataset, &mut findings);
    findings
}

/// Line-match helper: first non-comment line starting with `directive`
/// whose remainder contains `value`, case-insensitive. Trailing
/// `#`-comments are stripped before matching.
fn sshd_directive_is(config: &str, directive: &str, value: &str) -> Option<String> {
    for line in config.lines() {
        let trimmed = line.trim();
        let code = match trimmed.find('#') {
            Some(i) => trimmed[..i].trim_end(),
            None => trimmed,
        };
        if code.is_empty() {
            continue;
        }
        let lower = code.to_lowercase();
        if lower.starts_with(&directive.to_lowercase())
            && lower.contains(&value.to_lowercase())
        {
            return Some(code.to_string());
        }
    }
    None
}

fn check_ssh_config(dataset: &CollectedDataset, findings: &mut Vec<Finding>) {
    let Some(config) = dataset.stdout("ssh_config") else {
        return;
    };

    if let Some(line) = sshd_directive_is(config, "PermitRootLogin", "yes") {
        findings.push(
            Finding::new(
                "Root login over SSH is enabled",
                Severity::Critical,
                SECURITY,
                "sshd accepts direct root logins, so a single compromised credential grants full control.",
                "Set PermitRootLogin no in /etc/ssh/sshd_config and restart sshd.",
            )
            .with_evidence(line),
        );
    }

    if let Some(line) = sshd_directive_is(config, "PermitEmptyPasswords", "yes") {
        findings.push(
            Finding::new(
                "SSH accepts empty passwords",
                Severity::Critical,
                SECURITY,
                "Accounts with blank passwords can log in over SSH.",
                "Set PermitEmptyPasswords no in /etc/ssh/sshd_config.",
            )
            .with_evidence(line),
        );
    }

    if let Some(line) = sshd_directive_is(config, "PasswordAuthentication", "yes") {
        findings.push(
            Finding::new(
                "SSH password authentication is enabled",
                Severity::Medium,
                SECURITY,
                "Password logins are exposed to brute-force attempts; key-based auth is not enforced.",
                "Set PasswordAuthentication no and distribute SSH keys.",
            )
            .with_evidence(line),
        );
    }

    if let Some(line) = sshd_directive_is(config, "Protocol", "1") {
        findings.push(
            Finding::new(
                "SSH protocol 1 is permitted",
                Severity::High,
                SECURITY,
                "Protocol 1 has known cryptographic weaknesses.",
                "Remove the Protocol directive or set Protocol 2.",
            )
            .with_evidence(line),
        );
    }
}

fn check_firewall(dataset: &CollectedDataset, findings: &mut Vec<Finding>) {
    let inactive = match dataset.get("firewall_status") {
        Some(CategoryResult::Ok(result)) => {
            let out = result.stdout.trim();
            let lower = out.to_lowercase();
            if out.is_empty() {
                // ufw and iptables both absent: the command produced
                // nothing, so no firewall state is verifiable.
                true
            } else if !result.success() && !lower.contains("chain") && !lower.contains("status") {
                true
            } else {
                lower.contains("inactive")
                    // Default-policy-only iptables output means no rules loaded
                    || (lower.contains("chain input (policy accept)") && out.lines().count() <= 9)
            }
        }
        // Category missing or errored: firewall state is unverifiable,
        // which scores the same as absent.
        Some(CategoryResult::Error(_)) | None => true,
    };

    if inactive {
        findings.push(Finding::new(
            "No active host firewall",
            Severity::High,
            SECURITY,
            "Neither ufw nor iptables shows an active ruleset; every listening service is exposed.",
            "Enable ufw (ufw enable) or load an iptables ruleset with a default-deny inbound policy.",
        ));
    }
}

fn check_root_accounts(dataset: &CollectedDataset, findings: &mut Vec<Finding>) {
    let Some(passwd) = dataset.stdout("users") else {
        return;
    };

    let uid_zero: Vec<&str> = passwd
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            (fields.len() >= 3 && fields[2] == "0").then(|| fields[0])
        })
        .collect();

    if uid_zero.len() > 1 {
        findings.push(
            Finding::new(
                "Multiple UID 0 accounts",
                Severity::Critical,
                SECURITY,
                format!(
                    "{} accounts share UID 0; any of them is effectively root.",
                    uid_zero.len()
                ),
                "Remove or re-number the duplicate UID 0 accounts.",
            )
            .with_evidence(uid_zero.join(", ")),
        );
    }
}

fn check_sudoers(dataset: &CollectedDataset, findings: &mut Vec<Finding>) {
    let Some(sudoers) = dataset.stdout("sudoers") else {
        return;
    };

    let nopasswd: Vec<&str> = sudoers
        .lines()
        .filter(|l| !l.trim_start().starts_with('#') && l.contains("NOPASSWD"))
        .collect();

    if !nopasswd.is_empty() {
        findings.push(
            Finding::new(
                "Passwordless sudo grants",
                Severity::Medium,
                COMPLIANCE,
                format!("{} sudoers entries allow privilege escalation without a password.", nopasswd.len()),
                "Require a password for sudo or scope NOPASSWD to specific audited commands.",
            )
            .with_evidence(nopasswd.join("\n")),
        );
    }
}

fn check_pending_updates(dataset: &CollectedDataset, findings: &mut Vec<Finding>) {
    let Some(out) = dataset.stdout("pending_updates") else {
        return;
    };

    // The table command emits a bare count
    let count: u32 = out
        .lines()
        .find_map(|l| l.trim().parse().ok())
        .unwrap_or(0);

    let severity = match count {
        0 => return,
        1..=20 => Severity::Low,
        21..=50 => Severity::Medium,
        _ => Severity::High,
    };

    findings.push(
        Finding::new(
            format!("{count} package updates pending"),
            severity,
            COMPLIANCE,
            "Unapplied updates accumulate known, patched vulnerabilities.",
            "Schedule a patch window and apply the pending updates.",
        )
        .with_evidence(format!("pending update count: {count}")),
    );
}

fn check_disk_usage(dataset: &CollectedDataset, findings: &mut Vec<Finding>) {
    let Some(df) = dataset.stdout("disk_usage") else {
        return;
    };

    for line in df.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 6 {
            continue;
        }
        let Some(pct) = fields[4].strip_suffix('%').and_then(|p| p.parse::<u8>().ok()) else {
            continue;
        };
        let mount = fields[5];

        let severity = if pct >= 95 {
            Severity::High
        } else if pct >= 90 {
            Severity::Medium
        } else {
            continue;
        };

        findings.push(
            Finding::new(
                format!("Filesystem {mount} is {pct}% full"),
                severity,
                PERFORMANCE,
                "A full filesystem degrades services and can halt logging entirely.",
                format!("Free space on {mount} or grow the volume."),
            )
            .with_evidence(line.trim().to_string()),
        );
    }
}

fn check_insecure_services(dataset: &CollectedDataset, findings: &mut Vec<Finding>) {
    // Look across both service listings and the port table; either one
    // mentioning the service is enough.
    let mut haystack = String::new();
    for category in ["running_services", "listening_ports"] {
        if let Some(out) = dataset.stdout(category) {
            haystack.push_str(&out.to_lowercase());
            haystack.push('\n');
        }
    }
    if haystack.is_empty() {
        return;
    }

    for (service, why) in INSECURE_SERVICES {
        if haystack.contains(service) {
            findings.push(Finding::new(
                format!("Known-insecure service present: {service}"),
                Severity::High,
                SECURITY,
                format!("{why}."),
                format!("Disable and remove {service}; replace it with an encrypted alternative."),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use vigil_common::{CollectionMethod, CommandResult};

    fn dataset_with(entries: &[(&str, &str)]) -> CollectedDataset {
        let mut ds =
            CollectedDataset::new(Uuid::new_v4(), "web-01", CollectionMethod::CommandTable);
        for (category, stdout) in entries {
            ds.insert_ok(*category, CommandResult::new("cmd", *stdout, "", 0));
        }
        ds
    }

    #[test]
    fn test_root_login_and_missing_firewall_scenario() {
        // PermitRootLogin yes plus no firewall status
        // must yield at least a critical and a high finding.
        let ds = dataset_with(&[("ssh_config", "PermitRootLogin yes\nPort 22")]);
        let findings = evaluate(&ds);

        assert!(findings
            .iter()
            .any(|f| f.severity == Severity::Critical && f.title.contains("Root login")));
        assert!(findings
            .iter()
            .any(|f| f.severity == Severity::High && f.title.contains("firewall")));
    }

    #[test]
    fn test_commented_sshd_directives_ignored() {
        let ds = dataset_with(&[
            ("ssh_config", "#PermitRootLogin yes\nPermitRootLogin no"),
            ("firewall_status", "Status: active\nTo  Action  From\n22/tcp ALLOW Anywhere"),
        ]);
        let findings = evaluate(&ds);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_inline_sshd_comments_stripped_before_matching() {
        let ds = dataset_with(&[
            ("ssh_config", "PermitRootLogin no # was yes"),
            ("firewall_status", "Status: active rules loaded"),
        ]);
        assert!(evaluate(&ds).is_empty());

        let ds = dataset_with(&[
            ("ssh_config", "PermitRootLogin yes # hardening pending"),
            ("firewall_status", "Status: active rules loaded"),
        ]);
        let findings = evaluate(&ds);
        let f = findings
            .iter()
            .find(|f| f.title.contains("Root login"))
            .expect("root login finding");
        assert_eq!(f.evidence.as_deref(), Some("PermitRootLogin yes"));
    }

    #[test]
    fn test_absent_firewall_tooling_is_flagged() {
        // Neither ufw nor iptables installed: the probe command exits
        // nonzero with nothing on stdout.
        let mut ds =
            CollectedDataset::new(Uuid::new_v4(), "web-01", CollectionMethod::CommandTable);
        ds.insert_ok("firewall_status", CommandResult::new("cmd", "", "", 127));
        let findings = evaluate(&ds);
        assert!(findings
            .iter()
            .any(|f| f.severity == Severity::High && f.title.contains("firewall")));

        // Same for an empty success (wrapper swallowed the exit code)
        let mut ds =
            CollectedDataset::new(Uuid::new_v4(), "web-01", CollectionMethod::CommandTable);
        ds.insert_ok("firewall_status", CommandResult::new("cmd", "", "", 0));
        let findings = evaluate(&ds);
        assert!(findings.iter().any(|f| f.title.contains("firewall")));
    }

    #[test]
    fn test_multiple_uid_zero_accounts_flagged() {
        let ds = dataset_with(&[
            ("users", "root:x:0:0:root:/root:/bin/bash\ntoor:x:0:0::/root:/bin/sh\nalice:x:1000:1000::/home/alice:/bin/bash"),
            ("firewall_status", "Status: active rules loaded"),
        ]);
        let findings = evaluate(&ds);
        let f = findings
            .iter()
            .find(|f| f.title.contains("UID 0"))
            .expect("uid-0 finding");
        assert_eq!(f.severity, Severity::Critical);
        assert!(f.evidence.as_deref().unwrap().contains("toor"));
    }

    #[test]
    fn test_pending_update_thresholds() {
        for (count, expect) in [("5", Severity::Low), ("35", Severity::Medium), ("80", Severity::High)] {
            let ds = dataset_with(&[
                ("pending_updates", count),
                ("firewall_status", "Status: active rules loaded"),
            ]);
            let findings = evaluate(&ds);
            let f = findings
                .iter()
                .find(|f| f.title.contains("updates pending"))
                .expect("update finding");
            assert_eq!(f.severity, expect, "count {count}");
        }
    }

    #[test]
    fn test_disk_usage_thresholds() {
        let df = "Filesystem Size Used Avail Use% Mounted on\n\
                  /dev/sda1  100G  96G    4G  96% /\n\
                  /dev/sdb1  100G  91G    9G  91% /var\n\
                  /dev/sdc1  100G  50G   50G  50% /home";
        let ds = dataset_with(&[
            ("disk_usage", df),
            ("firewall_status", "Status: active rules loaded"),
        ]);
        let findings = evaluate(&ds);
        let disk: Vec<_> = findings.iter().filter(|f| f.category == "performance").collect();
        assert_eq!(disk.len(), 2);
        assert_eq!(disk[0].severity, Severity::High);
        assert_eq!(disk[1].severity, Severity::Medium);
    }

    #[test]
    fn test_insecure_service_detection() {
        let ds = dataset_with(&[
            ("running_services", "telnet.socket loaded active running Telnet Server"),
            ("firewall_status", "Status: active rules loaded"),
        ]);
        let findings = evaluate(&ds);
        assert!(findings
            .iter()
            .any(|f| f.severity == Severity::High && f.title.contains("telnet")));
    }

    #[test]
    fn test_evaluation_is_byte_identical() {
        let ds = dataset_with(&[
            ("ssh_config", "PermitRootLogin yes\nPasswordAuthentication yes"),
            ("users", "root:x:0:0::/root:/bin/bash\ntoor:x:0:0::/root:/bin/sh"),
            ("pending_updates", "42"),
        ]);
        // Ids included: the serialized lists must match byte for byte
        let a = serde_json::to_string(&evaluate(&ds)).unwrap();
        let b = serde_json::to_string(&evaluate(&ds)).unwrap();
        assert_eq!(a, b);
    }
}
