//! Canonical fallback command table.
//!
//! Category names are the stable contract the analysis rules consume;
//! renaming one here breaks rule lookups. Order is the execution order.

/// (category, command) pairs run when the scripted collection path is
/// unavailable. Each runs independently; failures become error markers.
pub const FALLBACK_COMMANDS: &[(&str, &str)] = &[
    // System identity
    ("os_info", "cat /etc/os-release"),
    ("kernel", "uname -a"),
    ("hostname", "hostname -f 2>/dev/null || hostname"),
    ("uptime", "uptime"),
    // Hardware
    ("cpu_info", "lscpu 2>/dev/null || cat /proc/cpuinfo"),
    ("memory_info", "free -h"),
    ("disk_usage", "df -h"),
    ("mounts", "mount | grep -v tmpfs"),
    // Network configuration
    ("network_interfaces", "ip addr show"),
    ("routing_table", "ip route show"),
    ("listening_ports", "ss -tulpn 2>/dev/null || netstat -tulpn"),
    ("dns_config", "cat /etc/resolv.conf"),
    // Accounts and access
    ("users", "cat /etc/passwd"),
    ("groups", "cat /etc/group"),
    ("sudoers", "cat /etc/sudoers 2>/dev/null; ls /etc/sudoers.d/ 2>/dev/null"),
    ("ssh_config", "cat /etc/ssh/sshd_config"),
    ("login_history", "last -n 20"),
    ("password_policy", "cat /etc/login.defs | grep -v '^#' | grep -v '^$'"),
    // Services and processes
    ("running_services", "systemctl list-units --type=service --state=running --no-pager"),
    ("enabled_services", "systemctl list-unit-files --type=service --state=enabled --no-pager"),
    ("processes", "ps aux --sort=-%mem | head -40"),
    // Scheduled tasks
    ("cron_jobs", "crontab -l 2>/dev/null; ls /etc/cron.d/ 2>/dev/null"),
    ("systemd_timers", "systemctl list-timers --no-pager"),
    // Recent logs
    ("auth_log", "journalctl -u ssh -n 50 --no-pager 2>/dev/null || tail -n 50 /var/log/auth.log"),
    ("system_log", "journalctl -p 3 -n 50 --no-pager 2>/dev/null || tail -n 50 /var/log/syslog"),
    // Packages
    (
        "installed_packages",
        "dpkg -l 2>/dev/null | wc -l; rpm -qa 2>/dev/null | wc -l",
    ),
    (
        "pending_updates",
        "apt list --upgradable 2>/dev/null | grep -c upgradable || yum check-update -q 2>/dev/null | grep -vc '^$'",
    ),
    // Firewall
    ("firewall_status", "ufw status verbose 2>/dev/null || iptables -L -n"),
];
