use std::sync::OnceLock;
use regex::Regex;
use serde::Serialize;

/// Typed extraction over free-form status text. Capture group 1 of the
/// pattern is parsed; a missing label or a failed parse yields the caller's
/// default. Extraction never errors.
pub fn int_value(re: &Regex, text: &str, default: i64) -> i64 {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().trim().parse().ok())
        .unwrap_or(default)
}

/// Float variant; tolerates a trailing `%` on the captured value.
pub fn float_value(re: &Regex, text: &str, default: f64) -> f64 {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().trim().trim_end_matches('%').trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MemoryUsage {
    pub used_mb: f64,
    pub total_mb: f64,
}

/// The console reports memory as `<used>MB/ <total>MB` on one line. The
/// outer pattern captures the rest of the line; a narrower pattern splits it
/// into the two numbers. `N/A` or a missing line yields the zero pair.
pub fn memory_usage(re: &Regex, text: &str) -> MemoryUsage {
    static MEM_PAIR_RE: OnceLock<Regex> = OnceLock::new();
    let inner = MEM_PAIR_RE.get_or_init(|| Regex::new(r"(\d+\.\d+)MB/\s*(\d+\.\d+)MB").unwrap());
    if let Some(cap) = re.captures(text)
        && let Some(line) = cap.get(1)
        && let Some(m) = inner.captures(line.as_str())
        && let (Ok(used), Ok(total)) = (m[1].parse(), m[2].parse()) {
        return MemoryUsage { used_mb: used, total_mb: total };
    }
    MemoryUsage::default()
}

/// Total seconds from a `D days H hours M minutes S seconds` phrase. The
/// numbers sit at tokens 0/2/4/6; if any of them fails to parse the whole
/// derivation collapses to zero rather than a partial sum.
pub fn duration_seconds(phrase: &str) -> u64 {
    let parts: Vec<&str> = phrase.split_whitespace().collect();
    let num = |i: usize| parts.get(i).and_then(|p| p.parse::<u64>().ok());
    match (num(0), num(2), num(4), num(6)) {
        (Some(d), Some(h), Some(m), Some(s)) => s + m * 60 + h * 3600 + d * 86400,
        _ => 0,
    }
}

pub const KNOWN_SERVICES: [&str; 2] = ["D2CS", "D2DBS"];

/// Rows of a whitespace-tokenized service table. A line counts only if it
/// has exactly `1 + width` tokens and its first token is a known service
/// name; everything else in the section is skipped. Source order preserved.
pub fn service_rows<'a>(body: &'a str, width: usize) -> Vec<(&'a str, Vec<&'a str>)> {
    let mut out = Vec::new();
    for line in body.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 1 + width { continue; }
        if !KNOWN_SERVICES.contains(&tokens[0]) { continue; }
        out.push((tokens[0], tokens[1..].to_vec()));
    }
    out
}

/// Per-service rows keyed by lowercased service name, kept in source order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServiceTable<T>(pub Vec<(String, T)>);

impl<T: Serialize> Serialize for ServiceTable<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 { map.serialize_entry(k, v)?; }
        map.end()
    }
}

impl<T> ServiceTable<T> {
    pub fn get(&self, service: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == service).map(|(_, v)| v)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct TransferTotals {
    pub recv_pkts: i64,
    pub recv_bytes: i64,
    pub send_pkts: i64,
    pub send_bytes: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct TransferRates {
    pub current_recv: f64,
    pub peak_recv: f64,
    pub current_send: f64,
    pub peak_send: f64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct NetworkStatistics {
    pub total_transfer: ServiceTable<TransferTotals>,
    pub rates_kbytes_sec: ServiceTable<TransferRates>,
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct GameLimits {
    pub max_games_set: i64,
    pub max_games_current: i64,
    pub max_prefer_users: i64,
    pub max_game_life_seconds: i64,
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct CurrentActivity {
    pub running_games: i64,
    pub users_in_game: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServiceConnections {
    pub d2cs: String,
    pub d2dbs: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResourceUsage {
    pub physical_memory: MemoryUsage,
    pub virtual_memory: MemoryUsage,
    pub kernel_cpu_percent: f64,
    pub user_cpu_percent: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    pub game_limits: GameLimits,
    pub current_activity: CurrentActivity,
    pub service_connections: ServiceConnections,
    pub resource_usage: ResourceUsage,
    pub network_statistics: NetworkStatistics,
}

struct StatusPatterns {
    max_games_set: Regex,
    max_games_current: Regex,
    max_prefer_users: Regex,
    max_game_life: Regex,
    running_games: Regex,
    users_in_game: Regex,
    d2cs_link: Regex,
    d2dbs_link: Regex,
    physical_memory: Regex,
    virtual_memory: Regex,
    kernel_cpu: Regex,
    user_cpu: Regex,
    transfer_totals: Regex,
    transfer_rates: Regex,
}

fn status_patterns() -> &'static StatusPatterns {
    static PATTERNS: OnceLock<StatusPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).unwrap();
        StatusPatterns {
            max_games_set: re(r"Setting maximum game:\s*(\d+)"),
            max_games_current: re(r"Current maximum game:\s*(\d+)"),
            max_prefer_users: re(r"Maximum prefer users:\s*(\d+)"),
            max_game_life: re(r"Maximum game life:\s*(\d+)"),
            running_games: re(r"Current running game:\s*(\d+)"),
            users_in_game: re(r"Current users in game:\s*(\d+)"),
            // The console itself misspells "Connection".
            d2cs_link: re(r"Connetion to D2CS\s*(.*)"),
            d2dbs_link: re(r"Connetion to D2DBS\s*(.*)"),
            physical_memory: re(r"Physical memory usage:\s*([^\n]+)"),
            virtual_memory: re(r"Virtual memory usage:\s*([^\n]+)"),
            kernel_cpu: re(r"Kernel CPU usage:\s*(\d+\.\d+)%"),
            user_cpu: re(r"User CPU usage:\s*(\d+\.\d+)%"),
            transfer_totals: re(r"RecvPkts\s*RecvBytes\s*SendPkts\s*SendBytes([\s\S]*?)RecvRate"),
            transfer_rates: re(r"RecvRate\s*PeakRecvRate\s*SendRate\s*PeakSendRate([\s\S]*)$"),
        }
    })
}

/// Scrapes the D2GS `status` transcript. Every field is located by its own
/// pattern; absent or garbled fields fall back to their defaults, so a
/// partial dump still yields a full report.
pub fn parse_status(status_raw: &str) -> StatusReport {
    let p = status_patterns();
    let game_limits = GameLimits {
        max_games_set: int_value(&p.max_games_set, status_raw, 0),
        max_games_current: int_value(&p.max_games_current, status_raw, 0),
        max_prefer_users: int_value(&p.max_prefer_users, status_raw, 0),
        max_game_life_seconds: int_value(&p.max_game_life, status_raw, 0),
    };
    let current_activity = CurrentActivity {
        running_games: int_value(&p.running_games, status_raw, 0),
        users_in_game: int_value(&p.users_in_game, status_raw, 0),
    };
    let conn = |re: &Regex| {
        re.captures(status_raw)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_else(|| "Status Unknown".to_string())
    };
    let service_connections = ServiceConnections {
        d2cs: conn(&p.d2cs_link),
        d2dbs: conn(&p.d2dbs_link),
    };
    let resource_usage = ResourceUsage {
        physical_memory: memory_usage(&p.physical_memory, status_raw),
        virtual_memory: memory_usage(&p.virtual_memory, status_raw),
        kernel_cpu_percent: float_value(&p.kernel_cpu, status_raw, 0.0),
        user_cpu_percent: float_value(&p.user_cpu, status_raw, 0.0),
    };
    StatusReport {
        game_limits,
        current_activity,
        service_connections,
        resource_usage,
        network_statistics: parse_network_statistics(status_raw),
    }
}

fn parse_network_statistics(status_raw: &str) -> NetworkStatistics {
    let mut net = NetworkStatistics::default();
    if let Some(cap) = status_patterns().transfer_totals.captures(status_raw) {
        for (service, cols) in service_rows(&cap[1], 4) {
            let nums: Vec<i64> = cols.iter().filter_map(|c| c.parse().ok()).collect();
            if nums.len() != 4 { continue; }
            net.total_transfer.0.push((service.to_lowercase(), TransferTotals {
                recv_pkts: nums[0],
                recv_bytes: nums[1],
                send_pkts: nums[2],
                send_bytes: nums[3],
            }));
        }
    }
    if let Some(cap) = status_patterns().transfer_rates.captures(status_raw) {
        for (service, cols) in service_rows(&cap[1], 4) {
            let nums: Vec<f64> = cols.iter().filter_map(|c| c.parse().ok()).collect();
            if nums.len() != 4 { continue; }
            net.rates_kbytes_sec.0.push((service.to_lowercase(), TransferRates {
                current_recv: nums[0],
                peak_recv: nums[1],
                current_send: nums[2],
                peak_send: nums[3],
            }));
        }
    }
    net
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct UptimeReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_duration: Option<String>,
    pub uptime_total_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_time: Option<String>,
}

/// Scrapes the D2GS `uptime` transcript. Each sentence is captured
/// independently; the derived total is zero unless the whole duration
/// phrase parses.
pub fn parse_uptime(uptime_raw: &str) -> UptimeReport {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    let [start_re, uptime_re, now_re] = PATTERNS.get_or_init(|| [
        Regex::new(r"The game server started at (.*)").unwrap(),
        Regex::new(r"uptime (.*)").unwrap(),
        Regex::new(r"Now it is (.*)").unwrap(),
    ]);
    let grab = |re: &Regex| re.captures(uptime_raw).map(|c| c[1].trim().to_string());
    let uptime_duration = grab(uptime_re);
    let uptime_total_seconds = uptime_duration.as_deref().map(duration_seconds).unwrap_or(0);
    UptimeReport {
        server_start_time: grab(start_re),
        uptime_duration,
        uptime_total_seconds,
        current_time: grab(now_re),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS_DUMP: &str = "\
D2GS Status:
Setting maximum game: 100
Current maximum game: 64
Current running game: 7
Current users in game: 21
Maximum prefer users: 40
Maximum game life: 0
Connetion to D2CS  OK!
Connetion to D2DBS OK!
Physical memory usage: 1.500MB/ 2.000MB
Virtual memory usage: N/A
Kernel CPU usage: 12.34%
User CPU usage: 1.02%
Game Server Net Statistic:
        RecvPkts  RecvBytes  SendPkts  SendBytes
D2CS    120       4096       118       2048
GARBAGE 1         2
D2DBS   77        1024       80        4096
        RecvRate  PeakRecvRate  SendRate  PeakSendRate
D2CS    0.10      1.25          0.08      0.90
D2DBS   0.02      0.55          0.03      0.60
";

    #[test]
    fn float_label_extracts_value() {
        let re = Regex::new(r"Kernel CPU usage:\s*(\d+\.\d+)%").unwrap();
        assert_eq!(float_value(&re, STATUS_DUMP, 0.0), 12.34);
        assert_eq!(float_value(&re, "no such label here", 0.0), 0.0);
    }

    #[test]
    fn memory_decomposes_or_defaults() {
        let re = Regex::new(r"Physical memory usage:\s*([^\n]+)").unwrap();
        let mem = memory_usage(&re, STATUS_DUMP);
        assert_eq!(mem, MemoryUsage { used_mb: 1.5, total_mb: 2.0 });
        let re = Regex::new(r"Virtual memory usage:\s*([^\n]+)").unwrap();
        assert_eq!(memory_usage(&re, STATUS_DUMP), MemoryUsage::default());
    }

    #[test]
    fn duration_total_seconds() {
        assert_eq!(duration_seconds("1 days 2 hours 3 minutes 4 seconds"), 97384);
        assert_eq!(duration_seconds("1 days two hours 3 minutes 4 seconds"), 0);
        assert_eq!(duration_seconds(""), 0);
    }

    #[test]
    fn malformed_service_row_is_skipped_neighbors_kept() {
        let rep = parse_status(STATUS_DUMP);
        let totals = &rep.network_statistics.total_transfer;
        assert_eq!(totals.0.len(), 2);
        assert_eq!(totals.0[0].0, "d2cs");
        assert_eq!(totals.0[1].0, "d2dbs");
        assert_eq!(totals.get("d2dbs").unwrap().recv_pkts, 77);
        let rates = &rep.network_statistics.rates_kbytes_sec;
        assert_eq!(rates.get("d2cs").unwrap().peak_recv, 1.25);
    }

    #[test]
    fn status_fields_scraped_with_defaults() {
        let rep = parse_status(STATUS_DUMP);
        assert_eq!(rep.game_limits.max_games_set, 100);
        assert_eq!(rep.current_activity.users_in_game, 21);
        assert_eq!(rep.service_connections.d2cs, "OK!");
        let empty = parse_status("nothing recognizable");
        assert_eq!(empty.game_limits.max_games_set, 0);
        assert_eq!(empty.service_connections.d2dbs, "Status Unknown");
        assert!(empty.network_statistics.total_transfer.0.is_empty());
    }

    #[test]
    fn uptime_sentences_captured_independently() {
        let raw = "The game server started at Sat Aug 23 10:00:00 2025\n\
                   Now it is Sun Aug 24 12:03:04 2025\n\
                   AND it has been uptime 1 days 2 hours 3 minutes 4 seconds\n";
        let up = parse_uptime(raw);
        assert_eq!(up.server_start_time.as_deref(), Some("Sat Aug 23 10:00:00 2025"));
        assert_eq!(up.uptime_duration.as_deref(), Some("1 days 2 hours 3 minutes 4 seconds"));
        assert_eq!(up.uptime_total_seconds, 97384);
        let none = parse_uptime("no recognizable sentences");
        assert!(none.server_start_time.is_none());
        assert_eq!(none.uptime_total_seconds, 0);
    }
}
