use crate::charinfo::Character;
use crate::ladder::Ladder;
use crate::record::Record;
use crate::status::{StatusReport, UptimeReport};

const STYLE: &str = "body{font-family:'Garamond','Times New Roman',serif;background-color:#1c1c1c;color:#f5d083;margin:0;padding:0} h1,h2,h3{text-align:center;color:#f5d083;text-shadow:2px 2px 4px #000} table{border-collapse:collapse;width:90%;margin:20px auto;background-color:#2b2b2b;border:2px solid #f5d083;box-shadow:0 0 15px rgba(245,208,131,.5)} th,td{border:1px solid #f5d083;padding:8px 12px;text-align:center;color:#f5d083} th{background-color:#3a2f2f;text-shadow:1px 1px 2px #000} tr:nth-child(even){background-color:#2e2b2b} tr:hover{background-color:#5a3e1b;color:#fff;font-weight:bold} .sub{text-align:center;color:#b89a5e;font-size:13px} .pill{display:inline-block;border:1px solid #f5d083;border-radius:999px;padding:4px 10px;margin:4px;font-size:13px}";

fn page_open(s: &mut String, title: &str) {
    s.push_str("<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\"><title>");
    s.push_str(&html_escape(title));
    s.push_str("</title><style>");
    s.push_str(STYLE);
    s.push_str("</style></head><body>");
    s.push_str(&format!("<h1>{}</h1>", html_escape(title)));
}

fn page_close(s: &mut String, generated: &str) {
    s.push_str(&format!("<p class=\"sub\">Generated {}</p></body></html>", html_escape(generated)));
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn render_status_page(status: &StatusReport, uptime: &UptimeReport, generated: &str) -> String {
    let mut s = String::new();
    page_open(&mut s, "D2GS Server Status");
    s.push_str("<h2>Uptime</h2><div style=\"text-align:center\">");
    if let Some(v) = uptime.server_start_time.as_ref() { s.push_str(&format!("<span class=\"pill\">Started · {}</span>", html_escape(v))); }
    if let Some(v) = uptime.uptime_duration.as_ref() { s.push_str(&format!("<span class=\"pill\">Uptime · {}</span>", html_escape(v))); }
    s.push_str(&format!("<span class=\"pill\">Total · {}s</span>", uptime.uptime_total_seconds));
    s.push_str("</div>");
    s.push_str("<h2>Activity and Limits</h2><table><tr><th>Parameter</th><th>Value</th></tr>");
    s.push_str(&format!("<tr><td>Running games</td><td>{}</td></tr>", status.current_activity.running_games));
    s.push_str(&format!("<tr><td>Users in game</td><td>{}</td></tr>", status.current_activity.users_in_game));
    s.push_str(&format!("<tr><td>Maximum games</td><td>{}</td></tr>", status.game_limits.max_games_set));
    s.push_str(&format!("<tr><td>Maximum prefer users</td><td>{}</td></tr>", status.game_limits.max_prefer_users));
    s.push_str(&format!("<tr><td>Maximum game life</td><td>{}s</td></tr>", status.game_limits.max_game_life_seconds));
    s.push_str(&format!("<tr><td>D2CS link</td><td>{}</td></tr>", html_escape(&status.service_connections.d2cs)));
    s.push_str(&format!("<tr><td>D2DBS link</td><td>{}</td></tr>", html_escape(&status.service_connections.d2dbs)));
    s.push_str("</table>");
    s.push_str("<h2>Resources</h2><table><tr><th>Resource</th><th>Usage</th></tr>");
    let mem = &status.resource_usage.physical_memory;
    s.push_str(&format!("<tr><td>Physical memory</td><td>{:.3}MB / {:.3}MB</td></tr>", mem.used_mb, mem.total_mb));
    let mem = &status.resource_usage.virtual_memory;
    s.push_str(&format!("<tr><td>Virtual memory</td><td>{:.3}MB / {:.3}MB</td></tr>", mem.used_mb, mem.total_mb));
    s.push_str(&format!("<tr><td>Kernel CPU</td><td>{:.2}%</td></tr>", status.resource_usage.kernel_cpu_percent));
    s.push_str(&format!("<tr><td>User CPU</td><td>{:.2}%</td></tr>", status.resource_usage.user_cpu_percent));
    s.push_str("</table>");
    let net = &status.network_statistics;
    if !net.total_transfer.0.is_empty() {
        s.push_str("<h2>Net Traffic</h2><table><tr><th>Service</th><th>RecvPkts</th><th>RecvBytes</th><th>SendPkts</th><th>SendBytes</th></tr>");
        for (svc, t) in &net.total_transfer.0 {
            s.push_str(&format!("<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>", html_escape(svc), t.recv_pkts, t.recv_bytes, t.send_pkts, t.send_bytes));
        }
        s.push_str("</table>");
    }
    if !net.rates_kbytes_sec.0.is_empty() {
        s.push_str("<h2>Net Rates (KBytes/s)</h2><table><tr><th>Service</th><th>Recv</th><th>PeakRecv</th><th>Send</th><th>PeakSend</th></tr>");
        for (svc, r) in &net.rates_kbytes_sec.0 {
            s.push_str(&format!("<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>", html_escape(svc), r.current_recv, r.peak_recv, r.current_send, r.peak_send));
        }
        s.push_str("</table>");
    }
    page_close(&mut s, generated);
    s
}

pub fn render_games_page(games: &[Record], generated: &str) -> String {
    let mut s = String::new();
    page_open(&mut s, "Active Games");
    s.push_str(&format!("<p class=\"sub\">{} active games</p>", games.len()));
    for g in games {
        let name = g.get_str("GameName").unwrap_or("(unnamed)");
        s.push_str(&format!("<h2>{}</h2><div style=\"text-align:center\">", html_escape(name)));
        for key in ["Difficulty", "GameType", "Status", "XPRateMultiplier", "XPBonusPercent"] {
            if let Some(v) = g.get(key) {
                s.push_str(&format!("<span class=\"pill\">{} · {}</span>", key, html_escape(&v.display())));
            }
        }
        s.push_str("</div>");
        let chars = g.list("Characters");
        if chars.is_empty() { continue; }
        s.push_str("<table><tr><th>#</th><th>Account</th><th>Character</th><th>Class</th><th>Level</th><th>Entered</th></tr>");
        for c in chars {
            s.push_str("<tr>");
            for key in ["No", "AcctName", "CharName", "Class", "Level", "EnterTime"] {
                let v = c.get(key).map(|v| v.display()).unwrap_or_default();
                s.push_str(&format!("<td>{}</td>", html_escape(&v)));
            }
            s.push_str("</tr>");
        }
        s.push_str("</table>");
    }
    page_close(&mut s, generated);
    s
}

/// Web ladder built from charinfo files; callers pass the already-sorted
/// ladder slice (see `charinfo::ladder_sorted`).
pub fn render_ladder_page(ladder: &[&Character], generated: &str) -> String {
    let mut s = String::new();
    page_open(&mut s, "Diablo II Ladder");
    s.push_str(&format!("<p class=\"sub\">{} ladder characters</p>", ladder.len()));
    s.push_str("<table><tr><th>#</th><th>Character</th><th>Account</th><th>Class</th><th>Level</th><th>Experience</th><th>Last Login</th></tr>");
    for (i, c) in ladder.iter().enumerate() {
        let last_login = c.last_login.split('T').next().unwrap_or("");
        s.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            i + 1, html_escape(&c.name), html_escape(&c.account), html_escape(&c.class), c.level, c.experience, html_escape(last_login)
        ));
    }
    s.push_str("</table>");
    page_close(&mut s, generated);
    s
}

pub fn render_xml_ladder_page(ladders: &[Ladder], generated: &str) -> String {
    let mut s = String::new();
    page_open(&mut s, "Season Ladder");
    for l in ladders {
        s.push_str(&format!("<h2>{} (type {})</h2>", html_escape(&l.mode), l.ladder_type));
        s.push_str("<table><tr><th>Rank</th><th>Name</th><th>Level</th><th>Experience</th><th>Class</th><th>Prefix</th><th>Status</th></tr>");
        for c in &l.chars {
            s.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                html_escape(&c.rank), html_escape(&c.name), html_escape(&c.level), html_escape(&c.experience),
                html_escape(&c.class), html_escape(&c.prefix), html_escape(&c.status)
            ));
        }
        s.push_str("</table>");
    }
    page_close(&mut s, generated);
    s
}

pub fn render_gameinfo_page(games: &crate::record::RecordSet, generated: &str) -> String {
    let mut s = String::new();
    page_open(&mut s, "Realm Games");
    s.push_str(&format!("<p class=\"sub\">{} games</p>", games.len()));
    s.push_str("<table><tr><th>Name</th><th>Owner</th><th>Client</th><th>Status</th><th>Difficulty</th><th>Players</th></tr>");
    for (name, g) in games.iter() {
        let players = match (g.get("Players_current"), g.get("Players_max")) {
            (Some(cur), Some(max)) => format!("{} / {}", cur.display(), max.display()),
            _ => String::new(),
        };
        s.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            html_escape(name),
            html_escape(&g.get("Owner").map(|v| v.display()).unwrap_or_default()),
            html_escape(&g.get("Client").map(|v| v.display()).unwrap_or_default()),
            html_escape(&g.get("Status").map(|v| v.display()).unwrap_or_default()),
            html_escape(&g.get("Difficulty").map(|v| v.display()).unwrap_or_default()),
            players
        ));
    }
    s.push_str("</table>");
    page_close(&mut s, generated);
    s
}
