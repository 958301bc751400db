use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use clap::{ArgAction, ColorChoice, CommandFactory, Parser, ValueEnum};
use clap_complete::Shell;
use comfy_table::{ContentArrangement, Table};
use is_terminal::IsTerminal;
use serde::{Deserialize, Serialize};

mod charinfo;
mod console;
mod game;
mod gameinfo;
mod html;
mod ladder;
mod record;
mod status;

static ENABLE_COLOR: OnceLock<bool> = OnceLock::new();

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogFormat { Text, Json }

#[derive(Parser, Debug)]
#[command(
    name = "d2report",
    about = "Diablo II game-server report generator",
    long_about = "Diablo II game-server report generator that parses captured D2GS/bnetd console transcripts, PvPGN charinfo files, and ladder XML exports, and re-emits them as JSON/CSV/HTML reports.",
    after_long_help = "Examples:\n  d2report --status-path captures/status.txt\n  d2report --game-list-path captures/gl.txt --game-dir captures/games\n  d2report --charinfo-dir /pvpgn/var/charinfo --char-glob '*' --csv-path characters.csv\n  d2report --ladder-xml /pvpgn/var/ladders/d2ladder.xml --html-dir www\n  d2report --gameinfo-path captures/gameinfo.txt --out-dir data",
    color = ColorChoice::Auto
)]
struct Args {
    /// Captured `status` console transcript
    #[arg(long)]
    status_path: Option<String>,
    /// Captured uptime transcript (defaults to the status transcript)
    #[arg(long)]
    uptime_path: Option<String>,
    /// Captured `gl` game-list transcript
    #[arg(long)]
    game_list_path: Option<String>,
    /// Directory of per-game `cl <id>` transcripts, one file per game id
    #[arg(long)]
    game_dir: Option<String>,
    /// Cleaned bnetd <Info> game dump
    #[arg(long)]
    gameinfo_path: Option<String>,
    /// PvPGN charinfo root (charinfo/<account>/<char>)
    #[arg(long)]
    charinfo_dir: Option<String>,
    /// Glob filter on charinfo file names
    #[arg(long, short = 'g')]
    char_glob: Option<String>,
    /// PvPGN d2ladder.xml export
    #[arg(long)]
    ladder_xml: Option<String>,
    /// JSON output directory
    #[arg(long, default_value = "data")]
    out_dir: String,
    /// HTML output directory (HTML pages are skipped when unset)
    #[arg(long)]
    html_dir: Option<String>,
    /// Characters CSV path (defaults to <out-dir>/characters.csv)
    #[arg(long)]
    csv_path: Option<String>,
    #[arg(long, default_value_t = false)]
    progress: bool,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
    #[arg(long, short = 'C', default_value_t = false)]
    no_color: bool,
    #[arg(long, default_value_t = false)]
    force_color: bool,
    #[arg(long)]
    log_level: Option<LogLevel>,
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
    #[arg(long)]
    log_path: Option<String>,
    #[arg(long, value_enum)]
    completions: Option<Shell>,
    #[arg(long)]
    completions_out: Option<String>,
    /// TOML config path (default ./d2report.toml)
    #[arg(long)]
    config: Option<String>,
    #[arg(long, default_value_t = false, help = "Suppress the console summary table")]
    no_summary: bool,
}

#[derive(Deserialize)]
struct AppConfig {
    status_path: Option<String>,
    uptime_path: Option<String>,
    game_list_path: Option<String>,
    game_dir: Option<String>,
    gameinfo_path: Option<String>,
    charinfo_dir: Option<String>,
    char_glob: Option<String>,
    ladder_xml: Option<String>,
    out_dir: Option<String>,
    html_dir: Option<String>,
    csv_path: Option<String>,
    progress: Option<bool>,
    force_color: Option<bool>,
    log_format: Option<LogFormat>,
    log_path: Option<String>,
    no_summary: Option<bool>,
}

fn main() {
    let mut args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        if let Some(path) = args.completions_out.as_ref() {
            if let Ok(mut f) = std::fs::File::create(path) { clap_complete::generate(sh, &mut cmd, "d2report", &mut f); } else { clap_complete::generate(sh, &mut cmd, "d2report", &mut std::io::stdout()); }
        } else {
            clap_complete::generate(sh, &mut cmd, "d2report", &mut std::io::stdout());
        }
        return;
    }
    if let Some(p) = args.config.as_ref()
        && let Ok(s) = std::fs::read_to_string(p)
        && let Ok(cfg) = toml::from_str::<AppConfig>(&s) { apply_config(&mut args, cfg); }
    else {
        let def = "d2report.toml";
        if let Ok(s) = std::fs::read_to_string(def)
            && let Ok(cfg) = toml::from_str::<AppConfig>(&s) { apply_config(&mut args, cfg); }
    }
    {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if args.quiet {
            builder.filter_level(log::LevelFilter::Error);
        } else if let Some(lvl) = args.log_level {
            let f = match lvl { LogLevel::Error => log::LevelFilter::Error, LogLevel::Warn => log::LevelFilter::Warn, LogLevel::Info => log::LevelFilter::Info, LogLevel::Debug => log::LevelFilter::Debug, LogLevel::Trace => log::LevelFilter::Trace };
            builder.filter_level(f);
        } else if args.verbose > 0 {
            let f = if args.verbose >= 3 { log::LevelFilter::Trace } else if args.verbose == 2 { log::LevelFilter::Debug } else { log::LevelFilter::Info };
            builder.filter_level(f);
        }
        if let Some(fmt) = args.log_format {
            match fmt {
                LogFormat::Json => {
                    builder.format(|buf, record| {
                        use std::io::Write;
                        let ts = chrono::Local::now().to_rfc3339();
                        let obj = serde_json::json!({
                            "ts": ts,
                            "level": record.level().to_string(),
                            "target": record.target(),
                            "msg": record.args().to_string(),
                        });
                        writeln!(buf, "{}", obj)
                    });
                }
                LogFormat::Text => {
                    builder.format(|buf, record| {
                        use std::io::Write;
                        let ts = chrono::Local::now().format("%H:%M:%S");
                        writeln!(buf, "[{:<5} {}] {}", record.level(), ts, record.args())
                    });
                }
            }
        }
        if let Some(path) = args.log_path.as_ref() {
            match std::fs::File::create(path) {
                Ok(f) => { builder.target(env_logger::Target::Pipe(Box::new(f))); }
                Err(e) => { eprintln!("Failed to open log file {}: {}", path, e); }
            }
        }
        builder.init();
    }
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let enable_color = if args.force_color { true } else { color_default && !args.no_color };
    let _ = ENABLE_COLOR.set(enable_color);

    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let out_dir = PathBuf::from(&args.out_dir);
    if let Err(e) = std::fs::create_dir_all(&out_dir) {
        log::error!("Cannot create output directory {}: {}", out_dir.display(), e);
        std::process::exit(1);
    }
    let html_dir = args.html_dir.as_ref().map(PathBuf::from);
    if let Some(d) = html_dir.as_ref()
        && let Err(e) = std::fs::create_dir_all(d) {
        log::error!("Cannot create HTML directory {}: {}", d.display(), e);
        std::process::exit(1);
    }
    let mut summary: Vec<(&str, String)> = Vec::new();

    if args.status_path.is_some() || args.uptime_path.is_some() {
        let status_raw = args.status_path.as_deref().and_then(|p| read_transcript("Status", p));
        let uptime_raw = match args.uptime_path.as_deref() {
            Some(p) => read_transcript("Uptime", p),
            // The status capture usually carries the uptime sentences too.
            None => status_raw.clone(),
        };
        summary.extend(run_status_job(status_raw.as_deref(), uptime_raw.as_deref(), &out_dir, html_dir.as_deref(), &generated, args.quiet));
    }

    if let Some(dir) = args.game_dir.as_ref() {
        let games = collect_games(Path::new(dir), args.game_list_path.as_deref());
        emit_json(&out_dir.join("games.json"), &games, args.quiet);
        if let Some(d) = html_dir.as_ref() {
            emit_bytes(&d.join("games.html"), html::render_games_page(&games, &generated).as_bytes(), args.quiet);
        }
        summary.push(("games", format!("{} parsed", games.len())));
    }

    if let Some(p) = args.gameinfo_path.as_ref() {
        match std::fs::read_to_string(p) {
            Ok(text) => {
                let games = gameinfo::parse_gameinfo(&text);
                let doc = serde_json::json!({ "last_updated": &generated, "games": &games });
                emit_json(&out_dir.join("gameinfo.json"), &doc, args.quiet);
                if let Some(d) = html_dir.as_ref() {
                    emit_bytes(&d.join("gameinfo.html"), html::render_gameinfo_page(&games, &generated).as_bytes(), args.quiet);
                }
                summary.push(("gameinfo", format!("{} games", games.len())));
            }
            Err(e) => log::error!("Game-info dump unreadable: {}: {}", p, e),
        }
    }

    if let Some(dir) = args.charinfo_dir.as_ref() {
        let chars = charinfo::collect_characters(Path::new(dir), args.char_glob.as_deref(), args.progress);
        emit_json(&out_dir.join("characters.json"), &chars, args.quiet);
        let csv_path = args.csv_path.as_ref().map(PathBuf::from).unwrap_or_else(|| out_dir.join("characters.csv"));
        match characters_csv(&chars) {
            Ok(bytes) => emit_bytes(&csv_path, &bytes, args.quiet),
            Err(e) => log::error!("CSV encode failed: {:#}", e),
        }
        let ladder = charinfo::ladder_sorted(&chars);
        if let Some(d) = html_dir.as_ref() {
            emit_bytes(&d.join("ladder.html"), html::render_ladder_page(&ladder, &generated).as_bytes(), args.quiet);
        }
        summary.push(("characters", format!("{} total, {} on ladder", chars.len(), ladder.len())));
    }

    if let Some(p) = args.ladder_xml.as_ref() {
        match std::fs::read_to_string(p) {
            Ok(xml) => {
                let ladders = ladder::parse_ladder_xml(&xml);
                emit_json(&out_dir.join("d2ladder.json"), &ladders, args.quiet);
                if let Some(d) = html_dir.as_ref() {
                    emit_bytes(&d.join("season_ladder.html"), html::render_xml_ladder_page(&ladders, &generated).as_bytes(), args.quiet);
                }
                summary.push(("xml ladder", format!("{} ladders", ladders.len())));
            }
            Err(e) => log::error!("Ladder XML unreadable: {}: {}", p, e),
        }
    }

    if summary.is_empty() {
        log::warn!("No input artifacts given, nothing to do. See --help for the input flags.");
    } else if !args.quiet && !args.no_summary {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Report", "Result"]);
        for (job, result) in &summary { table.add_row(vec![job.to_string(), result.clone()]); }
        println!("{table}");
    }
}

fn apply_config(args: &mut Args, cfg: AppConfig) {
    if args.status_path.is_none() && let Some(v) = cfg.status_path { args.status_path = Some(v); }
    if args.uptime_path.is_none() && let Some(v) = cfg.uptime_path { args.uptime_path = Some(v); }
    if args.game_list_path.is_none() && let Some(v) = cfg.game_list_path { args.game_list_path = Some(v); }
    if args.game_dir.is_none() && let Some(v) = cfg.game_dir { args.game_dir = Some(v); }
    if args.gameinfo_path.is_none() && let Some(v) = cfg.gameinfo_path { args.gameinfo_path = Some(v); }
    if args.charinfo_dir.is_none() && let Some(v) = cfg.charinfo_dir { args.charinfo_dir = Some(v); }
    if args.char_glob.is_none() && let Some(v) = cfg.char_glob { args.char_glob = Some(v); }
    if args.ladder_xml.is_none() && let Some(v) = cfg.ladder_xml { args.ladder_xml = Some(v); }
    if args.out_dir == "data" && let Some(v) = cfg.out_dir { args.out_dir = v; }
    if args.html_dir.is_none() && let Some(v) = cfg.html_dir { args.html_dir = Some(v); }
    if args.csv_path.is_none() && let Some(v) = cfg.csv_path { args.csv_path = Some(v); }
    if let Some(v) = cfg.progress { args.progress = v; }
    if let Some(v) = cfg.force_color { args.force_color = v; }
    if args.log_format.is_none() && let Some(v) = cfg.log_format { args.log_format = Some(v); }
    if args.log_path.is_none() && let Some(v) = cfg.log_path { args.log_path = Some(v); }
    if let Some(v) = cfg.no_summary { args.no_summary = v; }
}

fn read_transcript(label: &str, path: &str) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(s) => Some(s),
        Err(e) => { log::error!("{} transcript unreadable: {}: {}", label, path, e); None }
    }
}

/// Status and uptime reports are independent: either transcript alone
/// still produces its outputs. The HTML page hangs off the status
/// transcript and folds in whatever uptime parsed.
fn run_status_job(status_raw: Option<&str>, uptime_raw: Option<&str>, out_dir: &Path, html_dir: Option<&Path>, generated: &str, quiet: bool) -> Vec<(&'static str, String)> {
    let mut summary = Vec::new();
    let uptime = uptime_raw.map(status::parse_uptime);
    if let Some(up) = uptime.as_ref() {
        emit_json(&out_dir.join("d2gs_uptime.json"), up, quiet);
        emit_bytes(&out_dir.join("d2gs_uptime.txt"), up.uptime_total_seconds.to_string().as_bytes(), quiet);
    }
    if let Some(raw) = status_raw {
        let report = status::parse_status(raw);
        emit_json(&out_dir.join("d2gs_status.json"), &report, quiet);
        if let Some(d) = html_dir {
            let up = uptime.clone().unwrap_or_default();
            emit_bytes(&d.join("status.html"), html::render_status_page(&report, &up, generated).as_bytes(), quiet);
        }
        summary.push(("status", format!("{} games running", report.current_activity.running_games)));
    } else if let Some(up) = uptime.as_ref() {
        summary.push(("uptime", format!("{}s total", up.uptime_total_seconds)));
    }
    summary
}

/// Per-game transcripts. With a `gl` game list only the announced ids are
/// read (missing transcript files are logged and skipped); a list that
/// announces zero games yields zero games, so stale transcripts left in
/// the directory are never reported as live. Without a game list every
/// file directly under the directory is parsed.
fn collect_games(dir: &Path, game_list_path: Option<&str>) -> Vec<record::Record> {
    let mut games = Vec::new();
    let Some(p) = game_list_path else {
        for de in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1).into_iter().filter_map(|e| e.ok()) {
            let p = de.path();
            if !p.is_file() { continue; }
            match std::fs::read_to_string(p) {
                Ok(cl) => games.push(game::parse_game(&cl)),
                Err(e) => log::warn!("Skipping game transcript {}: {}", p.display(), e),
            }
        }
        return games;
    };
    let ids = match std::fs::read_to_string(p) {
        Ok(gl) => game::game_ids(&gl),
        Err(e) => { log::error!("Game-list transcript unreadable: {}: {}", p, e); return games; }
    };
    if ids.is_empty() {
        log::info!("Game list announces no running games");
    }
    for id in &ids {
        let p = dir.join(format!("{}.txt", id));
        match std::fs::read_to_string(&p) {
            Ok(cl) => games.push(game::parse_game(&cl)),
            Err(e) => log::warn!("No transcript for game {}: {}", id, e),
        }
    }
    games
}

/// Replaces the target only after the whole payload is on disk, so readers
/// polling the output directory never see a half-written report.
fn atomic_write(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    use anyhow::Context;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("renaming {} into place", tmp.display()))?;
    Ok(())
}

fn emit_bytes(path: &Path, bytes: &[u8], quiet: bool) {
    match atomic_write(path, bytes) {
        Ok(_) => { if !quiet { println!("{}", paint(&format!("Written: {}", path.display()), "1;36")); } }
        Err(e) => log::error!("Write failed for {}: {:#}", path.display(), e),
    }
}

fn emit_json<T: Serialize>(path: &Path, value: &T, quiet: bool) {
    match serde_json::to_vec_pretty(value) {
        Ok(bytes) => emit_bytes(path, &bytes, quiet),
        Err(e) => log::error!("JSON encode failed for {}: {}", path.display(), e),
    }
}

fn characters_csv(chars: &[charinfo::Character]) -> anyhow::Result<Vec<u8>> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(["AccountName", "CharName", "Class", "Level", "Experience", "Gold", "CreateTime", "LastLogin", "IsLadder"])?;
    for c in chars {
        w.write_record([
            c.account.as_str(),
            c.name.as_str(),
            c.class.as_str(),
            &c.level.to_string(),
            &c.experience.to_string(),
            &c.gold.to_string(),
            c.create_time.as_str(),
            c.last_login.as_str(),
            if c.is_ladder { "yes" } else { "no" },
        ])?;
    }
    w.into_inner().map_err(|e| anyhow::anyhow!("flushing CSV buffer: {}", e))
}

fn paint(s: &str, code: &str) -> String {
    if *ENABLE_COLOR.get().unwrap_or(&false) {
        format!("\u{1b}[{}m{}\u{1b}[0m", code, s)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_and_cleans_tmp() {
        let dir = std::env::temp_dir().join("d2report_atomic_test");
        std::fs::create_dir_all(&dir).unwrap();
        let target = dir.join("out.json");
        std::fs::write(&target, b"old").unwrap();
        atomic_write(&target, b"new").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
        assert!(!target.with_extension("tmp").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn characters_csv_has_header_and_rows() {
        let ch = charinfo::character_from(
            charinfo::key_value_fields("charname=FrozenOrb\nacctname=admin\nlevel=93\nladder=yes\n"),
            "admin", "FrozenOrb",
        );
        let bytes = characters_csv(&[ch]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("AccountName,CharName"));
        let row = lines.next().unwrap();
        assert!(row.contains("FrozenOrb"));
        assert!(row.ends_with("yes"));
    }

    #[test]
    fn empty_game_list_yields_no_games() {
        let dir = std::env::temp_dir().join("d2report_empty_gl_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        // Stale transcript from an earlier run; the current game list is
        // headers and dividers only.
        std::fs::write(dir.join("7.txt"), "[GameName : stale-run] [UserCount : 2]\n").unwrap();
        let gl = dir.join("gl.txt");
        std::fs::write(&gl, "+------+----------------+------+-------+---+\n| GAME | NAME           | ID   | USERS | N |\n+------+----------------+------+-------+---+\n").unwrap();
        let games = collect_games(&dir, Some(gl.to_str().unwrap()));
        assert!(games.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn uptime_transcript_alone_emits_uptime_outputs() {
        let dir = std::env::temp_dir().join("d2report_uptime_job_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let raw = "The game server started at Sat Aug 23 10:00:00 2025\n\
                   AND it has been uptime 0 days 0 hours 1 minutes 5 seconds\n";
        let summary = run_status_job(None, Some(raw), &dir, None, "now", true);
        assert_eq!(std::fs::read_to_string(dir.join("d2gs_uptime.txt")).unwrap(), "65");
        assert!(dir.join("d2gs_uptime.json").exists());
        assert!(!dir.join("d2gs_status.json").exists());
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].0, "uptime");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn collect_games_reads_listed_ids_only() {
        let dir = std::env::temp_dir().join("d2report_games_test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("7.txt"), "[GameName : baal-run] [UserCount : 2]\n").unwrap();
        std::fs::write(dir.join("9.txt"), "[GameName : unlisted]\n").unwrap();
        let gl = dir.join("gl.txt");
        std::fs::write(&gl, "| 1 | baal-run | 7 | 2 | N |\n").unwrap();
        let games = collect_games(&dir, Some(gl.to_str().unwrap()));
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].get_str("GameName"), Some("baal-run"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
