use std::path::Path;
use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use walkdir::WalkDir;
use crate::record::{Record, Value};

/// One PvPGN character, normalized from its `.charinfo` key=value file.
#[derive(Clone, Debug, Serialize)]
pub struct Character {
    #[serde(rename = "AccountName")]
    pub account: String,
    #[serde(rename = "CharName")]
    pub name: String,
    #[serde(rename = "Class")]
    pub class: String,
    #[serde(rename = "Level")]
    pub level: i64,
    #[serde(rename = "Experience")]
    pub experience: i64,
    #[serde(rename = "Gold")]
    pub gold: i64,
    #[serde(rename = "CreateTime")]
    pub create_time: String,
    #[serde(rename = "LastLogin")]
    pub last_login: String,
    #[serde(rename = "IsLadder")]
    pub is_ladder: bool,
    #[serde(rename = "PvPGNTime")]
    pub pvpgn_time: i64,
    #[serde(rename = "RawData")]
    pub raw: Record,
}

/// Charinfo files are Latin-1; every byte maps 1:1 onto the first Unicode
/// block, so decoding can never fail.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// `KEY=VALUE` lines, split on the first `=`. Blank keys are dropped and a
/// blank value is recorded as present-but-null. Later duplicates win.
pub fn key_value_fields(text: &str) -> Record {
    let mut rec = Record::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if key.is_empty() { continue; }
            rec.set(key, Value::from_text(value));
        }
    }
    rec
}

fn int_field(rec: &Record, key: &str) -> i64 {
    rec.get_str(key).and_then(|s| s.parse().ok()).unwrap_or(0)
}

fn iso_time(rec: &Record, key: &str) -> String {
    let secs = int_field(rec, key);
    chrono::DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

/// Normalizes a parsed charinfo record. The display name comes from the
/// `charname` attribute when present and falls back to the file name; the
/// account likewise falls back to the account directory name. Numeric
/// attributes default to 0, timestamps to the epoch.
pub fn character_from(raw: Record, account_dir: &str, file_name: &str) -> Character {
    let name = raw.get_str("charname").unwrap_or(file_name).to_string();
    let account = raw.get_str("acctname").unwrap_or(account_dir).to_string();
    Character {
        account,
        name,
        class: raw.get_str("charclass").unwrap_or("N/A").to_string(),
        level: int_field(&raw, "level"),
        experience: int_field(&raw, "experience"),
        gold: int_field(&raw, "gold"),
        create_time: iso_time(&raw, "createtime"),
        last_login: iso_time(&raw, "lastlogin"),
        is_ladder: raw.get_str("ladder") == Some("yes"),
        pvpgn_time: int_field(&raw, "pvpgntime"),
        raw,
    }
}

pub fn read_charinfo(path: &Path) -> Result<Character> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading charinfo {}", path.display()))?;
    let raw = key_value_fields(&decode_latin1(&bytes));
    let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let account_dir = path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(character_from(raw, &account_dir, &file_name))
}

fn build_glob(pattern: Option<&str>) -> Option<GlobSet> {
    let g = pattern?;
    let mut gs = GlobSetBuilder::new();
    match GlobBuilder::new(g).case_insensitive(true).build() {
        Ok(glob) => { gs.add(glob); }
        Err(e) => { log::warn!("Bad charinfo glob {}: {}", g, e); return None; }
    }
    gs.build().ok()
}

/// Recursively scans `charinfo/<account>/<char>` and collects every file
/// that parses. Unreadable files are logged and skipped; an absent root
/// yields an empty set, which the report layer treats as a legitimate
/// outcome.
pub fn collect_characters(root: &Path, file_glob: Option<&str>, progress: bool) -> Vec<Character> {
    if !root.is_dir() {
        log::warn!("Charinfo directory not found: {}", root.display());
        return vec![];
    }
    let set = build_glob(file_glob);
    let bar = if progress { Some(indicatif::ProgressBar::new_spinner()) } else { None };
    let mut out = Vec::new();
    for de in WalkDir::new(root).min_depth(2).max_depth(2).follow_links(false).into_iter().filter_map(|e| e.ok()) {
        let p = de.path();
        if !p.is_file() { continue; }
        if let Some(set) = &set
            && let Some(fname) = p.file_name()
            && !set.is_match(Path::new(fname)) { continue; }
        if let Some(b) = &bar { b.set_message(p.display().to_string()); b.tick(); }
        match read_charinfo(p) {
            Ok(ch) => out.push(ch),
            Err(e) => log::warn!("Skipping charinfo: {:#}", e),
        }
    }
    if let Some(b) = bar { b.finish_and_clear(); }
    log::info!("Collected {} characters from {}", out.len(), root.display());
    out
}

/// Ladder ordering: level first, then experience, both descending.
pub fn ladder_sorted(chars: &[Character]) -> Vec<&Character> {
    let mut ladder: Vec<&Character> = chars.iter().filter(|c| c.is_ladder).collect();
    ladder.sort_by(|a, b| (b.level, b.experience).cmp(&(a.level, a.experience)));
    ladder
}
