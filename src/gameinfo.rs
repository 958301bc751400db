use regex::Regex;
use crate::record::{Record, RecordSet, Value};

/// Scrapes a cleaned bnetd game-info dump into a record set keyed by game
/// name. Only `<Info>`-prefixed lines count; a `Name: ... ID:` line opens a
/// fresh block, and a game announced again later replaces its earlier
/// record. Field lines between two openers belong to the current game.
pub fn parse_gameinfo(text: &str) -> RecordSet {
    let re_name = Regex::new(r"<Info>\s*Name:\s*(.+?)\s+ID:").unwrap();
    let re_players = Regex::new(r"<Info>\s*Players:\s*(\d+)\s*current,\s*(\d+)\s*total,\s*(\d+)\s*max").unwrap();
    let scalar_fields: Vec<(Regex, &str)> = [
        (r"<Info>\s*Owner:\s*(.+)", "Owner"),
        (r"<Info>\s*Address:\s*(.+)", "Address"),
        (r"<Info>\s*Client:\s*(.+)", "Client"),
        (r"<Info>\s*Created:\s*(.*)", "Created"),
        (r"<Info>\s*Started:\s*(.*)", "Started"),
        (r"<Info>\s*Status:\s*(.+)", "Status"),
        (r"<Info>\s*Type:\s*(.+)", "Type"),
        (r"<Info>\s*Difficulty:\s*(.+)", "Difficulty"),
    ]
    .into_iter()
    .map(|(p, k)| (Regex::new(p).unwrap(), k))
    .collect();

    let mut games = RecordSet::new();
    let mut current: Option<String> = None;
    for line in text.lines() {
        let line = line.trim();
        if !line.starts_with("<Info>") { continue; }
        if line.contains("Name:") && line.contains("ID:") {
            current = re_name.captures(line).map(|c| c[1].trim().to_string());
            if let Some(name) = current.as_ref() { games.insert(name, Record::new()); }
            continue;
        }
        let Some(name) = current.as_ref() else { continue };
        let Some(game) = games.get_mut(name) else { continue };
        for (re, key) in &scalar_fields {
            if let Some(cap) = re.captures(line) {
                game.set(key, Value::from_text(&cap[1]));
            }
        }
        if let Some(cap) = re_players.captures(line) {
            let n = |i: usize| cap[i].parse().unwrap_or(0);
            game.set("Players_current", Value::Int(n(1)));
            game.set("Players_total", Value::Int(n(2)));
            game.set("Players_max", Value::Int(n(3)));
        }
    }
    games
}
