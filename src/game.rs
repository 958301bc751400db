use crate::console::{self, ColumnSpec, TableSpec};
use crate::record::{Record, Value};

/// Character table of the D2GS `cl <id>` report. Offsets are the console's
/// fixed layout; rows without No/AcctName/CharName are corrupt echo noise.
pub const CHARACTER_TABLE: TableSpec = TableSpec {
    header_marker: "+-No",
    row_marker: "|",
    separator_marker: "+---",
    columns: &[
        ColumnSpec { name: "No", start: 2, end: 6 },
        ColumnSpec { name: "AcctName", start: 6, end: 22 },
        ColumnSpec { name: "CharName", start: 22, end: 40 },
        ColumnSpec { name: "IPAddress", start: 40, end: 58 },
        ColumnSpec { name: "Class", start: 58, end: 64 },
        ColumnSpec { name: "Level", start: 64, end: 72 },
        ColumnSpec { name: "EnterTime", start: 72, end: 80 },
    ],
    identity: &["No", "AcctName", "CharName"],
};

/// Pulls the numeric game IDs out of a `gl` game-list transcript. Data rows
/// start with `|` and carry the `N` network flag; `+-` rules are dividers.
/// Cells are recovered by collapsing whitespace/bar runs; the ID is the
/// third cell and must be all digits.
pub fn game_ids(gl_raw: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for line in gl_raw.lines() {
        let line = line.trim();
        if !line.starts_with('|') || line.starts_with("+-") || !line.contains('N') { continue; }
        let cells: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == '|')
            .filter(|t| !t.is_empty())
            .collect();
        if let Some(id) = cells.get(2)
            && !id.is_empty()
            && id.chars().all(|c| c.is_ascii_digit()) {
            ids.push((*id).to_string());
        }
    }
    ids
}

/// Parses one `cl <id>` transcript: bracketed `[Key : Value]` header fields
/// plus the fixed-column character table, merged into a single record with
/// the players under a `Characters` sub-list. XP fields are derived from
/// `UserCount` afterwards.
pub fn parse_game(cl_raw: &str) -> Record {
    let mut game = console::bracket_fields(cl_raw);
    game.set_list("Characters", console::fixed_table(cl_raw, &CHARACTER_TABLE));
    apply_xp_rate(&mut game);
    game
}

/// D2 party experience: rate = (n + 1) / 2 for n players, floor 1.0.
/// `UserCount` is coerced to an integer in place (unparseable counts as 0).
fn apply_xp_rate(game: &mut Record) {
    let users = match game.get("UserCount") {
        Some(Value::Int(n)) => *n,
        Some(Value::Str(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    let rate = if users >= 1 { (users as f64 + 1.0) / 2.0 } else { 1.0 };
    let rate = (rate * 100.0).round() / 100.0;
    let bonus = ((rate - 1.0) * 100.0).round();
    game.set("UserCount", Value::Int(users));
    game.set("XPRateMultiplier", Value::Float(rate));
    game.set("XPBonusPercent", Value::Str(format!("+{:.0}%", bonus)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_ids_from_game_list() {
        let gl = "\
+------+----------------+------+-------+---+
| GAME | NAME           | ID   | USERS | N |
+------+----------------+------+-------+---+
|    1 | baal-run       | 7    | 4     | N |
|    2 | cows           | 12   | 1     | N |
|    3 | private        | xx   | 1     | N |
D2GS>
";
        // The header row has "ID" in the id cell, divider rows are not data
        // rows, and the non-numeric id is dropped.
        assert_eq!(game_ids(gl), vec!["7", "12"]);
    }

    fn char_line(no: &str, acct: &str, name: &str, ip: &str, class: &str, lvl: &str, time: &str) -> String {
        format!("| {:<4}{:<16}{:<18}{:<18}{:<6}{:<8}{:<8}", no, acct, name, ip, class, lvl, time)
    }

    #[test]
    fn cl_transcript_yields_header_and_characters() {
        let cl = format!(
            "[GameName : baal-run] [GameId : 7]\n\
             [Difficulty : Hell] [UserCount : 4]\n\
             [Password : ]\n\
             +-No--+-AcctName------+-CharName-------+\n\
             +------------------------------------------------+\n\
             {}\n{}\n\nD2GS>\n",
            char_line("1", "admin", "FrozenOrb", "10.0.0.5", "Sor", "93", "12:01"),
            char_line("2", "guest", "WhirlWind", "10.0.0.9", "Bar", "88", "12:07"),
        );
        let game = parse_game(&cl);
        assert_eq!(game.get_str("GameName"), Some("baal-run"));
        assert_eq!(game.get_str("Difficulty"), Some("Hell"));
        assert_eq!(game.get("Password"), Some(&Value::Null));
        let chars = game.list("Characters");
        assert_eq!(chars.len(), 2);
        assert_eq!(chars[0].get_str("CharName"), Some("FrozenOrb"));
        assert_eq!(chars[1].get_str("Class"), Some("Bar"));
        assert_eq!(chars[1].get_str("EnterTime"), Some("12:07"));
    }

    #[test]
    fn xp_rate_from_user_count() {
        let game = parse_game("[UserCount : 4]");
        assert_eq!(game.get("UserCount"), Some(&Value::Int(4)));
        assert_eq!(game.get("XPRateMultiplier"), Some(&Value::Float(2.5)));
        assert_eq!(game.get_str("XPBonusPercent"), Some("+150%"));
    }

    #[test]
    fn xp_rate_defaults_when_count_missing_or_garbled() {
        for raw in ["", "[UserCount : lots]"] {
            let game = parse_game(raw);
            assert_eq!(game.get("UserCount"), Some(&Value::Int(0)));
            assert_eq!(game.get("XPRateMultiplier"), Some(&Value::Float(1.0)));
            assert_eq!(game.get_str("XPBonusPercent"), Some("+0%"));
        }
    }
}
