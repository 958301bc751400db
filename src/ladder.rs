use quick_xml::Reader;
use quick_xml::events::Event as XmlEvent;
use serde::Serialize;

/// Ladder types the web ladder shows (expansion ladders in d2ladder.xml).
pub const LADDER_TYPE_RANGE: std::ops::RangeInclusive<u32> = 27..=34;

#[derive(Clone, Debug, Default, Serialize)]
pub struct LadderEntry {
    pub rank: String,
    pub name: String,
    pub level: String,
    pub experience: String,
    pub class: String,
    pub prefix: String,
    pub status: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Ladder {
    #[serde(rename = "type")]
    pub ladder_type: u32,
    pub mode: String,
    pub chars: Vec<LadderEntry>,
}

/// Streams the PvPGN `d2ladder.xml` export. Each `ladder` element carries
/// `type` and `mode` children plus `char` children with per-entry fields.
/// Ladders outside the kept type range, or with a non-numeric type, are
/// dropped; malformed XML simply ends the scan with whatever parsed so far.
pub fn parse_ladder_xml(xml: &str) -> Vec<Ladder> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut ladders: Vec<Ladder> = Vec::new();
    let mut ladder: Option<Ladder> = None;
    let mut ladder_type_text = String::new();
    let mut entry: Option<LadderEntry> = None;
    let mut cur_tag: Option<String> = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "ladder" => {
                        ladder = Some(Ladder::default());
                        ladder_type_text.clear();
                    }
                    "char" if ladder.is_some() => { entry = Some(LadderEntry::default()); }
                    _ => { cur_tag = Some(name); }
                }
            }
            Ok(XmlEvent::Text(t)) => {
                let text = String::from_utf8_lossy(t.as_ref()).trim().to_string();
                let Some(tag) = cur_tag.as_deref() else { continue };
                if let Some(entry) = entry.as_mut() {
                    match tag {
                        "rank" => entry.rank = text,
                        "name" => entry.name = text,
                        "level" => entry.level = text,
                        "experience" => entry.experience = text,
                        "class" => entry.class = text,
                        "prefix" => entry.prefix = text,
                        "status" => entry.status = text,
                        _ => {}
                    }
                } else if let Some(ladder) = ladder.as_mut() {
                    match tag {
                        "type" => ladder_type_text = text,
                        "mode" => ladder.mode = text,
                        _ => {}
                    }
                }
            }
            Ok(XmlEvent::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                match name.as_str() {
                    "char" => {
                        if let (Some(l), Some(en)) = (ladder.as_mut(), entry.take()) { l.chars.push(en); }
                    }
                    "ladder" => {
                        if let Some(mut l) = ladder.take()
                            && let Ok(t) = ladder_type_text.parse::<u32>()
                            && LADDER_TYPE_RANGE.contains(&t) {
                            l.ladder_type = t;
                            ladders.push(l);
                        }
                    }
                    _ => { cur_tag = None; }
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    ladders
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = "\
<ladders>
 <ladder><type>27</type><mode>expansion hardcore</mode>
  <char><rank>1</rank><name>FrozenOrb</name><level>93</level><experience>1234567</experience><class>Sorceress</class><prefix>Matriarch</prefix><status>alive</status></char>
  <char><rank>2</rank><name>WhirlWind</name><level>88</level><experience>7654</experience><class>Barbarian</class><prefix></prefix><status>dead</status></char>
 </ladder>
 <ladder><type>3</type><mode>classic</mode>
  <char><rank>1</rank><name>OldTimer</name><level>50</level><experience>1</experience><class>Paladin</class><prefix></prefix><status>alive</status></char>
 </ladder>
 <ladder><type>abc</type><mode>broken</mode></ladder>
 <ladder><type>34</type><mode>expansion</mode></ladder>
</ladders>
";

    #[test]
    fn keeps_only_expansion_type_range() {
        let ladders = parse_ladder_xml(XML);
        assert_eq!(ladders.len(), 2);
        assert_eq!(ladders[0].ladder_type, 27);
        assert_eq!(ladders[1].ladder_type, 34);
        assert!(ladders[1].chars.is_empty());
    }

    #[test]
    fn char_fields_extracted() {
        let ladders = parse_ladder_xml(XML);
        let chars = &ladders[0].chars;
        assert_eq!(chars.len(), 2);
        assert_eq!(chars[0].name, "FrozenOrb");
        assert_eq!(chars[0].prefix, "Matriarch");
        assert_eq!(chars[1].status, "dead");
        assert_eq!(chars[1].prefix, "");
        assert_eq!(ladders[0].mode, "expansion hardcore");
    }

    #[test]
    fn garbage_xml_yields_empty_not_error() {
        assert!(parse_ladder_xml("<<<not xml").is_empty());
        assert!(parse_ladder_xml("").is_empty());
    }
}
