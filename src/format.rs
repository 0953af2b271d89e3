// src/format.rs
//! Title/body rendering for one emitted record (forum-style post).

use anyhow::{anyhow, Result};

use crate::normalize::fold_whitespace;
use crate::record::Record;

/// Escape the Markdown characters chat clients interpret, so chips render literally.
pub fn escape_md(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '_' | '~' | '`' | '|' | '>') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn join_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|t| fold_whitespace(t))
        .filter(|t| !t.is_empty())
        .map(|t| escape_md(&t))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Build `(title, body)` for a record. Fails without an id or profile URL.
pub fn make_title_and_body(r: &Record) -> Result<(String, String)> {
    let id = r
        .entity_id()
        .ok_or_else(|| anyhow!("formatter: record has no entity id"))?;
    let url = r
        .profile_url()
        .ok_or_else(|| anyhow!("formatter: record {id} has no profile url"))?;

    let blue = join_tags(&r.blue);
    let pink = join_tags(&r.pink);
    let uniq = join_tags(&r.unique);
    let white = join_tags(&r.white);

    let sparks = [blue.as_str(), pink.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    let mut title_parts = vec![id.to_string()];
    if !sparks.is_empty() {
        title_parts.push(sparks);
    }
    title_parts.push(format!("White {} | G1 {}", r.white_count(), r.g1_count()));
    let title = title_parts.join(" — ");

    let body = format!(
        "Blue:   {blue}\nPink:   {pink}\nUnique: {uniq}\nWhite:  {white}\n\n{url}"
    )
    .trim()
    .to_string();

    Ok((title, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record {
            entity_id: Some("133102601857".into()),
            blue: vec!["Stamina9 (Representative3)".into()],
            pink: vec!["Long6 (Representative2)".into()],
            unique: vec![
                "Blue Rose Closer2 (Representative2)".into(),
                "Flowery☆Maneuver2 (Representative2)".into(),
            ],
            white: vec!["Tail Held High2 (Representative2)".into(), "  ".into()],
            white_count: Some(15),
            g1_count: Some(13),
            profile_url: Some("https://uma-global.pure-db.com/#/user/133102601857".into()),
            ..Default::default()
        }
    }

    #[test]
    fn renders_title_and_body() {
        let (title, body) = make_title_and_body(&sample()).unwrap();
        assert_eq!(
            title,
            "133102601857 — Stamina9 (Representative3) | Long6 (Representative2) — White 15 | G1 13"
        );
        assert_eq!(
            body,
            "Blue:   Stamina9 (Representative3)\n\
             Pink:   Long6 (Representative2)\n\
             Unique: Blue Rose Closer2 (Representative2) | Flowery☆Maneuver2 (Representative2)\n\
             White:  Tail Held High2 (Representative2)\n\n\
             https://uma-global.pure-db.com/#/user/133102601857"
        );
    }

    #[test]
    fn title_omits_empty_sparks() {
        let mut r = sample();
        r.blue.clear();
        r.pink.clear();
        let (title, _) = make_title_and_body(&r).unwrap();
        assert_eq!(title, "133102601857 — White 15 | G1 13");
    }

    #[test]
    fn escapes_markdown() {
        assert_eq!(escape_md("a*b_c|d>e~f`g"), r"a\*b\_c\|d\>e\~f\`g");
    }

    #[test]
    fn missing_id_is_an_error() {
        let mut r = sample();
        r.entity_id = None;
        assert!(make_title_and_body(&r).is_err());
    }
}
