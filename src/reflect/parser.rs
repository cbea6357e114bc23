//! Scanner for the four-section reply format.
//!
//! A header counts only when it is the whole line, ignoring case and any
//! `#` or `*` markdown around it. Headers must appear in order. Each section
//! runs until the next expected header line, the last one to the end of the
//! reply. A reply missing any section, or with an empty one, is rejected.

use serde::{Deserialize, Serialize};

pub const SECTION_HEADERS: [&str; 4] = [
    "OVERVIEW:",
    "OBSERVATIONS:",
    "THEME_REFLECTION:",
    "CLOSING_QUESTION:",
];

const MAX_OBSERVATIONS: usize = 3;
const BULLET_MARKERS: [char; 3] = ['-', '*', '•'];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionInsights {
    pub overview_text: String,
    pub observations: Vec<String>,
    pub theme_reflection: String,
    pub closing_question: String,
}

fn is_header_line(line: &str, header: &str) -> bool {
    line.trim()
        .trim_start_matches('#')
        .trim()
        .trim_matches('*')
        .trim()
        .eq_ignore_ascii_case(header)
}

/// Split `reply` into the four section bodies, in header order.
fn scan_sections(reply: &str) -> Option<[&str; 4]> {
    let mut lines = Vec::new();
    let mut offset = 0usize;
    for line in reply.split_inclusive('\n') {
        lines.push((offset, line));
        offset += line.len();
    }

    // (header line start, body start) per section
    let mut bounds = [(0usize, 0usize); 4];
    let mut next_line = 0usize;
    for (idx, header) in SECTION_HEADERS.iter().enumerate() {
        let found = lines[next_line..]
            .iter()
            .position(|(_, line)| is_header_line(line, header))?;
        let (start, line) = lines[next_line + found];
        bounds[idx] = (start, start + line.len());
        next_line += found + 1;
    }

    let mut sections = [""; 4];
    for idx in 0..SECTION_HEADERS.len() {
        let body_start = bounds[idx].1;
        let body_end = bounds
            .get(idx + 1)
            .map(|(next_start, _)| *next_start)
            .unwrap_or(reply.len());
        sections[idx] = &reply[body_start..body_end];
    }
    Some(sections)
}

/// Trim whitespace and stray markdown emphasis left around a header.
fn clean_section(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('*')
        .trim_end_matches('*')
        .trim()
        .to_string()
}

fn parse_observations(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.chars().all(|c| c == '*'))
        .filter_map(|line| line.strip_prefix(BULLET_MARKERS))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .take(MAX_OBSERVATIONS)
        .collect()
}

pub fn parse_reply(reply: &str) -> Option<ReflectionInsights> {
    let [overview, observations, theme, question] = scan_sections(reply)?;

    let insights = ReflectionInsights {
        overview_text: clean_section(overview),
        observations: parse_observations(observations),
        theme_reflection: clean_section(theme),
        closing_question: clean_section(question),
    };
    if insights.overview_text.is_empty()
        || insights.theme_reflection.is_empty()
        || insights.closing_question.is_empty()
        || insights.observations.is_empty()
    {
        return None;
    }
    Some(insights)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "OVERVIEW:\nYou wrote often this month.\n\nOBSERVATIONS:\n- Mornings came up a lot.\n- Your entries grew longer.\n\nTHEME_REFLECTION:\nRest seemed to matter to you.\n\nCLOSING_QUESTION:\nWhat felt most restful?\n";

    #[test]
    fn parses_well_formed_reply() {
        let got = parse_reply(WELL_FORMED).expect("valid reply");
        assert_eq!(got.overview_text, "You wrote often this month.");
        assert_eq!(
            got.observations,
            vec!["Mornings came up a lot.", "Your entries grew longer."]
        );
        assert_eq!(got.theme_reflection, "Rest seemed to matter to you.");
        assert_eq!(got.closing_question, "What felt most restful?");
    }

    #[test]
    fn rejects_reply_missing_any_section() {
        for header in SECTION_HEADERS {
            let broken = WELL_FORMED.replace(header, "");
            assert!(parse_reply(&broken).is_none(), "accepted without {header}");
        }
    }

    #[test]
    fn rejects_sections_out_of_order() {
        let swapped = "OBSERVATIONS:\n- one\nOVERVIEW:\ntext\nTHEME_REFLECTION:\ntheme\nCLOSING_QUESTION:\nwhy?";
        assert!(parse_reply(swapped).is_none());
    }

    #[test]
    fn rejects_empty_section_body() {
        let empty_theme = WELL_FORMED.replace("Rest seemed to matter to you.", "   ");
        assert!(parse_reply(&empty_theme).is_none());
    }

    #[test]
    fn rejects_observations_without_bullets() {
        let plain = WELL_FORMED
            .replace("- Mornings came up a lot.", "Mornings came up a lot.")
            .replace("- Your entries grew longer.", "Your entries grew longer.");
        assert!(parse_reply(&plain).is_none());
    }

    #[test]
    fn tolerates_case_spacing_and_extra_bullets() {
        let reply = "Here you go.\n\n**Overview:**\n  A calm month.  \n\n\nobservations:\n* one\n•  two \n-\n- three\n- four\n\nTheme_Reflection:\nSteady.\r\n\r\nclosing_question:\nWhat stayed with you?   ";
        let got = parse_reply(reply).expect("tolerant parse");
        assert_eq!(got.overview_text, "A calm month.");
        assert_eq!(got.observations, vec!["one", "two", "three"]);
        assert_eq!(got.theme_reflection, "Steady.");
        assert_eq!(got.closing_question, "What stayed with you?");
    }

    #[test]
    fn bold_headers_do_not_leak_into_observations() {
        let reply = "**OVERVIEW:**\nQuiet.\n**OBSERVATIONS:**\n- a\n**THEME_REFLECTION:**\nb\n**CLOSING_QUESTION:**\nc?";
        let got = parse_reply(reply).expect("bold headers");
        assert_eq!(got.overview_text, "Quiet.");
        assert_eq!(got.observations, vec!["a"]);
        assert_eq!(got.closing_question, "c?");
    }

    #[test]
    fn header_words_in_a_preamble_are_not_headers() {
        let reply = "Here is your monthly overview:\n\nOVERVIEW:\nA calm month.\n\nOBSERVATIONS:\n- one\n\nTHEME_REFLECTION:\nRest.\n\nCLOSING_QUESTION:\nWhat helped?";
        let got = parse_reply(reply).expect("valid reply");
        assert_eq!(got.overview_text, "A calm month.");
    }

    #[test]
    fn header_words_inside_a_sentence_do_not_split_sections() {
        let reply = "OVERVIEW:\nA few observations: you wrote often.\n\nOBSERVATIONS:\n- one\n\nTHEME_REFLECTION:\nRest.\n\nCLOSING_QUESTION:\nWhat helped?";
        let got = parse_reply(reply).expect("valid reply");
        assert_eq!(got.overview_text, "A few observations: you wrote often.");
        assert_eq!(got.observations, vec!["one"]);
    }

    #[test]
    fn markdown_heading_headers_are_accepted() {
        let reply = "## Overview:\nQuiet.\n### **OBSERVATIONS:**\n- a\n# THEME_REFLECTION:\nb\n**CLOSING_QUESTION:**\nc?";
        let got = parse_reply(reply).expect("heading headers");
        assert_eq!(got.overview_text, "Quiet.");
        assert_eq!(got.theme_reflection, "b");
    }

    #[test]
    fn header_sharing_a_line_with_content_is_rejected() {
        let reply = "OVERVIEW: A calm month.\nOBSERVATIONS:\n- one\nTHEME_REFLECTION:\nRest.\nCLOSING_QUESTION:\nWhat helped?";
        assert!(parse_reply(reply).is_none());
    }
}
