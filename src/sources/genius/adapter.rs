//! Adapter layer: Convert Genius DTOs and pages to canonical records
//!
//! This is the ONLY place where Genius response shapes leave the module.
//! The lyric extraction here is a deliberately narrow scanner over the song
//! page markup - full HTML parsing is an external concern this crate does
//! not take on.

use super::dto;

/// Extract song titles from a search response, in result order.
pub fn to_titles(response: dto::SearchResponse) -> Vec<String> {
    response
        .response
        .hits
        .into_iter()
        .filter_map(|hit| hit.result.title)
        .collect()
}

/// Extract the first hit's song page URL, if any.
pub fn first_song_url(response: &dto::SearchResponse) -> Option<&str> {
    response
        .response
        .hits
        .first()
        .and_then(|hit| hit.result.url.as_deref())
}

/// Pull the lyric text out of a Genius song page.
///
/// The lyric lives in `div` blocks marked `data-lyrics-container="true"`.
/// Tags inside are flattened (`<br>` to newline), a handful of entities are
/// decoded, bracketed section labels ("[Chorus]") are dropped, and blank
/// lines are collapsed. Returns `None` when no lyric container is present.
pub fn extract_lyric_text(page: &str) -> Option<String> {
    const MARKER: &str = "data-lyrics-container=\"true\"";

    let mut blocks = Vec::new();
    let mut search_from = 0;
    while let Some(pos) = page[search_from..].find(MARKER) {
        let start = search_from + pos;
        let content_start = page[start..].find('>').map(|i| start + i + 1)?;
        let content_end = page[content_start..]
            .find("</div>")
            .map(|i| content_start + i)
            .unwrap_or(page.len());
        blocks.push(&page[content_start..content_end]);
        search_from = content_end;
    }

    if blocks.is_empty() {
        return None;
    }

    let mut text = String::new();
    for block in blocks {
        flatten_markup(block, &mut text);
        text.push('\n');
    }

    let cleaned: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_section_label(line))
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join("\n"))
    }
}

/// Strip tags from a markup fragment, turning `<br>` into newlines.
fn flatten_markup(fragment: &str, out: &mut String) {
    let mut rest = fragment;
    while let Some(open) = rest.find('<') {
        out.push_str(&decode_entities(&rest[..open]));
        let Some(close) = rest[open..].find('>') else {
            return;
        };
        let tag = &rest[open + 1..open + close];
        if tag == "br" || tag == "br/" || tag == "br /" {
            out.push('\n');
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(&decode_entities(rest));
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

/// "[Verse 1]", "[Chorus]" and similar structural markers.
fn is_section_label(line: &str) -> bool {
    line.starts_with('[') && line.ends_with(']')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titles_preserve_order() {
        let json = r#"{
            "response": {"hits": [
                {"result": {"id": 1, "title": "Second Hand News", "url": null, "full_title": null}},
                {"result": {"id": 2, "title": "Dreams", "url": null, "full_title": null}}
            ]}
        }"#;
        let response: dto::SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(to_titles(response), vec!["Second Hand News", "Dreams"]);
    }

    #[test]
    fn test_first_song_url() {
        let json = r#"{
            "response": {"hits": [
                {"result": {"id": 1, "title": "Dreams", "url": "https://genius.com/dreams", "full_title": null}}
            ]}
        }"#;
        let response: dto::SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(first_song_url(&response), Some("https://genius.com/dreams"));
    }

    #[test]
    fn test_extract_lyric_text() {
        let page = concat!(
            "<html><body>",
            "<div data-lyrics-container=\"true\" class=\"x\">",
            "[Verse 1]<br/>Now here you go again<br/>You say you want your freedom",
            "</div>",
            "<div data-lyrics-container=\"true\">",
            "[Chorus]<br/>Thunder only happens when it&#x27;s raining",
            "</div>",
            "</body></html>"
        );

        let lyric = extract_lyric_text(page).unwrap();
        assert_eq!(
            lyric,
            "Now here you go again\nYou say you want your freedom\nThunder only happens when it's raining"
        );
    }

    #[test]
    fn test_extract_handles_nested_tags() {
        let page = "<div data-lyrics-container=\"true\"><a href=\"/x\">Players</a> only love you<br>when they&amp;#x27;re playing</div>";
        let lyric = extract_lyric_text(page).unwrap();
        assert!(lyric.starts_with("Players only love you"));
    }

    #[test]
    fn test_extract_no_container() {
        assert_eq!(extract_lyric_text("<html><body>nothing here</body></html>"), None);
    }
}
