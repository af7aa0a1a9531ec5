use anyhow::Result;
use regex::Regex;
use serde_json::{json, Value};

/// Scrape role definitions out of a JS seed source file. The file declares
/// objects like `{ id: 'antoine', persona: `...`, greeting: '...',
/// script: ['...', '...'] }`; this pulls the fields we seed from.
pub fn extract_roles(content: &str, ids: &[String]) -> Vec<Value> {
    ids.iter()
        .filter_map(|id| extract_one(content, id))
        .collect()
}

fn extract_one(content: &str, role_id: &str) -> Option<Value> {
    let id_anchor = Regex::new(&format!(
        r#"\bid\s*:\s*['"]{}['"]"#,
        regex::escape(role_id)
    ))
    .ok()?;
    let start = id_anchor.find(content)?.start();

    // persona is a template literal; scan to the matching unescaped backtick.
    let persona_open = Regex::new(r"\bpersona\s*:\s*`").ok()?;
    let persona_start = start + persona_open.find(&content[start..])?.end();
    let persona_end = find_unescaped(content.as_bytes(), persona_start, b'`')?;
    let persona = content[persona_start..persona_end].trim().to_string();

    let greeting = single_quoted_field(content, persona_end, "greeting").unwrap_or_default();
    let script = script_array(content, persona_end).unwrap_or_default();

    let window = short_field_window(content, start);
    let mood = short_string_field(window, "mood");
    let title = short_string_field(window, "title");
    let city = short_string_field(window, "city");
    let description = short_string_field(window, "description");
    let tags = string_array_field(window, "tags");

    Some(json!({
        "id": role_id,
        "name": display_name(role_id),
        "persona": persona,
        "mood": mood,
        "greeting": greeting,
        "script": script,
        "title": title,
        "city": city,
        "description": description,
        "tags": tags,
    }))
}

fn display_name(role_id: &str) -> String {
    let mut chars = role_id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => role_id.to_string(),
    }
}

fn find_unescaped(bytes: &[u8], start: usize, needle: u8) -> Option<usize> {
    let mut i = start;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == needle {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn single_quoted_field(content: &str, from: usize, name: &str) -> Option<String> {
    let open = Regex::new(&format!(r"\b{name}\s*:\s*'")).ok()?;
    let value_start = from + open.find(&content[from..])?.end();
    let value_end = find_unescaped(content.as_bytes(), value_start, b'\'')?;
    let raw = &content[value_start..value_end];
    Some(raw.replace("\\n", "\n").replace("\\'", "'"))
}

/// Parse `script: ['...', '...']`, honoring escapes and nested brackets.
fn script_array(content: &str, from: usize) -> Option<Vec<String>> {
    let open = Regex::new(r"\bscript\s*:\s*\[").ok()?;
    let bracket = from + open.find(&content[from..])?.end() - 1;
    let bytes = content.as_bytes();
    let mut depth = 1usize;
    let mut i = bracket + 1;
    let mut in_string = false;
    let mut current = Vec::new();
    let mut result = Vec::new();
    while i < bytes.len() && depth > 0 {
        let b = bytes[i];
        if in_string {
            if b == b'\\' && i + 1 < bytes.len() {
                current.push(bytes[i + 1]);
                i += 2;
                continue;
            }
            if b == b'\'' {
                result.push(String::from_utf8_lossy(&current).into_owned());
                current.clear();
                in_string = false;
            } else {
                current.push(b);
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' if depth == 1 => in_string = true,
            b'[' => depth += 1,
            b']' => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    Some(result)
}

/// Short scalar fields live near the persona, so only probe a bounded window.
fn short_field_window(content: &str, from: usize) -> &str {
    let mut end = (from + 2000).min(content.len());
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[from..end]
}

fn short_string_field(window: &str, name: &str) -> String {
    Regex::new(&format!(r#"\b{name}\s*:\s*['"]([^'"]*)['"]"#))
        .ok()
        .and_then(|re| re.captures(window))
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default()
}

fn string_array_field(window: &str, name: &str) -> Vec<String> {
    let Some(inner) = Regex::new(&format!(r"(?s)\b{name}\s*:\s*\[(.*?)\]"))
        .ok()
        .and_then(|re| re.captures(window))
        .map(|caps| caps[1].to_string())
    else {
        return Vec::new();
    };
    Regex::new(r#"['"]([^'"]*)['"]"#)
        .map(|re| {
            re.captures_iter(&inner)
                .map(|caps| caps[1].to_string())
                .collect()
        })
        .unwrap_or_default()
}

pub fn write_roles(path: &std::path::Path, roles: &[Value]) -> Result<()> {
    let text = serde_json::to_string_pretty(roles)?;
    std::fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
export const roleSeeds = [
  {
    id: 'antoine',
    mood: 'wistful',
    title: 'Pianist',
    city: 'Lyon',
    tags: ['calm', 'music'],
    persona: `A quiet pianist.
Keeps to himself after dark.`,
    greeting: 'Evening. You found my corner.\nSit, if you like.',
    script: ['First line', 'Don\'t rush me', 'Last line'],
  },
];
"#;

    #[test]
    fn extracts_persona_and_greeting() {
        let roles = extract_roles(SAMPLE, &["antoine".to_string()]);
        assert_eq!(roles.len(), 1);
        let role = &roles[0];
        assert_eq!(role["name"], "Antoine");
        assert!(role["persona"].as_str().unwrap().contains("quiet pianist"));
        assert!(role["greeting"].as_str().unwrap().contains("Sit, if you like"));
    }

    #[test]
    fn extracts_script_with_escapes() {
        let roles = extract_roles(SAMPLE, &["antoine".to_string()]);
        let script = roles[0]["script"].as_array().unwrap();
        assert_eq!(script.len(), 3);
        assert_eq!(script[1], "Don't rush me");
    }

    #[test]
    fn extracts_short_fields_and_tags() {
        let roles = extract_roles(SAMPLE, &["antoine".to_string()]);
        assert_eq!(roles[0]["mood"], "wistful");
        assert_eq!(roles[0]["city"], "Lyon");
        assert_eq!(roles[0]["tags"], json!(["calm", "music"]));
    }

    #[test]
    fn unknown_id_yields_nothing() {
        assert!(extract_roles(SAMPLE, &["edward".to_string()]).is_empty());
    }
}
