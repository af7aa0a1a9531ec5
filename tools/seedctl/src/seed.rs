use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::info;

use crate::rest::RestClient;

/// Load every seed file under `dir` and upsert it into the database.
/// Missing files are skipped so a partial seed directory still works.
pub async fn run(rest: &RestClient, dir: &Path) -> Result<()> {
    let mut roles = load_array(dir.join("roles.json"))?.unwrap_or_default();
    if let Some(mobile) = load_array(dir.join("roles_from_mobile.json"))? {
        merge_mobile_roles(&mut roles, mobile);
    }
    if !roles.is_empty() {
        rest.upsert("roles", &roles, None).await?;
        info!(count = roles.len(), "seeded roles");
    }

    if let Some(mut items) = load_array(dir.join("explore_items.json"))? {
        normalize_explore_items(&mut items);
        if !items.is_empty() {
            rest.upsert("explore_items", &items, None).await?;
            info!(count = items.len(), "seeded explore items");
        }
    }

    if let Some(templates) = load_array(dir.join("daily_theater_templates.json"))? {
        if !templates.is_empty() {
            rest.upsert("daily_theater_templates", &templates, None)
                .await?;
            info!(count = templates.len(), "seeded daily theater templates");
        }
    }

    let messages = seed_messages_from_roles(&roles);
    if !messages.is_empty() {
        rest.upsert("role_seed_messages", &messages, Some("role_id,position"))
            .await?;
        info!(count = messages.len(), "seeded role greetings");
    }

    Ok(())
}

fn load_array(path: std::path::PathBuf) -> Result<Option<Vec<Value>>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    match value {
        Value::Array(items) => Ok(Some(items)),
        _ => anyhow::bail!("{} is not a JSON array", path.display()),
    }
}

/// Rows extracted from the mobile bundle win over the base seed file when
/// both carry the same id; unseen ids are appended.
fn merge_mobile_roles(base: &mut Vec<Value>, mobile: Vec<Value>) {
    for role in mobile {
        let Some(id) = role.get("id").and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        match base
            .iter_mut()
            .find(|existing| existing.get("id").and_then(Value::as_str) == Some(id.as_str()))
        {
            Some(existing) => {
                if let (Some(target), Some(source)) = (existing.as_object_mut(), role.as_object())
                {
                    for (key, value) in source {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
            None => base.push(role),
        }
    }
}

/// The API treats `world`, `recommended_roles` and `content` as required
/// columns, so fill them in before insert.
fn normalize_explore_items(items: &mut Vec<Value>) {
    items.retain(|item| item.get("id").and_then(Value::as_str).is_some());
    for item in items.iter_mut() {
        let Some(obj) = item.as_object_mut() else {
            continue;
        };
        obj.entry("world").or_insert_with(|| json!({}));
        obj.entry("recommended_roles").or_insert_with(|| json!([]));
        obj.entry("content").or_insert_with(|| json!([]));
    }
}

/// Each role with a greeting gets one opening message pinned at position 0
/// of its default conversation.
fn seed_messages_from_roles(roles: &[Value]) -> Vec<Value> {
    roles
        .iter()
        .filter_map(|role| {
            let id = role.get("id").and_then(Value::as_str)?;
            let greeting = role.get("greeting").and_then(Value::as_str)?;
            if greeting.trim().is_empty() {
                return None;
            }
            Some(json!({
                "role_id": id,
                "conversation_id": format!("{id}-default"),
                "position": 0,
                "sender": "ai",
                "body": greeting,
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_roles_override_base_fields() {
        let mut base = vec![json!({"id": "antoine", "mood": "calm", "city": "Lyon"})];
        let mobile = vec![
            json!({"id": "antoine", "mood": "wistful"}),
            json!({"id": "edward", "mood": "sharp"}),
        ];
        merge_mobile_roles(&mut base, mobile);
        assert_eq!(base.len(), 2);
        assert_eq!(base[0]["mood"], "wistful");
        assert_eq!(base[0]["city"], "Lyon");
        assert_eq!(base[1]["id"], "edward");
    }

    #[test]
    fn explore_items_get_required_defaults() {
        let mut items = vec![
            json!({"id": "post-1", "title": "Night walk"}),
            json!({"title": "no id, dropped"}),
        ];
        normalize_explore_items(&mut items);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["world"], json!({}));
        assert_eq!(items[0]["recommended_roles"], json!([]));
        assert_eq!(items[0]["content"], json!([]));
    }

    #[test]
    fn greetings_become_position_zero_messages() {
        let roles = vec![
            json!({"id": "antoine", "greeting": "Evening."}),
            json!({"id": "mute", "greeting": "   "}),
            json!({"id": "none"}),
        ];
        let messages = seed_messages_from_roles(&roles);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["conversation_id"], "antoine-default");
        assert_eq!(messages[0]["position"], 0);
        assert_eq!(messages[0]["sender"], "ai");
    }
}
