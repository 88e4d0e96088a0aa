use crate::model::MetadatumDraft;

/// Merge incoming key/value pairs into an existing metadata set.
///
/// A pair whose key matches an existing row updates that row's value in
/// place, keeping its position; anything else is appended in request order.
/// Keys are never removed, so re-applying the same incoming set is a no-op.
/// Rows are marked dirty only when their stored value would actually change,
/// which is what the bulk write later uses to skip untouched rows.
pub fn merge(
    mut existing: Vec<MetadatumDraft>,
    incoming: &[(Option<String>, Option<String>)],
) -> Vec<MetadatumDraft> {
    for (key, value) in incoming {
        let matched = key.as_ref().and_then(|k| {
            existing
                .iter_mut()
                .find(|m| m.key.as_deref() == Some(k.as_str()))
        });

        match matched {
            Some(row) => {
                if row.value != *value {
                    row.value = value.clone();
                    row.dirty = true;
                }
            }
            None => existing.push(MetadatumDraft {
                id: None,
                key: key.clone(),
                value: value.clone(),
                dirty: true,
            }),
        }
    }

    existing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, value: &str, id: i64) -> MetadatumDraft {
        MetadatumDraft {
            id: Some(id),
            key: Some(key.to_string()),
            value: Some(value.to_string()),
            dirty: false,
        }
    }

    fn pair(key: &str, value: &str) -> (Option<String>, Option<String>) {
        (Some(key.to_string()), Some(value.to_string()))
    }

    fn keys_and_values(rows: &[MetadatumDraft]) -> Vec<(String, String)> {
        rows.iter()
            .map(|m| {
                (
                    m.key.clone().unwrap_or_default(),
                    m.value.clone().unwrap_or_default(),
                )
            })
            .collect()
    }

    #[test]
    fn updates_matching_key_in_place_and_appends_new_keys() {
        let merged = merge(
            vec![row("k1", "v1", 1)],
            &[pair("k1", "v2"), pair("k2", "v3")],
        );

        assert_eq!(
            keys_and_values(&merged),
            vec![
                ("k1".to_string(), "v2".to_string()),
                ("k2".to_string(), "v3".to_string())
            ]
        );
        // The updated row keeps its identity instead of becoming a new row.
        assert_eq!(merged[0].id, Some(1));
        assert_eq!(merged[1].id, None);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn preserves_existing_order_across_updates() {
        let merged = merge(
            vec![row("a", "1", 1), row("b", "2", 2), row("c", "3", 3)],
            &[pair("c", "30"), pair("a", "10"), pair("d", "4")],
        );

        assert_eq!(
            keys_and_values(&merged)
                .iter()
                .map(|(k, _)| k.clone())
                .collect::<Vec<_>>(),
            vec!["a", "b", "c", "d"]
        );
    }

    #[test]
    fn no_incoming_data_is_a_noop() {
        let existing = vec![row("k1", "v1", 1)];
        let merged = merge(existing.clone(), &[]);
        assert_eq!(merged, existing);
        assert!(!merged[0].dirty);
    }

    #[test]
    fn merge_is_idempotent() {
        let incoming = vec![pair("k1", "v2"), pair("k2", "v3")];
        let once = merge(vec![row("k1", "v1", 1)], &incoming);
        let twice = merge(once.clone(), &incoming);
        assert_eq!(keys_and_values(&once), keys_and_values(&twice));
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn marks_dirty_only_on_actual_change() {
        let merged = merge(
            vec![row("k1", "v1", 1), row("k2", "v2", 2)],
            &[pair("k1", "v1"), pair("k2", "changed")],
        );
        assert!(!merged[0].dirty);
        assert!(merged[1].dirty);
    }

    #[test]
    fn blank_keys_are_appended_for_validation_to_reject() {
        let merged = merge(vec![], &[(None, Some("v".to_string()))]);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].key.is_none());
        assert!(merged[0].dirty);
    }
}
