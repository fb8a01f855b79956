//! Summary figures for the landing page, derived from store snapshots.

use std::cmp::Reverse;

use nyuki_core::entities::{Apiary, Hive};
use serde::Serialize;

use crate::store::CollectionSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentHive {
    pub hive: Hive,
    /// `None` when the apiary is not in the local cache.
    pub apiary_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub apiary_count: usize,
    pub hive_count: usize,
    /// Most recently created first.
    pub recent_hives: Vec<RecentHive>,
    /// Apiaries whose `total_hives` may be out of date.
    pub stale_apiaries: Vec<String>,
}

#[must_use]
pub fn summarize(
    apiaries: &CollectionSnapshot<Apiary>,
    hives: &CollectionSnapshot<Hive>,
    recent_limit: usize,
) -> Dashboard {
    let mut recent: Vec<&Hive> = hives.iter().collect();
    recent.sort_by_key(|hive| Reverse(hive.created_at));

    let recent_hives = recent
        .into_iter()
        .take(recent_limit)
        .map(|hive| RecentHive {
            hive: hive.clone(),
            apiary_name: apiaries.get(&hive.apiary_id).map(|a| a.name.clone()),
        })
        .collect();

    Dashboard {
        apiary_count: apiaries.len(),
        hive_count: hives.len(),
        recent_hives,
        stale_apiaries: apiaries.stale.iter().cloned().collect(),
    }
}

/// Hives placed in `apiary_id`, oldest first.
#[must_use]
pub fn hives_in_apiary(hives: &CollectionSnapshot<Hive>, apiary_id: &str) -> Vec<Hive> {
    hives
        .iter()
        .filter(|hive| hive.apiary_id == apiary_id)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};
    use nyuki_core::entities::{NewApiary, NewHive};
    use nyuki_core::record::SyncRecord;
    use pretty_assertions::assert_eq;

    fn apiary(id: &str, name: &str) -> Apiary {
        let mut apiary = Apiary::placeholder(
            "usr-00000001",
            "tmp-00000000",
            &NewApiary {
                name: name.into(),
                location: "Arusha".into(),
                ..Default::default()
            },
            Utc::now(),
        );
        apiary.id = id.into();
        apiary
    }

    fn hive(id: &str, apiary_id: &str, minutes_ago: i64) -> Hive {
        let mut hive = Hive::placeholder(
            "usr-00000001",
            "tmp-00000000",
            &NewHive {
                apiary_id: apiary_id.into(),
                name: id.to_uppercase(),
                ..Default::default()
            },
            Utc::now() - TimeDelta::minutes(minutes_ago),
        );
        hive.id = id.into();
        hive
    }

    fn snapshot<E>(records: Vec<E>) -> CollectionSnapshot<E> {
        CollectionSnapshot {
            owner_id: Some("usr-00000001".into()),
            loaded: true,
            records,
            stale: Default::default(),
        }
    }

    #[test]
    fn recent_hives_are_newest_first_and_limited() {
        let apiaries = snapshot(vec![apiary("apy-1", "Home")]);
        let hives = snapshot(vec![
            hive("hiv-a", "apy-1", 40),
            hive("hiv-b", "apy-1", 30),
            hive("hiv-c", "apy-1", 20),
            hive("hiv-d", "apy-gone", 10),
        ]);

        let dashboard = summarize(&apiaries, &hives, 3);

        assert_eq!(dashboard.apiary_count, 1);
        assert_eq!(dashboard.hive_count, 4);
        let ids: Vec<_> = dashboard
            .recent_hives
            .iter()
            .map(|r| r.hive.id.as_str())
            .collect();
        assert_eq!(ids, vec!["hiv-d", "hiv-c", "hiv-b"]);
        assert_eq!(dashboard.recent_hives[0].apiary_name, None);
        assert_eq!(dashboard.recent_hives[1].apiary_name.as_deref(), Some("Home"));
    }

    #[test]
    fn stale_apiaries_are_listed() {
        let mut apiaries = snapshot(vec![apiary("apy-1", "Home"), apiary("apy-2", "Hill")]);
        apiaries.stale.insert("apy-2".into());
        let dashboard = summarize(&apiaries, &snapshot(Vec::new()), 3);
        assert_eq!(dashboard.stale_apiaries, vec!["apy-2".to_string()]);
    }

    #[test]
    fn hives_in_apiary_filters_by_parent() {
        let hives = snapshot(vec![hive("hiv-a", "apy-1", 2), hive("hiv-b", "apy-2", 1)]);
        let found = hives_in_apiary(&hives, "apy-2");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "hiv-b");
    }
}
